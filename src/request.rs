use std::fmt;

use serde::de::DeserializeOwned;

use crate::StorageApiError;

/// HTTP verbs used by the Storage API.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Which branch namespace a request is routed through.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BranchScope {
    /// Follow the client's branch, if any.
    #[default]
    Inherit,
    /// Always target the default branch.
    Default,
}

/// Request payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
}

/// One logical Storage API request.
///
/// `path` is relative to `{url}/v2/storage/`. Retries resend the same value.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    pub extended_timeout: bool,
    /// Return the success body byte-for-byte as [`ResponseBody::Raw`].
    pub raw_response: bool,
    pub branch_scope: BranchScope,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
            extended_timeout: false,
            raw_response: false,
            branch_scope: BranchScope::Inherit,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Appends a query-string parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    /// Requests the extended timeout for this call.
    pub fn extended_timeout(mut self) -> Self {
        self.extended_timeout = true;
        self
    }

    /// Keeps the success body as sent, even when it happens to parse as JSON.
    ///
    /// Platform errors inside a JSON object body are still detected.
    pub fn raw_response(mut self) -> Self {
        self.raw_response = true;
        self
    }

    /// Routes this request to the default branch regardless of client scope.
    pub fn default_branch(mut self) -> Self {
        self.branch_scope = BranchScope::Default;
        self
    }
}

/// Decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    /// Body parsed as JSON; an empty body decodes as `Null`.
    Json(serde_json::Value),
    /// Body that is not JSON, or was requested raw, returned unchanged.
    Raw(Vec<u8>),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Deserializes a JSON body into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, StorageApiError> {
        match self {
            Self::Json(value) => serde_json::from_value(value)
                .map_err(|err| StorageApiError::Decode(format!("unexpected response shape: {err}"))),
            Self::Raw(bytes) => Err(StorageApiError::Decode(format!(
                "expected JSON response, got {} raw bytes",
                bytes.len()
            ))),
        }
    }

    /// Returns the body bytes; JSON bodies are re-serialized.
    ///
    /// Build the request with [`Request::raw_response`] when the exact bytes matter.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Raw(bytes) => bytes,
            Self::Json(serde_json::Value::Null) => Vec::new(),
            Self::Json(value) => value.to_string().into_bytes(),
        }
    }
}
