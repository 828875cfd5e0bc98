use std::fmt;

use reqwest::{header, Url};

use crate::{
    transport::HttpRequest, Body, BranchScope, Request, Result, StorageApiError,
};

/// Header carrying a Storage API token.
pub const TOKEN_HEADER: &str = "X-StorageApi-Token";
/// Header carrying the run id used to correlate events.
pub const RUN_ID_HEADER: &str = "X-KBC-RunId";

/// Path roots that always target the default branch.
pub const BRANCH_INDEPENDENT_ROOTS: &[&str] = &["tickets", "tokens", "dev-branches", "jobs"];

/// How the credential is presented to the platform.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AuthMethod {
    /// `X-StorageApi-Token` header.
    #[default]
    Token,
    /// `Authorization: Bearer` header.
    OAuth,
}

impl AuthMethod {
    /// Parses the `authMethod` option. Matching is exact; `None` means token auth.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("token") => Ok(Self::Token),
            Some("oauth") => Ok(Self::OAuth),
            Some(other) => Err(StorageApiError::Configuration(format!(
                "invalid authMethod '{other}', expected 'token' or 'oauth'"
            ))),
        }
    }
}

/// Credential and branch scope shared by every request of one client.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub method: AuthMethod,
    pub token: String,
    pub branch_id: Option<String>,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("method", &self.method)
            .field("token", &"<redacted>")
            .field("branch_id", &self.branch_id)
            .finish()
    }
}

impl AuthContext {
    pub fn new(method: AuthMethod, token: impl Into<String>) -> Self {
        Self {
            method,
            token: token.into(),
            branch_id: None,
        }
    }

    /// Scopes the context to a development branch. The id must not be empty.
    pub fn with_branch(mut self, branch_id: impl Into<String>) -> Result<Self> {
        let branch_id = branch_id.into();
        let trimmed = branch_id.trim();
        if trimmed.is_empty() {
            return Err(StorageApiError::Configuration(
                "branch id cannot be empty".to_owned(),
            ));
        }
        self.branch_id = Some(trimmed.to_owned());
        Ok(self)
    }
}

/// Turns logical requests into authenticated, branch-routed HTTP requests.
#[derive(Clone, Debug)]
pub struct RequestSigner {
    base_url: String,
    user_agent: String,
    run_id: Option<String>,
}

impl RequestSigner {
    pub fn new(base_url: &str, user_agent: impl Into<String>, run_id: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            user_agent: user_agent.into(),
            run_id,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sign(&self, request: &Request, auth: &AuthContext) -> Result<HttpRequest> {
        let token = auth.token.trim();
        if token.is_empty() {
            return Err(StorageApiError::Configuration(
                "no token or OAuth credential configured".to_owned(),
            ));
        }

        let path = self.route(request, auth);
        let mut url = Url::parse(&format!("{}/v2/storage/{}", self.base_url, path))
            .map_err(|err| StorageApiError::Configuration(format!("invalid request url: {err}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut headers = Vec::with_capacity(request.headers.len() + 5);
        match auth.method {
            AuthMethod::Token => headers.push((TOKEN_HEADER.to_owned(), token.to_owned())),
            AuthMethod::OAuth => headers.push((
                header::AUTHORIZATION.as_str().to_owned(),
                normalize_bearer_authorization(token),
            )),
        }
        headers.push((header::USER_AGENT.as_str().to_owned(), self.user_agent.clone()));
        headers.push((header::ACCEPT.as_str().to_owned(), "application/json".to_owned()));
        if let Some(run_id) = &self.run_id {
            headers.push((RUN_ID_HEADER.to_owned(), run_id.clone()));
        }

        let body = match &request.body {
            Body::Empty => None,
            Body::Json(value) => {
                headers.push((
                    header::CONTENT_TYPE.as_str().to_owned(),
                    "application/json".to_owned(),
                ));
                Some(value.to_string().into_bytes())
            }
        };
        headers.extend(request.headers.iter().cloned());

        Ok(HttpRequest {
            method: request.method,
            url: url.to_string(),
            headers,
            body,
            timeout: None,
        })
    }

    fn route(&self, request: &Request, auth: &AuthContext) -> String {
        let path = request.path.trim_start_matches('/');
        match &auth.branch_id {
            Some(branch_id) if is_branch_aware(request, path) => {
                format!("branch/{branch_id}/{path}")
            }
            _ => path.to_owned(),
        }
    }
}

fn is_branch_aware(request: &Request, path: &str) -> bool {
    if request.branch_scope == BranchScope::Default {
        return false;
    }
    let root = path.split(['/', '?']).next().unwrap_or_default();
    !BRANCH_INDEPENDENT_ROOTS.contains(&root)
}

pub(crate) fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
