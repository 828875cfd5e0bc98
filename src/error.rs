use std::{fmt, time::Duration};

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum StorageApiError {
    /// No response was received (DNS, connect, TLS, timeout).
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    /// The platform is in maintenance mode and maintenance retry is disabled.
    #[error("Maintenance: {reason}")]
    Maintenance {
        /// Reason reported by the platform, or a generic message.
        reason: String,
        /// Value of the `Retry-After` header, when present.
        retry_after: Option<Duration>,
        /// `estimatedEndTime` from the maintenance body, when present.
        estimated_end_time: Option<String>,
    },
    /// Non-retried HTTP status with the original code and body.
    #[error("http error {status} for {url}: {}", http_detail(.message, .body))]
    Http {
        status: u16,
        url: String,
        /// Platform error code from the JSON error envelope.
        code: Option<String>,
        /// Platform error message from the JSON error envelope.
        message: Option<String>,
        /// `exceptionId` the platform logged the failure under.
        exception_id: Option<String>,
        /// Raw response body (truncated for very large payloads).
        body: String,
    },
    /// Domain error reported inside a successful transport response.
    #[error("application error for {url}: {message}")]
    Application {
        url: String,
        code: Option<String>,
        message: String,
        exception_id: Option<String>,
        body: String,
    },
    /// Storage job finished in the `error` state.
    #[error("job {id} failed: {message}")]
    Job {
        id: String,
        code: Option<String>,
        message: String,
    },
    /// Invalid client construction or options.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Response body does not match the requested result shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl StorageApiError {
    /// HTTP status code of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Maintenance { .. } => Some(503),
            _ => None,
        }
    }

    /// Platform error code, if the error carried one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } | Self::Application { code, .. } | Self::Job { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }

    /// Platform `exceptionId`, useful when reporting a failure upstream.
    pub fn exception_id(&self) -> Option<&str> {
        match self {
            Self::Http { exception_id, .. } | Self::Application { exception_id, .. } => {
                exception_id.as_deref()
            }
            _ => None,
        }
    }
}

fn http_detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    message.as_deref().unwrap_or(body)
}

/// Category of a transport-level failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure raised by a [`Transport`](crate::Transport) before a response was received.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}
