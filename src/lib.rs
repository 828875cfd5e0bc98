//! `storage-api-http` is an async HTTP client for the Storage API of a cloud
//! data-storage platform.
//!
//! Every call goes through one request pipeline that:
//! - signs the request with a token or OAuth credential and routes it through
//!   the client's development branch when one is set,
//! - applies a per-verb timeout ([`TimeoutPolicy`]),
//! - retries transport failures, 5xx responses (except 501) and
//!   configuration version conflicts with exponential backoff,
//! - normalizes failures into [`StorageApiError`].
//!
//! Typed helpers such as [`StorageClient::list_buckets`] and
//! [`StorageClient::drop_bucket`] sit on top of [`StorageClient::send`].

mod auth;
mod backoff;
mod client;
mod decode;
mod error;
mod logging;
mod options;
mod pipeline;
mod request;
pub mod retry;
mod timeout;
pub mod transport;
mod types;
mod wire;

#[cfg(test)]
mod test_support;

pub use auth::{AuthContext, AuthMethod, RequestSigner, BRANCH_INDEPENDENT_ROOTS, TOKEN_HEADER};
pub use backoff::{BackoffScheduler, Clock, RetryBudget, TokioClock};
pub use client::StorageClient;
pub use error::{StorageApiError, TransportError, TransportErrorKind};
#[cfg(feature = "tracing")]
pub use logging::TracingLogger;
pub use logging::{Fields, LogLevel, NoopLogger, RequestLogger};
pub use options::ClientOptions;
pub use pipeline::RequestPipeline;
pub use request::{Body, BranchScope, Method, Request, ResponseBody};
pub use retry::{RetryClassifier, RetryDecision};
pub use timeout::{TimeoutPolicy, DEFAULT_TIMEOUT, EXTENDED_TIMEOUT};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{
    Bucket, DropOptions, Event, Job, JobError, JobStatus, Stage, Table, TokenInfo, TokenOwner,
};

pub type Result<T> = std::result::Result<T, StorageApiError>;
