use std::time::Duration;

use crate::{AuthMethod, Result, StorageApiError, TimeoutPolicy};

/// Configures endpoint, credentials, timeouts and retry behavior.
///
/// Every recognized option is a field here; [`ClientOptions::validate`] runs
/// once when the client is built.
#[derive(Clone, Eq, PartialEq)]
pub struct ClientOptions {
    /// Base endpoint, e.g. `https://connection.keboola.com`.
    pub url: String,
    /// Storage API token or OAuth access token.
    pub token: String,
    pub auth_method: AuthMethod,
    /// Maximum attempts per logical call, the first one included.
    ///
    /// `0` and `1` both mean a single attempt with no retry; `N >= 2` allows
    /// up to `N - 1` retries.
    pub backoff_max_tries: u32,
    /// Retry 503 maintenance responses instead of failing fast.
    pub retry_on_maintenance: bool,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
    /// Ceiling for a single backoff wait in milliseconds.
    pub retry_backoff_max_ms: u64,
    pub timeouts: TimeoutPolicy,
    pub user_agent: String,
    /// Sent as `X-KBC-RunId` to correlate events.
    pub run_id: Option<String>,
    /// Delay between polls of an asynchronous storage job.
    pub job_poll_interval_ms: u64,
    /// Upper bound on waiting for one job; `None` waits indefinitely.
    pub job_poll_max_wait_ms: Option<u64>,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("auth_method", &self.auth_method)
            .field("backoff_max_tries", &self.backoff_max_tries)
            .field("retry_on_maintenance", &self.retry_on_maintenance)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("retry_backoff_max_ms", &self.retry_backoff_max_ms)
            .field("timeouts", &self.timeouts)
            .field("user_agent", &self.user_agent)
            .field("run_id", &self.run_id)
            .field("job_poll_interval_ms", &self.job_poll_interval_ms)
            .field("job_poll_max_wait_ms", &self.job_poll_max_wait_ms)
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            auth_method: AuthMethod::Token,
            backoff_max_tries: 0,
            retry_on_maintenance: true,
            retry_backoff_ms: 1_000,
            retry_backoff_max_ms: 32_000,
            timeouts: TimeoutPolicy::default(),
            user_agent: concat!("storage-api-http/", env!("CARGO_PKG_VERSION")).to_owned(),
            run_id: None,
            job_poll_interval_ms: 1_000,
            job_poll_max_wait_ms: None,
        }
    }
}

impl ClientOptions {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Sets the auth method from its option string (`"token"` or `"oauth"`).
    pub fn auth_method_str(mut self, value: Option<&str>) -> Result<Self> {
        self.auth_method = AuthMethod::parse(value)?;
        Ok(self)
    }

    pub fn backoff_max_tries(mut self, tries: u32) -> Self {
        self.backoff_max_tries = tries;
        self
    }

    pub fn retry_on_maintenance(mut self, enabled: bool) -> Self {
        self.retry_on_maintenance = enabled;
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(StorageApiError::Configuration(
                "url must not be empty".to_owned(),
            ));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(StorageApiError::Configuration(format!(
                "url '{url}' must start with http:// or https://"
            )));
        }
        if self.token.trim().is_empty() {
            return Err(StorageApiError::Configuration(
                "no token or OAuth credential configured".to_owned(),
            ));
        }
        if self.retry_backoff_max_ms < self.retry_backoff_ms {
            return Err(StorageApiError::Configuration(format!(
                "retry_backoff_max_ms ({}) must be at least retry_backoff_ms ({})",
                self.retry_backoff_max_ms, self.retry_backoff_ms
            )));
        }
        if self.timeouts.default.is_zero() || self.timeouts.extended < self.timeouts.default {
            return Err(StorageApiError::Configuration(
                "extended timeout must be at least the non-zero default timeout".to_owned(),
            ));
        }
        Ok(())
    }

    pub(crate) fn base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub(crate) fn max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms)
    }
}
