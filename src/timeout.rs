use std::time::Duration;

use crate::Method;

/// Timeout applied to ordinary requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout applied to deletions and requests that ask for it explicitly.
pub const EXTENDED_TIMEOUT: Duration = Duration::from_secs(7200);

/// Resolves the per-attempt timeout from the HTTP verb and the request flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeoutPolicy {
    pub default: Duration,
    pub extended: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default: DEFAULT_TIMEOUT,
            extended: EXTENDED_TIMEOUT,
        }
    }
}

impl TimeoutPolicy {
    /// DELETE always gets the extended timeout since deletions may cascade
    /// server-side.
    pub fn resolve(&self, method: Method, extended_requested: bool) -> Duration {
        if method == Method::Delete || extended_requested {
            self.extended
        } else {
            self.default
        }
    }
}
