//! Decides whether a failed attempt should be retried.

use std::time::Duration;

use crate::{transport::HttpResponse, TransportError};

/// Error code of a configuration-row version conflict; the only 409 that is retried.
pub const VERSION_CONFLICT_CODE: &str = "storage.components.configurations.versionConflict";

/// Retry verdict for one attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDecision {
    NoRetry,
    /// Retry, optionally waiting at least the server-provided delay.
    Retry(Option<Duration>),
}

impl RetryDecision {
    pub fn is_retry(self) -> bool {
        matches!(self, Self::Retry(_))
    }
}

/// What one attempt produced.
#[derive(Clone, Copy, Debug)]
pub enum Outcome<'a> {
    Transport(&'a TransportError),
    Response(&'a HttpResponse),
}

/// Classifier verdict plus whether the response signalled maintenance mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Classification {
    pub decision: RetryDecision,
    pub maintenance: bool,
}

impl Classification {
    fn no_retry() -> Self {
        Self {
            decision: RetryDecision::NoRetry,
            maintenance: false,
        }
    }
}

/// Pure retry classifier configured per client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryClassifier {
    pub retry_on_maintenance: bool,
}

impl Default for RetryClassifier {
    fn default() -> Self {
        Self {
            retry_on_maintenance: true,
        }
    }
}

impl RetryClassifier {
    pub fn new(retry_on_maintenance: bool) -> Self {
        Self {
            retry_on_maintenance,
        }
    }

    pub fn classify(&self, outcome: Outcome<'_>) -> Classification {
        let response = match outcome {
            Outcome::Transport(_) => {
                return Classification {
                    decision: RetryDecision::Retry(None),
                    maintenance: false,
                }
            }
            Outcome::Response(response) => response,
        };

        match response.status {
            503 => {
                let maintenance = is_maintenance(response);
                let decision = if maintenance && !self.retry_on_maintenance {
                    RetryDecision::NoRetry
                } else {
                    RetryDecision::Retry(retry_after(response))
                };
                Classification {
                    decision,
                    maintenance,
                }
            }
            500 | 502 | 504 => Classification {
                decision: RetryDecision::Retry(retry_after(response)),
                maintenance: false,
            },
            409 if is_version_conflict(&response.body) => Classification {
                decision: RetryDecision::Retry(None),
                maintenance: false,
            },
            _ => Classification::no_retry(),
        }
    }
}

/// Every 503 is treated as maintenance; no stricter marker is required.
pub fn is_maintenance(response: &HttpResponse) -> bool {
    response.status == 503
}

/// Parses `Retry-After` given in whole seconds.
pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_version_conflict(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("code")
                .and_then(|code| code.as_str())
                .map(|code| code == VERSION_CONFLICT_CODE)
        })
        .unwrap_or(false)
}
