use std::time::Duration;

use async_trait::async_trait;

/// Attempt accounting for one logical call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub attempts_made: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts_made: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

/// Exponential backoff bounded by a ceiling and a per-call attempt cap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackoffScheduler {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffScheduler {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Fresh budget for a new logical call.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_attempts)
    }

    pub fn should_retry(&self, budget: &RetryBudget) -> bool {
        budget.attempts_made < budget.max_attempts
    }

    /// Records one failed attempt. Never moves past `max_attempts`.
    pub fn record_attempt(&self, budget: &mut RetryBudget) {
        if budget.attempts_made < budget.max_attempts {
            budget.attempts_made += 1;
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Delay honouring a server hint, still capped by the ceiling.
    pub fn delay_with_hint(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = self.delay_for(attempt);
        match hint {
            Some(hint) => hint.max(computed).min(self.max_delay),
            None => computed,
        }
    }
}

/// Time source used for backoff waits.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
