//! Retry controller.
//!
//! Remote mutations are retried at a fixed delay until a wall-clock budget
//! runs out. Whether a given failure is worth retrying is decided by a
//! pluggable [`RetryClassifier`]; the default retries everything.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use xsoar_client::{ApiError, ApiResult};

use crate::error::{Error, Result};

/// Default total time allowed for one retried operation.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(300);

/// Default pause between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(30);

/// Budget and delay for retried operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total wall-clock time across all attempts.
    #[serde(with = "duration_secs")]
    pub budget: Duration,
    /// Fixed pause between attempts.
    #[serde(with = "duration_secs")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom budget and delay.
    #[must_use]
    pub const fn new(budget: Duration, delay: Duration) -> Self {
        Self { budget, delay }
    }

    /// Attempts an always-failing operation gets before the budget runs out.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        if self.delay.is_zero() {
            return u32::MAX;
        }
        let budget = self.budget.as_millis();
        let delay = self.delay.as_millis();
        u32::try_from(budget.div_ceil(delay).max(1)).unwrap_or(u32::MAX)
    }
}

/// Serde helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Verdict on a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    Retry,
    Fatal,
}

/// Decides whether a failed attempt is retried.
pub trait RetryClassifier: Send + Sync + fmt::Debug {
    fn classify(&self, error: &ApiError) -> Retryability;
}

/// Retries every failure until the budget runs out.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryAll;

impl RetryClassifier for RetryAll {
    fn classify(&self, _error: &ApiError) -> Retryability {
        Retryability::Retry
    }
}

/// Retries only transport failures and transient statuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientOnly;

impl RetryClassifier for TransientOnly {
    fn classify(&self, error: &ApiError) -> Retryability {
        if error.is_retryable() {
            Retryability::Retry
        } else {
            Retryability::Fatal
        }
    }
}

/// Runs remote operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    classifier: Arc<dyn RetryClassifier>,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryController {
    /// Create a controller that retries every failure.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            classifier: Arc::new(RetryAll),
        }
    }

    /// Replace the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run `attempt` until it succeeds, a failure is classified fatal, or
    /// the next attempt would start past the budget.
    ///
    /// # Errors
    ///
    /// Returns `Error::Remote` for a fatal failure and
    /// `Error::RetriesExhausted` carrying the last failure when the budget
    /// runs out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ApiResult<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            let error = match attempt().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(operation, attempts, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            warn!(
                operation,
                attempt = attempts,
                max_attempts = self.policy.max_attempts(),
                status = ?error.status_code(),
                body = error.body(),
                error = %error,
                "Remote call failed"
            );

            if self.classifier.classify(&error) == Retryability::Fatal {
                return Err(Error::remote(operation, error));
            }
            if started.elapsed().saturating_add(self.policy.delay) >= self.policy.budget {
                return Err(Error::retries_exhausted(operation, attempts, error));
            }
            sleep(self.policy.delay).await;
        }
    }
}
