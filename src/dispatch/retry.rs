//! Retry with fixed waits on throttling

use crate::dispatch::gate::RateGate;
use crate::dispatch::throttle::parse_retry_delay;
use crate::dispatch::{CallError, DispatchFailure, Dispatched, Operation};
use crate::config::DispatchConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How throttled calls are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a call is made at most `max_retries + 1` times
    pub max_retries: u32,
    /// Wait used when the error carries no usable hint
    pub default_wait: Duration,
    /// Added to a server-suggested wait
    pub safety_margin: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            default_wait: Duration::from_millis(config.default_wait),
            safety_margin: Duration::from_millis(config.safety_margin),
        }
    }

    /// Wait before retrying after `error`
    pub fn wait_for(&self, error: &CallError) -> Duration {
        match parse_retry_delay(&error.message) {
            Some(hint) => hint.saturating_add(self.safety_margin),
            None => self.default_wait,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

/// Runs one operation through the rate gate and the retry policy
pub struct RetryingCaller<O: Operation> {
    operation: Arc<O>,
    gate: Arc<RateGate>,
    policy: RetryPolicy,
}

impl<O: Operation> RetryingCaller<O> {
    pub fn new(operation: Arc<O>, gate: Arc<RateGate>, policy: RetryPolicy) -> Self {
        Self {
            operation,
            gate,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Dispatches one item until it succeeds, fails for good, or runs out of retries
    ///
    /// Never returns an error: every outcome is a [`Dispatched`] carrying the item.
    pub async fn call(&self, item: O::Item) -> Dispatched<O::Item, O::Output> {
        let mut attempts = 0u32;
        let mut throttled = false;

        loop {
            self.gate.wait_turn().await;
            attempts += 1;

            let error = match self.operation.call(&item).await {
                Ok(output) => {
                    return Dispatched {
                        item,
                        result: Ok(output),
                        attempts,
                        throttled,
                    }
                }
                Err(error) => error,
            };

            if !error.is_rate_limited() {
                debug!("Call failed without throttling: {}", error);
                return Dispatched {
                    item,
                    result: Err(DispatchFailure::Failed(error)),
                    attempts,
                    throttled,
                };
            }

            throttled = true;
            if attempts > self.policy.max_retries {
                warn!("Giving up after {} throttled attempts: {}", attempts, error);
                return Dispatched {
                    item,
                    result: Err(DispatchFailure::RetriesExhausted {
                        attempts,
                        last: error,
                    }),
                    attempts,
                    throttled,
                };
            }

            let wait = self.policy.wait_for(&error);
            warn!(
                "Throttled (attempt {}/{}), waiting {:.1}s: {}",
                attempts,
                self.policy.max_retries + 1,
                wait.as_secs_f64(),
                error
            );
            sleep(wait).await;
        }
    }
}
