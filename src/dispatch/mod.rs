//! Rate-bounded dispatch to external services
//!
//! This module handles:
//! - Spacing calls by a minimum interval derived from requests per minute
//! - Retrying throttled calls with server-suggested or default waits
//! - Sequential and bounded-concurrency dispatch behind one [`Dispatcher`] trait
//! - One-way downgrade from concurrent to sequential after throttling
//!
//! Both page fetches and batch classification go through a [`DispatchRun`].

pub mod classify;
mod concurrent;
mod gate;
mod retry;
mod sequential;
mod throttle;

pub use concurrent::ConcurrentDispatcher;
pub use gate::RateGate;
pub use retry::{RetryPolicy, RetryingCaller};
pub use sequential::SequentialDispatcher;
pub use throttle::{mentions_throttling, parse_retry_delay};

use crate::config::{DispatchConfig, DispatchMode};
use crate::crawler::FetchError;
use crate::ErrorKind;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// A failed call to an external service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CallError {
    pub kind: ErrorKind,
    /// HTTP status, when the service answered
    pub status: Option<u16>,
    pub message: String,
}

impl CallError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// True if the error is a throttling signal
    ///
    /// Either the kind says so, the status is 429, or the message mentions
    /// throttling.
    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimit
            || self.status == Some(429)
            || mentions_throttling(&self.message)
    }
}

impl From<FetchError> for CallError {
    fn from(err: FetchError) -> Self {
        Self {
            kind: err.kind,
            status: err.status,
            message: err.message,
        }
    }
}

/// Why a dispatched item produced no output
#[derive(Debug, Clone, Error)]
pub enum DispatchFailure {
    #[error("gave up after {attempts} throttled attempts: {last}")]
    RetriesExhausted { attempts: u32, last: CallError },

    #[error(transparent)]
    Failed(CallError),
}

impl DispatchFailure {
    /// The underlying call error
    pub fn error(&self) -> &CallError {
        match self {
            Self::RetriesExhausted { last, .. } => last,
            Self::Failed(error) => error,
        }
    }

    /// Classification recorded for the item
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RetriesExhausted { .. } => ErrorKind::RateLimit,
            Self::Failed(error) => error.kind,
        }
    }
}

/// The outcome for one item, always carrying the item back
#[derive(Debug)]
pub struct Dispatched<I, T> {
    pub item: I,
    pub result: Result<T, DispatchFailure>,
    /// Calls made, including the first
    pub attempts: u32,
    /// At least one attempt was throttled
    pub throttled: bool,
}

/// One kind of external call
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;
    type Output: Send + 'static;

    async fn call(&self, item: &Self::Item) -> Result<Self::Output, CallError>;
}

/// A strategy for issuing a list of items
#[async_trait]
pub trait Dispatcher<O: Operation>: Send + Sync {
    /// Dispatches every item; the result has one entry per item, in item order
    async fn dispatch_all(&self, items: Vec<O::Item>) -> Vec<Dispatched<O::Item, O::Output>>;

    /// How many items a caller should hand over at a time
    fn batch_capacity(&self) -> usize;

    fn name(&self) -> &'static str;
}

/// Worker pool shape for concurrent dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency {
    pub workers: usize,
    pub batch_size: usize,
    pub batch_pause: Duration,
}

/// Resolved dispatch settings for one call site
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub requests_per_minute: u32,
    pub retry: RetryPolicy,
    /// `None` selects sequential dispatch
    pub concurrency: Option<Concurrency>,
}

impl DispatchSettings {
    pub fn sequential(requests_per_minute: u32, retry: RetryPolicy) -> Self {
        Self {
            requests_per_minute,
            retry,
            concurrency: None,
        }
    }

    /// Resolves settings for page fetching
    ///
    /// Concurrent mode is only granted when it is configured, more than one
    /// worker is available, and the politeness delay is at least
    /// `min-concurrent-delay`. Otherwise a warning is logged and sequential
    /// dispatch is used.
    pub fn from_config(config: &DispatchConfig, politeness_delay: Duration) -> Self {
        let retry = RetryPolicy::from_config(config);
        let mut settings = Self::sequential(config.requests_per_minute, retry);

        if config.mode != DispatchMode::Concurrent {
            return settings;
        }

        let min_delay = Duration::from_millis(config.min_concurrent_delay);
        if config.workers <= 1 {
            warn!("Concurrent dispatch needs more than one worker; using sequential");
        } else if politeness_delay < min_delay {
            warn!(
                "Request delay {}ms is below {}ms; using sequential dispatch",
                politeness_delay.as_millis(),
                min_delay.as_millis()
            );
        } else {
            settings.concurrency = Some(Concurrency {
                workers: config.workers,
                batch_size: config.batch_size.max(1),
                batch_pause: Duration::from_millis(config.batch_pause),
            });
        }
        settings
    }

    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }
}

/// Dispatch state for the lifetime of one run
///
/// Holds the active [`Dispatcher`]. After any throttled outcome from the
/// concurrent dispatcher the run switches to sequential dispatch and never
/// switches back.
pub struct DispatchRun<O: Operation> {
    caller: Arc<RetryingCaller<O>>,
    active: Box<dyn Dispatcher<O>>,
    downgraded: bool,
}

impl<O: Operation> DispatchRun<O> {
    pub fn new(operation: O, settings: &DispatchSettings) -> Self {
        let gate = Arc::new(RateGate::per_minute(settings.requests_per_minute));
        let caller = Arc::new(RetryingCaller::new(
            Arc::new(operation),
            gate,
            settings.retry,
        ));

        let active: Box<dyn Dispatcher<O>> = match settings.concurrency {
            Some(concurrency) => Box::new(ConcurrentDispatcher::new(caller.clone(), concurrency)),
            None => Box::new(SequentialDispatcher::new(caller.clone())),
        };
        info!("Dispatch mode: {}", active.name());

        Self {
            caller,
            active,
            downgraded: false,
        }
    }

    /// Name of the active dispatcher
    pub fn mode(&self) -> &'static str {
        self.active.name()
    }

    pub fn is_downgraded(&self) -> bool {
        self.downgraded
    }

    pub fn batch_capacity(&self) -> usize {
        self.active.batch_capacity()
    }

    /// Dispatches `items`, downgrading the run if throttling was observed
    pub async fn dispatch(&mut self, items: Vec<O::Item>) -> Vec<Dispatched<O::Item, O::Output>> {
        let outcomes = self.active.dispatch_all(items).await;

        if !self.downgraded
            && self.active.batch_capacity() > 1
            && outcomes.iter().any(|d| d.throttled)
        {
            warn!("Throttling observed; switching to sequential dispatch for the rest of the run");
            self.active = Box::new(SequentialDispatcher::new(self.caller.clone()));
            self.downgraded = true;
        }

        outcomes
    }

    /// Dispatches a single item
    pub async fn dispatch_one(&mut self, item: O::Item) -> Dispatched<O::Item, O::Output> {
        self.caller.call(item).await
    }
}
