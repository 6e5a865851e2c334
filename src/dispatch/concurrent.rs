//! Bounded worker pool dispatch

use crate::dispatch::retry::RetryingCaller;
use crate::dispatch::{Concurrency, Dispatched, Dispatcher, Operation};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Submits items in small batches to a fixed number of workers
///
/// Batches are submitted in item order and outcomes are returned in item
/// order. Once any call in a batch was throttled, the rest of the items are
/// dispatched one at a time.
pub struct ConcurrentDispatcher<O: Operation> {
    caller: Arc<RetryingCaller<O>>,
    concurrency: Concurrency,
}

impl<O: Operation> ConcurrentDispatcher<O> {
    pub fn new(caller: Arc<RetryingCaller<O>>, concurrency: Concurrency) -> Self {
        Self {
            caller,
            concurrency,
        }
    }

    async fn run_batch(&self, batch: Vec<O::Item>) -> Vec<Dispatched<O::Item, O::Output>> {
        stream::iter(batch)
            .map(|item| {
                let caller = self.caller.clone();
                async move { caller.call(item).await }
            })
            .buffered(self.concurrency.workers.max(1))
            .collect()
            .await
    }
}

#[async_trait]
impl<O: Operation> Dispatcher<O> for ConcurrentDispatcher<O> {
    async fn dispatch_all(&self, items: Vec<O::Item>) -> Vec<Dispatched<O::Item, O::Output>> {
        let batch_size = self.concurrency.batch_size.max(1);
        let mut outcomes = Vec::with_capacity(items.len());
        let mut pending = items.into_iter().peekable();
        let mut throttled = false;

        while pending.peek().is_some() {
            if throttled {
                for item in pending.by_ref() {
                    outcomes.push(self.caller.call(item).await);
                }
                break;
            }

            if !outcomes.is_empty() && !self.concurrency.batch_pause.is_zero() {
                sleep(self.concurrency.batch_pause).await;
            }

            let batch: Vec<O::Item> = pending.by_ref().take(batch_size).collect();
            debug!("Dispatching batch of {}", batch.len());
            let results = self.run_batch(batch).await;

            if results.iter().any(|d| d.throttled) {
                warn!("Throttled during a concurrent batch; finishing sequentially");
                throttled = true;
            }
            outcomes.extend(results);
        }

        outcomes
    }

    fn batch_capacity(&self) -> usize {
        self.concurrency.batch_size.max(1)
    }

    fn name(&self) -> &'static str {
        "concurrent"
    }
}
