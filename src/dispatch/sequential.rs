use crate::dispatch::retry::RetryingCaller;
use crate::dispatch::{Dispatched, Dispatcher, Operation};
use async_trait::async_trait;
use std::sync::Arc;

/// Issues one call at a time in item order
pub struct SequentialDispatcher<O: Operation> {
    caller: Arc<RetryingCaller<O>>,
}

impl<O: Operation> SequentialDispatcher<O> {
    pub fn new(caller: Arc<RetryingCaller<O>>) -> Self {
        Self { caller }
    }
}

#[async_trait]
impl<O: Operation> Dispatcher<O> for SequentialDispatcher<O> {
    async fn dispatch_all(&self, items: Vec<O::Item>) -> Vec<Dispatched<O::Item, O::Output>> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.caller.call(item).await);
        }
        outcomes
    }

    fn batch_capacity(&self) -> usize {
        1
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}
