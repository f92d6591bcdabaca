//! Bounded batch execution with cooperative cancellation
//!
//! Units are dispatched lazily, at most `concurrency` at a time. Once the
//! cancellation flag is set no further unit starts; units already running
//! finish normally and the rest are handed back undispatched.

use futures::future::{self, Either};
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new units
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a batch run
#[derive(Debug)]
pub struct Batch<T, R> {
    /// Results of the units that ran, in completion order
    pub completed: Vec<R>,
    /// Units never started because of cancellation, in input order
    pub undispatched: Vec<T>,
}

/// Default concurrency: the number of available CPUs
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Run `work` over `items` with at most `concurrency` units in flight
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    cancellation: &Cancellation,
    work: F,
) -> Batch<T, R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut completed = Vec::with_capacity(items.len());
    let mut undispatched = Vec::new();

    let mut stream = futures::stream::iter(items)
        .map(|item| {
            if cancellation.is_cancelled() {
                Either::Left(future::ready(Err(item)))
            } else {
                Either::Right(work(item).map(Ok))
            }
        })
        .buffer_unordered(concurrency.max(1));

    while let Some(result) = stream.next().await {
        match result {
            Ok(output) => completed.push(output),
            Err(item) => undispatched.push(item),
        }
    }

    if !undispatched.is_empty() {
        tracing::warn!(count = undispatched.len(), "interrupted; units not started");
    }

    Batch {
        completed,
        undispatched,
    }
}
