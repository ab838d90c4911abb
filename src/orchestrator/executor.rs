//! Execution backend for driving processes and sample evaluations.
//!
//! The `Executor` trait is the seam to a remote-execution client: it accepts a
//! unit of work plus the engines it may use and hands back a future.
//! `LocalExecutor` runs everything on the current tokio runtime, treating
//! engine indices as labels.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::checkpoint::BalancingLearner;
use crate::error::RunnerError;
use crate::learner::SampleFn;
use crate::models::Point;

/// A group run, resolving to the group's learner once it has finished.
pub type GroupFuture = BoxFuture<'static, Result<BalancingLearner, RunnerError>>;

pub trait Executor: Send + Sync {
    /// Number of engines this executor can address.
    fn engines(&self) -> usize;

    /// Run `work` on `targets`.
    fn submit(&self, work: GroupFuture, targets: Vec<usize>) -> GroupFuture;

    /// Evaluate `function` at `point` on one of `targets`.
    fn evaluate(
        &self,
        function: SampleFn,
        point: Point,
        targets: &[usize],
    ) -> BoxFuture<'static, Result<Value, RunnerError>>;

    /// Release `targets`; nothing more is submitted to them.
    fn shutdown(&self, targets: &[usize]);
}

/// Executor on the local tokio runtime.
#[derive(Debug)]
pub struct LocalExecutor {
    engines: usize,
    evaluations: AtomicUsize,
    shut_down: Mutex<BTreeSet<usize>>,
}

impl LocalExecutor {
    pub fn new(engines: usize) -> Self {
        LocalExecutor {
            engines,
            evaluations: AtomicUsize::new(0),
            shut_down: Mutex::new(BTreeSet::new()),
        }
    }

    /// One engine per logical CPU.
    pub fn with_cpus() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn shut_down_targets(&self) -> BTreeSet<usize> {
        self.shut_down
            .lock()
            .map(|set| set.clone())
            .unwrap_or_default()
    }
}

impl Executor for LocalExecutor {
    fn engines(&self) -> usize {
        self.engines
    }

    fn submit(&self, work: GroupFuture, targets: Vec<usize>) -> GroupFuture {
        log::debug!("[Executor] Submitting group to engines {:?}", targets);
        let handle = tokio::spawn(work);
        async move {
            handle
                .await
                .map_err(|e| RunnerError::Join(e.to_string()))?
        }
        .boxed()
    }

    fn evaluate(
        &self,
        function: SampleFn,
        point: Point,
        _targets: &[usize],
    ) -> BoxFuture<'static, Result<Value, RunnerError>> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::task::spawn_blocking(move || function(&point));
        async move { handle.await.map_err(|e| RunnerError::Join(e.to_string())) }.boxed()
    }

    fn shutdown(&self, targets: &[usize]) {
        if targets.is_empty() {
            return;
        }
        log::info!("[Executor] Shutting down engines {:?}", targets);
        if let Ok(mut set) = self.shut_down.lock() {
            set.extend(targets.iter().copied());
        }
    }
}
