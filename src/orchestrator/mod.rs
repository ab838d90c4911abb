//! Driving processes and distributed runs.
//!
//! A `Runner` drives one `BalancingLearner`: ask for points, evaluate them
//! through an `Executor`, tell the results, until its goal is reached or it is
//! cancelled. Its status is published on a `watch` channel that a periodic
//! saver follows.
//!
//! `runners_in_executor` splits learners into groups and runs each group as
//! its own runner with periodic and final checkpoints. `splitter::combine`
//! reads the groups back afterwards.
//!
//! # Module Structure
//!
//! - `state`: `RunnerStatus`, `SaverPhase`
//! - `saver`: the periodic saver loop and its handle
//! - `executor`: the `Executor` seam and `LocalExecutor`

pub mod executor;
pub mod saver;
pub mod state;

pub use executor::{Executor, GroupFuture, LocalExecutor};
pub use saver::{start_periodic_saver, PeriodicSaveHandle, SaveFailure, StatusSource};
pub use state::{RunnerStatus, SaverPhase};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::checkpoint::aggregate::write_snapshot;
use crate::checkpoint::{BalancingLearner, CheckpointStore, FileStore, SaveReport};
use crate::config::{CheckpointConfig, DistributeConfig};
use crate::error::{CheckpointError, RunnerError};
use crate::learner::Learner;
use crate::models::Goal;
use crate::splitter::split;

/// A driving process for one aggregate learner.
pub struct Runner {
    /// Shared with savers; they snapshot under a read lock
    learner: Arc<RwLock<BalancingLearner>>,
    status_rx: watch::Receiver<RunnerStatus>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<Result<RunnerStatus, RunnerError>>,
}

impl Runner {
    /// Spawn the sampling loop on the current tokio runtime.
    ///
    /// Each round asks for one point per target engine (at least one). With
    /// no goal the loop runs until cancelled or the learner has nothing left
    /// to ask.
    pub fn start(
        learner: BalancingLearner,
        goal: Option<Goal>,
        executor: Arc<dyn Executor>,
        targets: Vec<usize>,
    ) -> Self {
        let learner = Arc::new(RwLock::new(learner));
        let (status_tx, status_rx) = watch::channel(RunnerStatus::Running);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let shared = Arc::clone(&learner);
        let task = tokio::spawn(async move {
            let outcome = drive(shared, goal, executor, targets, cancel_rx).await;
            let status = match &outcome {
                Ok(status) => *status,
                Err(_) => RunnerStatus::Failed,
            };
            let _ = status_tx.send(status);
            outcome
        });

        Runner {
            learner,
            status_rx,
            cancel_tx,
            task,
        }
    }

    pub fn status(&self) -> RunnerStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunnerStatus> {
        self.status_rx.clone()
    }

    pub fn learner(&self) -> Arc<RwLock<BalancingLearner>> {
        Arc::clone(&self.learner)
    }

    /// Stop sampling. Evaluations in flight are abandoned. Dropping the
    /// runner has the same effect.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Wait for the sampling loop to end.
    pub async fn join(self) -> Result<RunnerStatus, RunnerError> {
        self.task
            .await
            .map_err(|e| RunnerError::Join(e.to_string()))?
    }

    /// Bind a periodic saver to this runner, writing every member under
    /// `folder` each `interval` while the runner is running.
    ///
    /// Member names are resolved up front, so a member without a name fails
    /// here rather than on every tick.
    pub async fn start_periodic_saver(
        &self,
        store: Arc<dyn CheckpointStore>,
        folder: impl Into<String>,
        config: &CheckpointConfig,
        interval: Duration,
    ) -> Result<PeriodicSaveHandle, RunnerError> {
        let folder = folder.into();
        let names = self.learner.read().await.member_names(config.naming.as_ref())?;
        let compress = config.compress;
        let learner = Arc::clone(&self.learner);

        log::info!(
            "[Saver] Saving {} members to {} every {:?}",
            names.len(),
            folder,
            interval
        );
        Ok(start_periodic_saver(self.subscribe(), interval, move || {
            let learner = Arc::clone(&learner);
            let store = Arc::clone(&store);
            let folder = folder.clone();
            let names = names.clone();
            async move {
                let report = save_shared(learner, store, folder, names, compress).await?;
                report.into_result().map(|_| ()).map_err(RunnerError::from)
            }
        }))
    }

    /// Save every member now, outside the periodic schedule.
    pub async fn save_now(
        &self,
        store: Arc<dyn CheckpointStore>,
        folder: &str,
        config: &CheckpointConfig,
    ) -> Result<SaveReport, RunnerError> {
        let names = self.learner.read().await.member_names(config.naming.as_ref())?;
        save_shared(
            self.learner(),
            store,
            folder.to_string(),
            names,
            config.compress,
        )
        .await
    }
}

/// Snapshot under a read lock, then write on the blocking pool.
async fn save_shared(
    learner: Arc<RwLock<BalancingLearner>>,
    store: Arc<dyn CheckpointStore>,
    folder: String,
    names: Vec<String>,
    compress: bool,
) -> Result<SaveReport, RunnerError> {
    let snapshot = learner.read().await.snapshot();
    tokio::task::spawn_blocking(move || {
        write_snapshot(store.as_ref(), &folder, &names, snapshot, compress)
    })
    .await
    .map_err(|e| RunnerError::Join(e.to_string()))
}

async fn drive(
    learner: Arc<RwLock<BalancingLearner>>,
    goal: Option<Goal>,
    executor: Arc<dyn Executor>,
    targets: Vec<usize>,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<RunnerStatus, RunnerError> {
    let batch_size = targets.len().max(1);

    loop {
        if *cancel_rx.borrow() {
            log::info!("[Runner] Cancelled");
            return Ok(RunnerStatus::Cancelled);
        }

        let batch = {
            let mut guard = learner.write().await;
            if let Some(goal) = goal {
                if goal.is_reached(guard.npoints(), guard.loss()) {
                    log::info!(
                        "[Runner] Goal reached with {} points, loss {:.3e}",
                        guard.npoints(),
                        guard.loss()
                    );
                    return Ok(RunnerStatus::Finished);
                }
            }
            let asked = guard.ask(batch_size);
            let mut batch = Vec::with_capacity(asked.len());
            for (index, point) in asked {
                if let Some(function) = guard.function_of(index) {
                    batch.push((index, point, function));
                }
            }
            batch
        };

        if batch.is_empty() {
            log::info!("[Runner] Nothing left to sample");
            return Ok(RunnerStatus::Finished);
        }

        let evaluations = join_all(
            batch
                .iter()
                .map(|(_, point, function)| executor.evaluate(Arc::clone(function), *point, &targets)),
        );

        let outcomes = tokio::select! {
            outcomes = evaluations => outcomes,
            _ = cancel_rx.changed() => {
                log::info!("[Runner] Cancelled with {} evaluations in flight", batch.len());
                return Ok(RunnerStatus::Cancelled);
            }
        };

        let mut guard = learner.write().await;
        for ((index, point, _), outcome) in batch.into_iter().zip(outcomes) {
            let outcome = outcome?;
            guard.tell((index, point), &outcome)?;
        }
    }
}

/// Run one group to completion and release its engines, whatever the outcome.
async fn run_group(
    index: usize,
    learner: BalancingLearner,
    names: Vec<String>,
    targets: Vec<usize>,
    executor: Arc<dyn Executor>,
    store: Arc<dyn CheckpointStore>,
    config: DistributeConfig,
) -> Result<BalancingLearner, RunnerError> {
    let outcome = sample_group(
        index,
        learner,
        names,
        &targets,
        Arc::clone(&executor),
        store,
        &config,
    )
    .await;
    executor.shutdown(&targets);
    outcome
}

/// Resume, sample with periodic saving, then save a final time. The final
/// save runs even when sampling or the saver failed.
async fn sample_group(
    index: usize,
    mut learner: BalancingLearner,
    names: Vec<String>,
    targets: &[usize],
    executor: Arc<dyn Executor>,
    store: Arc<dyn CheckpointStore>,
    config: &DistributeConfig,
) -> Result<BalancingLearner, RunnerError> {
    let folder = config.folder_for(index);

    if config.resume {
        let store = Arc::clone(&store);
        let folder = folder.clone();
        let checkpoint = config.checkpoint.clone();
        learner = tokio::task::spawn_blocking(move || {
            learner
                .load_all(store.as_ref(), &folder, &checkpoint)
                .map(|_| learner)
        })
        .await
        .map_err(|e| RunnerError::Join(e.to_string()))??;
    }

    log::info!(
        "[Runner] Group {} starting with {} learners on engines {:?}",
        index,
        learner.len(),
        targets
    );
    let runner = Runner::start(learner, config.goal, executor, targets.to_vec());
    let saver = if config.interval_secs > 0 {
        Some(
            runner
                .start_periodic_saver(
                    Arc::clone(&store),
                    folder.clone(),
                    &config.checkpoint,
                    config.interval(),
                )
                .await?,
        )
    } else {
        None
    };

    let shared = runner.learner();
    let outcome = runner.join().await;

    let saver_outcome = match saver {
        Some(saver) => {
            saver.cancel();
            saver.join().await.map(|_| ())
        }
        None => Ok(()),
    };

    let report = save_shared(
        Arc::clone(&shared),
        store,
        folder.clone(),
        names,
        config.checkpoint.compress,
    )
    .await?;

    let status = outcome?;
    saver_outcome?;
    report.into_result()?;
    log::info!("[Runner] Group {} {} and saved to {}", index, status.as_str(), folder);

    let learner = match Arc::try_unwrap(shared) {
        Ok(lock) => lock.into_inner(),
        Err(shared) => shared.read().await.clone(),
    };
    Ok(learner)
}

/// Split `learners` over `config.n_groups` runners and submit each to
/// `executor`, checkpointing to a `FileStore`.
///
/// Runner `i` is submitted to engine `i`; engines from `n_groups` up are
/// shared out between the groups for evaluations.
pub fn runners_in_executor(
    learners: Vec<Learner>,
    executor: Arc<dyn Executor>,
    config: &DistributeConfig,
) -> Result<Vec<GroupFuture>, RunnerError> {
    runners_in_executor_with_store(learners, executor, Arc::new(FileStore::new()), config)
}

pub fn runners_in_executor_with_store(
    learners: Vec<Learner>,
    executor: Arc<dyn Executor>,
    store: Arc<dyn CheckpointStore>,
    config: &DistributeConfig,
) -> Result<Vec<GroupFuture>, RunnerError> {
    if config.goal.is_none() && config.interval_secs == 0 {
        return Err(RunnerError::NoGoalConfigured);
    }

    // Member names are resolved before anything is dispatched
    let groups = split(learners, config.n_groups)?
        .into_iter()
        .map(|learners| {
            let learner = BalancingLearner::new(learners);
            let names = learner.member_names(config.checkpoint.naming.as_ref())?;
            Ok((learner, names))
        })
        .collect::<Result<Vec<_>, CheckpointError>>()?;
    let spare: Vec<usize> = (config.n_groups..executor.engines()).collect();
    let mut target_groups = if spare.is_empty() {
        Vec::new()
    } else {
        split(spare, config.n_groups)?
    };
    target_groups.resize(groups.len(), Vec::new());

    log::info!(
        "[Runner] Distributing over {} groups, {} engines",
        groups.len(),
        executor.engines()
    );

    let futures = groups
        .into_iter()
        .zip(target_groups)
        .enumerate()
        .map(|(index, ((learner, names), targets))| {
            let work = run_group(
                index,
                learner,
                names,
                targets,
                Arc::clone(&executor),
                Arc::clone(&store),
                config.clone(),
            )
            .boxed();
            executor.submit(work, vec![index])
        })
        .collect();
    Ok(futures)
}
