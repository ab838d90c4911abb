//! Integration tests for distributed runs
//!
//! - configuration errors raised before any work is dispatched
//! - end to end: split, run, final save, combine
//! - resume from the checkpoints of an earlier run

use adaptive_tools::checkpoint::{join_name, CheckpointStore, MemoryStore};
use adaptive_tools::config::DistributeConfig;
use adaptive_tools::error::{CheckpointError, RunnerError, SplitError};
use adaptive_tools::learner::{Learner, LearnerKind, PointLearner};
use adaptive_tools::models::{Goal, Point};
use adaptive_tools::orchestrator::{
    runners_in_executor, runners_in_executor_with_store, Executor, LocalExecutor,
};
use adaptive_tools::splitter::combine;
use futures::future::join_all;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn task(offset: f64) -> Learner {
    Learner::new(
        LearnerKind::Point(PointLearner::new((-1.0, 1.0))),
        move |p: &Point| match p {
            Point::X(x) => json!((x.0 - offset).abs()),
            _ => json!(null),
        },
    )
}

fn tasks(n: usize) -> Vec<Learner> {
    (0..n).map(|i| task(i as f64 / 10.0)).collect()
}

fn config_in(root: &Path, n_groups: usize, goal: Option<Goal>) -> DistributeConfig {
    DistributeConfig {
        n_groups,
        goal,
        interval_secs: 3600,
        folder_template: root.join("tmp-{}").to_string_lossy().into_owned(),
        combine_pattern: root
            .join("tmp-*")
            .join("learner_*.ckpt")
            .to_string_lossy()
            .into_owned(),
        ..DistributeConfig::default()
    }
}

#[test]
fn test_no_goal_and_no_interval_fails_upfront() {
    let dir = tempfile::tempdir().unwrap();
    let config = DistributeConfig {
        interval_secs: 0,
        ..config_in(dir.path(), 2, None)
    };
    let executor = Arc::new(LocalExecutor::new(4));

    let err = runners_in_executor(tasks(4), executor.clone(), &config).err();
    assert!(matches!(err, Some(RunnerError::NoGoalConfigured)));
    assert_eq!(executor.evaluations(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_zero_groups_is_a_split_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 0, Some(Goal::NPoints(1)));
    let executor: Arc<dyn Executor> = Arc::new(LocalExecutor::new(2));
    let err = runners_in_executor(tasks(2), executor, &config).err();
    assert!(matches!(
        err,
        Some(RunnerError::Split(SplitError::InvalidGroupCount(0)))
    ));
}

#[test]
fn test_unnamed_members_fail_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DistributeConfig {
        interval_secs: 0,
        resume: false,
        ..config_in(dir.path(), 1, Some(Goal::NPoints(6)))
    };
    config.checkpoint.naming = None;
    let executor = Arc::new(LocalExecutor::new(2));

    let err = runners_in_executor(tasks(2), executor.clone(), &config).err();
    assert!(matches!(
        err,
        Some(RunnerError::Checkpoint(CheckpointError::MissingName))
    ));
    assert_eq!(executor.evaluations(), 0);
}

#[tokio::test]
async fn test_own_names_are_used_without_a_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DistributeConfig {
        interval_secs: 0,
        ..config_in(dir.path(), 1, Some(Goal::NPoints(4)))
    };
    config.checkpoint.naming = None;
    let learners = vec![
        task(0.0).with_fname("left.ckpt"),
        task(0.5).with_fname("right.ckpt"),
    ];
    let store = Arc::new(MemoryStore::new());
    let executor: Arc<dyn Executor> = Arc::new(LocalExecutor::new(1));

    let futures =
        runners_in_executor_with_store(learners, executor, store.clone(), &config).unwrap();
    let groups = join_all(futures).await;
    assert_eq!(groups[0].as_ref().unwrap().npoints(), 4);

    let folder = config.folder_for(0);
    assert_eq!(
        store.names(),
        vec![join_name(&folder, "left.ckpt"), join_name(&folder, "right.ckpt")]
    );
}

/// Every read fails with an io error that is not absence.
struct UnreadableStore;

impl CheckpointStore for UnreadableStore {
    fn put(&self, _name: &str, _bytes: &[u8]) -> Result<(), CheckpointError> {
        Ok(())
    }

    fn get(&self, _name: &str) -> Result<Vec<u8>, CheckpointError> {
        Err(CheckpointError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )))
    }
}

#[tokio::test]
async fn test_failed_group_still_releases_engines() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 1, Some(Goal::NPoints(4)));
    let local = Arc::new(LocalExecutor::new(3));
    let executor: Arc<dyn Executor> = local.clone();

    let futures =
        runners_in_executor_with_store(tasks(2), executor, Arc::new(UnreadableStore), &config)
            .unwrap();
    let groups = join_all(futures).await;

    assert!(matches!(
        groups[0],
        Err(RunnerError::Checkpoint(CheckpointError::Io(_)))
    ));
    assert_eq!(
        local.shut_down_targets().into_iter().collect::<Vec<_>>(),
        vec![1, 2]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_then_combine() {
    let dir = tempfile::tempdir().unwrap();
    // Each group of three learners stops at 30 points in total
    let config = config_in(dir.path(), 3, Some(Goal::NPoints(30)));
    let local = Arc::new(LocalExecutor::new(7));
    let executor: Arc<dyn Executor> = local.clone();

    let futures = runners_in_executor(tasks(9), executor, &config).unwrap();
    assert_eq!(futures.len(), 3);

    let groups: Vec<_> = join_all(futures)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    for group in &groups {
        assert_eq!(group.len(), 3);
        assert_eq!(group.npoints(), 30);
    }
    // Spare engines 3..7 were handed out to the groups and released
    assert_eq!(
        local.shut_down_targets().into_iter().collect::<Vec<_>>(),
        vec![3, 4, 5, 6]
    );

    let mut fresh = tasks(9);
    let files = combine(&config.combine_pattern, &mut fresh).unwrap();
    assert_eq!(files.len(), 9);

    let finished: Vec<usize> = groups
        .iter()
        .flat_map(|g| g.learners().iter().map(Learner::npoints))
        .collect();
    let restored: Vec<usize> = fresh.iter().map(Learner::npoints).collect();
    assert_eq!(restored, finished);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_run_resumes_from_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let executor: Arc<dyn Executor> = Arc::new(LocalExecutor::new(2));

    let first = config_in(dir.path(), 1, Some(Goal::NPoints(12)));
    let futures =
        runners_in_executor_with_store(tasks(2), executor.clone(), store.clone(), &first).unwrap();
    let groups = join_all(futures).await;
    assert_eq!(groups[0].as_ref().unwrap().npoints(), 12);
    assert_eq!(store.len(), 2);

    // Already at the goal after resuming: nothing new is sampled
    let futures =
        runners_in_executor_with_store(tasks(2), executor.clone(), store.clone(), &first).unwrap();
    let groups = join_all(futures).await;
    assert_eq!(groups[0].as_ref().unwrap().npoints(), 12);

    let further = config_in(dir.path(), 1, Some(Goal::NPoints(20)));
    let futures =
        runners_in_executor_with_store(tasks(2), executor, store.clone(), &further).unwrap();
    let groups = join_all(futures).await;
    assert_eq!(groups[0].as_ref().unwrap().npoints(), 20);
}
