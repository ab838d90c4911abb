//! `BalancingLearner`: many learners sampled and checkpointed as one unit.
//!
//! Each member is stored as its own entry under a shared folder. With a
//! `NamingPattern` the entry for member `i` is always `pattern.file_name(i)`,
//! so independent processes agree on member -> file without coordination.
//! Without one, each member's own `fname` is used.

use serde_json::Value;

use super::{read_state, restore, write_state, CheckpointStore, LearnerCheckpoint};
use crate::checkpoint::store::join_name;
use crate::config::{CheckpointConfig, NamingPattern};
use crate::error::{CheckpointError, SampleError};
use crate::learner::{Learner, SampleFn};
use crate::models::{LearnerState, Point};

/// Outcome of saving every member of an aggregate.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Names written, in member order
    pub saved: Vec<String>,
    /// Members that could not be written
    pub failed: Vec<(usize, CheckpointError)>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|(index, _)| *index).collect()
    }

    /// `PartialSave` if any member failed.
    pub fn into_result(self) -> Result<Vec<String>, CheckpointError> {
        if self.failed.is_empty() {
            Ok(self.saved)
        } else {
            Err(CheckpointError::PartialSave {
                failed: self.failed_indices(),
            })
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BalancingLearner {
    learners: Vec<Learner>,
}

impl BalancingLearner {
    pub fn new(learners: Vec<Learner>) -> Self {
        BalancingLearner { learners }
    }

    pub fn learners(&self) -> &[Learner] {
        &self.learners
    }

    pub fn learners_mut(&mut self) -> &mut [Learner] {
        &mut self.learners
    }

    pub fn into_learners(self) -> Vec<Learner> {
        self.learners
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }

    /// Entry name (relative to the folder) of every member, in index order.
    ///
    /// Fails with `MissingName` before anything is written if a member has no
    /// name under the legacy scheme.
    pub fn member_names(
        &self,
        naming: Option<&NamingPattern>,
    ) -> Result<Vec<String>, CheckpointError> {
        self.learners
            .iter()
            .enumerate()
            .map(|(index, learner)| match naming {
                Some(pattern) => Ok(pattern.file_name(index)),
                None => learner.fname.clone().ok_or(CheckpointError::MissingName),
            })
            .collect()
    }

    /// Consistent copy of every member's state.
    pub fn snapshot(&self) -> Vec<(usize, LearnerState)> {
        self.learners
            .iter()
            .enumerate()
            .map(|(index, learner)| (index, learner.extract()))
            .collect()
    }

    /// Save every member under `folder`. A failing member does not stop the
    /// others; failures are listed in the report.
    pub fn save_all(
        &self,
        store: &dyn CheckpointStore,
        folder: &str,
        config: &CheckpointConfig,
    ) -> Result<SaveReport, CheckpointError> {
        let names = self.member_names(config.naming.as_ref())?;
        Ok(write_snapshot(
            store,
            folder,
            &names,
            self.snapshot(),
            config.compress,
        ))
    }

    /// Load every member from `folder`. Returns how many members found a
    /// checkpoint; absent members keep their current state.
    pub fn load_all(
        &mut self,
        store: &dyn CheckpointStore,
        folder: &str,
        config: &CheckpointConfig,
    ) -> Result<usize, CheckpointError> {
        let names = self.member_names(config.naming.as_ref())?;
        let mut restored = 0;
        for (learner, name) in self.learners.iter_mut().zip(&names) {
            if let Some(state) = read_state(store, &join_name(folder, name))? {
                restore(learner, state)?;
                restored += 1;
            }
        }
        log::info!(
            "[Checkpoint] Restored {}/{} members from {}",
            restored,
            names.len(),
            folder
        );
        Ok(restored)
    }

    /// Ask the member with the largest loss for `n` points. Ties go to the
    /// lowest index.
    pub fn ask(&mut self, n: usize) -> Vec<(usize, Point)> {
        let mut chosen: Option<(usize, f64)> = None;
        for (index, learner) in self.learners.iter().enumerate() {
            let loss = learner.loss();
            match chosen {
                Some((_, best)) if loss.total_cmp(&best).is_le() => {}
                _ => chosen = Some((index, loss)),
            }
        }

        match chosen {
            Some((index, _)) => self.learners[index]
                .ask(n)
                .into_iter()
                .map(|point| (index, point))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn tell(&mut self, (index, point): (usize, Point), outcome: &Value) -> Result<(), SampleError> {
        let len = self.learners.len();
        let learner = self
            .learners
            .get_mut(index)
            .ok_or(SampleError::NoSuchMember { index, len })?;
        learner.tell(point, outcome)
    }

    pub fn function_of(&self, index: usize) -> Option<SampleFn> {
        self.learners.get(index).map(Learner::function)
    }

    /// Largest member loss, `0.0` for an empty aggregate.
    pub fn loss(&self) -> f64 {
        self.learners
            .iter()
            .map(Learner::loss)
            .fold(0.0, f64::max)
    }

    pub fn npoints(&self) -> usize {
        self.learners.iter().map(Learner::npoints).sum()
    }
}

/// Write a snapshot taken earlier with [`BalancingLearner::snapshot`].
///
/// Split from `save_all` so the snapshot can be taken under a lock and
/// written after it is released.
pub fn write_snapshot(
    store: &dyn CheckpointStore,
    folder: &str,
    names: &[String],
    snapshot: Vec<(usize, LearnerState)>,
    compress: bool,
) -> SaveReport {
    let mut report = SaveReport::default();
    for ((index, state), name) in snapshot.into_iter().zip(names) {
        let path = join_name(folder, name);
        match write_state(store, &path, &state, compress) {
            Ok(()) => report.saved.push(path),
            Err(e) => {
                log::error!("[Checkpoint] Failed to save member {} to {}: {}", index, path, e);
                report.failed.push((index, e));
            }
        }
    }
    report
}
