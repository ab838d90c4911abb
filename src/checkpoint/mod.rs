//! Checkpoint protocol: extract, encode and store learner state, and the
//! mirrored load path.
//!
//! # Module Structure
//!
//! - `codec`: `LearnerState` <-> bytes, optional gzip
//! - `store`: name -> bytes storage (`FileStore`, `MemoryStore`)
//! - `aggregate`: `BalancingLearner`, one checkpoint per member under a folder
//!
//! Loading is absence tolerant: a missing or unreadable entry leaves the
//! learner as it is and reports `false`. A readable entry of the wrong shape is
//! an error.

pub mod aggregate;
pub mod codec;
pub mod store;

pub use aggregate::{BalancingLearner, SaveReport};
pub use codec::{decode, encode};
pub use store::{expand_user, join_name, CheckpointStore, FileStore, MemoryStore};

use crate::error::CheckpointError;
use crate::learner::Learner;
use crate::models::LearnerState;

/// Restorable-state capability of a learner kind.
pub trait LearnerCheckpoint {
    /// Copy out the fields that make up restorable state.
    fn extract(&self) -> LearnerState;

    /// Overwrite restorable fields. A state of the wrong kind is rejected
    /// before any field changes.
    fn apply(&mut self, state: LearnerState) -> Result<(), CheckpointError>;

    /// Bring derived or pending state in line with freshly applied data.
    fn reconcile(&mut self) {}
}

/// Resolve the name to checkpoint under: the explicit name, else the
/// learner's `fname`.
pub fn resolve_name(explicit: Option<&str>, learner: &Learner) -> Result<String, CheckpointError> {
    explicit
        .map(str::to_string)
        .or_else(|| learner.fname.clone())
        .ok_or(CheckpointError::MissingName)
}

/// Encode and store one state.
pub fn write_state(
    store: &dyn CheckpointStore,
    name: &str,
    state: &LearnerState,
    compress: bool,
) -> Result<(), CheckpointError> {
    let bytes = codec::encode(state, compress)?;
    store.put(name, &bytes)
}

/// Fetch and decode one state. Absence yields `Ok(None)`.
pub fn read_state(
    store: &dyn CheckpointStore,
    name: &str,
) -> Result<Option<LearnerState>, CheckpointError> {
    let decoded = store.get(name).and_then(|bytes| codec::decode(name, &bytes));
    match decoded {
        Ok(state) => Ok(Some(state)),
        Err(CheckpointError::NotFound(_)) => {
            log::debug!("[Checkpoint] No checkpoint at {}, starting fresh", name);
            Ok(None)
        }
        Err(e) if e.is_absence() => {
            log::warn!("[Checkpoint] Ignoring unreadable checkpoint: {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Apply a decoded state and reconcile.
pub fn restore<L: LearnerCheckpoint + ?Sized>(
    learner: &mut L,
    state: LearnerState,
) -> Result<(), CheckpointError> {
    learner.apply(state)?;
    learner.reconcile();
    Ok(())
}

/// Save a learner, returning the name it was stored under.
pub fn save(
    learner: &Learner,
    store: &dyn CheckpointStore,
    fname: Option<&str>,
    compress: bool,
) -> Result<String, CheckpointError> {
    let name = resolve_name(fname, learner)?;
    write_state(store, &name, &learner.extract(), compress)?;
    Ok(name)
}

/// Load a learner in place. Returns whether a checkpoint was applied.
pub fn load(
    learner: &mut Learner,
    store: &dyn CheckpointStore,
    fname: Option<&str>,
) -> Result<bool, CheckpointError> {
    let name = resolve_name(fname, learner)?;
    match read_state(store, &name)? {
        Some(state) => {
            restore(learner, state)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
