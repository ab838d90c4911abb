//! adaptive_tools
//!
//! Checkpointing, periodic saving and work splitting for long-running
//! adaptive learners.
//!
//! The crate is organized into functional modules:
//! - **error**: Unified error type hierarchy
//! - **models**: Learner state, sample points and goals
//! - **learner**: The learner kinds and the `Learner` task type
//! - **checkpoint**: State codec, stores, per-learner and aggregate checkpoints
//! - **splitter**: Splitting tasks into groups and recombining saved groups
//! - **orchestrator**: Runners, the periodic saver and execution backends
//! - **config**: Configuration structs, loading and validation
//! - **logging**: Stderr logger for the `log` facade

// Core foundational modules
pub mod error;
pub mod models;

pub mod learner;

pub mod checkpoint;

pub mod splitter;

// Runners, periodic saving and distribution
pub mod orchestrator;

pub mod config;

pub mod logging;

// Re-export the log crate for macro usage
pub use log;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{CheckpointError, ConfigError, Result, RunnerError, SampleError, SplitError};

pub use models::{Coord, Goal, GridPoint, LearnerState, Point};

pub use learner::{
    AugmentedLearner, AverageLearner, GridLearner, Learner, LearnerKind, PointLearner, SampleFn,
};

pub use checkpoint::{
    BalancingLearner, CheckpointStore, FileStore, LearnerCheckpoint, MemoryStore, SaveReport,
};

pub use splitter::{combine, natural_key, natural_sort, split};

pub use orchestrator::{
    runners_in_executor, runners_in_executor_with_store, start_periodic_saver, Executor,
    LocalExecutor, PeriodicSaveHandle, Runner, RunnerStatus, SaverPhase,
};

pub use config::{CheckpointConfig, DistributeConfig, NamingPattern};

pub use logging::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.2.1");
    }

    #[test]
    fn test_error_reexport() {
        let _: Result<i32> = Ok(42);
        let _ = CheckpointError::MissingName;
    }

    #[test]
    fn test_models_reexport() {
        assert_eq!(Point::Seed(1), Point::Seed(1));
        assert_eq!(RunnerStatus::Running.as_str(), "running");
    }
}
