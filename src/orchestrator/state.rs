//! Runner status and saver phase tracking.
//!
//! **Architecture**:
//! - `RunnerStatus`: published by a driving process on a `watch` channel
//! - `SaverPhase`: lifecycle of a periodic saver, `Idle -> Running -> {Stopped, Cancelled}`

use serde::{Deserialize, Serialize};

/// Status of a driving process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Running,
    /// Goal reached
    Finished,
    /// Stopped by its owner
    Cancelled,
    /// Stopped on an error
    Failed,
}

impl RunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Running => "running",
            RunnerStatus::Finished => "finished",
            RunnerStatus::Cancelled => "cancelled",
            RunnerStatus::Failed => "failed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunnerStatus::Running)
    }
}

/// Lifecycle phase of a periodic saver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaverPhase {
    /// Created, loop not yet entered
    Idle,

    /// Waiting for the next interval or saving
    Running,

    /// The driving process stopped running
    Stopped,

    /// Cancelled by the owner
    Cancelled,
}

impl SaverPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaverPhase::Idle => "idle",
            SaverPhase::Running => "running",
            SaverPhase::Stopped => "stopped",
            SaverPhase::Cancelled => "cancelled",
        }
    }

    /// Get all valid transitions FROM this phase.
    pub fn valid_next_phases(&self) -> Vec<SaverPhase> {
        match self {
            // A process that is not running when the saver starts stops it at once
            SaverPhase::Idle => vec![SaverPhase::Running, SaverPhase::Stopped, SaverPhase::Cancelled],
            SaverPhase::Running => vec![SaverPhase::Stopped, SaverPhase::Cancelled],
            SaverPhase::Stopped => vec![],
            SaverPhase::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, next: SaverPhase) -> bool {
        self.valid_next_phases().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_next_phases().is_empty()
    }
}
