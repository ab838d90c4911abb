//! Unified error type hierarchy for adaptive_tools
//!
//! Provides structured error handling with CheckpointError, SampleError,
//! SplitError, RunnerError and ConfigError.

use std::io;
use thiserror::Error;

/// Checkpoint persistence and restore errors.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No entry is stored under the requested name.
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    /// An entry exists but cannot be decoded (empty, truncated or garbled).
    #[error("Corrupt checkpoint {name}: {reason}")]
    CorruptCheckpoint { name: String, reason: String },

    /// The decoded state does not fit the target learner kind.
    #[error("Checkpoint schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// Neither an explicit name nor a learner `fname` was available.
    #[error("No checkpoint name supplied and the learner has no `fname`")]
    MissingName,

    /// Some members of an aggregate could not be written; others were saved.
    #[error("Failed to save aggregate members {failed:?}")]
    PartialSave { failed: Vec<usize> },

    #[error("IO error during checkpoint operations: {0}")]
    Io(#[from] io::Error),
}

impl CheckpointError {
    /// Whether this error means "nothing usable to restore".
    ///
    /// Absence is swallowed at the load boundary of a single learner, every
    /// other error propagates.
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            CheckpointError::NotFound(_) | CheckpointError::CorruptCheckpoint { .. }
        )
    }
}

/// Errors raised by the learner collaborators while absorbing samples.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("Sample value for {point} is not numeric: {value}")]
    NonNumeric { point: String, value: String },

    #[error("Point {point} does not belong to a {kind} learner")]
    WrongPoint { point: String, kind: String },

    #[error("Member index {index} out of range for aggregate of {len}")]
    NoSuchMember { index: usize, len: usize },
}

/// Work splitting and recombination errors.
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Cannot split an empty task collection")]
    EmptyTasks,

    #[error("Invalid group count: {0}")]
    InvalidGroupCount(usize),

    #[error("Found {found} checkpoint files but expected {expected}")]
    CountMismatch { expected: usize, found: usize },

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Checkpoint error during recombination: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Driving-process and distribution errors.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// A distributed run with no goal and no periodic saving could neither
    /// terminate nor be resumed.
    #[error("No goal configured: turn on periodic saving if there is no goal")]
    NoGoalConfigured,

    #[error("Sampling failed: {0}")]
    Sample(#[from] SampleError),

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Split failed: {0}")]
    Split(#[from] SplitError),

    #[error("Runner cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Join(String),
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid TOML in config: {0}")]
    InvalidToml(#[from] toml::de::Error),

    #[error("Could not serialize config as TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Top-level result type for the binary entry point.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
