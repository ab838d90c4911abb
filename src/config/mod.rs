//! Configuration consumed by the checkpoint, saving and splitting layers.
//!
//! All defaults live here as documented `Default` impls; nothing is read from
//! process-wide mutable state. Entry points take the config they need by
//! reference.
//!
//! # Module Structure
//!
//! - `loader`: reads and writes a `DistributeConfig` as JSON or TOML
//! - `validator`: rejects configurations that cannot produce a usable run

pub mod loader;
pub mod validator;

use crate::models::Goal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-index file naming: `<prefix>_<zero-padded index>.<extension>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingPattern {
    pub prefix: String,
    /// Minimum number of digits in the index
    pub width: usize,
    pub extension: String,
}

impl Default for NamingPattern {
    fn default() -> Self {
        NamingPattern {
            prefix: "learner".to_string(),
            width: 5,
            extension: "ckpt".to_string(),
        }
    }
}

impl NamingPattern {
    /// File name for the member at `index`.
    pub fn file_name(&self, index: usize) -> String {
        format!(
            "{}_{:0width$}.{}",
            self.prefix,
            index,
            self.extension,
            width = self.width
        )
    }

    /// Glob matching every file this pattern can produce.
    pub fn glob(&self) -> String {
        format!("{}_*.{}", self.prefix, self.extension)
    }
}

/// How learner state is written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Gzip the encoded state
    pub compress: bool,

    /// Per-index naming for aggregate members. `None` falls back to each
    /// member's own `fname`.
    pub naming: Option<NamingPattern>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            compress: true,
            naming: Some(NamingPattern::default()),
        }
    }
}

/// Settings for splitting learners over workers and running them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributeConfig {
    /// Number of worker groups (driving processes)
    pub n_groups: usize,

    /// Completion goal; `None` runs until cancelled
    pub goal: Option<Goal>,

    /// Seconds between periodic checkpoints, `0` disables periodic saving
    pub interval_secs: u64,

    /// Folder per group; `{}` is replaced with the group index
    pub folder_template: String,

    /// Glob locating every saved member file at recombination time. With a
    /// naming pattern it must end in that pattern's glob.
    pub combine_pattern: String,

    /// Restore each group from its folder before running
    pub resume: bool,

    /// Log level for the binary (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,

    pub checkpoint: CheckpointConfig,
}

impl Default for DistributeConfig {
    fn default() -> Self {
        DistributeConfig {
            n_groups: num_cpus::get(),
            goal: None,
            interval_secs: 3600,
            folder_template: "tmp-{}".to_string(),
            combine_pattern: format!("tmp-*/{}", NamingPattern::default().glob()),
            resume: true,
            log_level: "info".to_string(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

impl DistributeConfig {
    /// Interval between periodic checkpoints.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Checkpoint folder for the group at `index`.
    pub fn folder_for(&self, index: usize) -> String {
        self.folder_template.replacen("{}", &index.to_string(), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_pattern_zero_pads() {
        let naming = NamingPattern::default();
        assert_eq!(naming.file_name(7), "learner_00007.ckpt");
        assert_eq!(naming.file_name(123456), "learner_123456.ckpt");
        assert_eq!(naming.glob(), "learner_*.ckpt");
    }

    #[test]
    fn test_folder_template() {
        let config = DistributeConfig::default();
        assert_eq!(config.folder_for(3), "tmp-3");
    }

    #[test]
    fn test_defaults() {
        let config = DistributeConfig::default();
        assert!(config.n_groups >= 1);
        assert_eq!(config.interval(), Duration::from_secs(3600));
        assert!(config.goal.is_none());
        assert!(config.checkpoint.compress);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DistributeConfig =
            serde_json::from_str(r#"{"n_groups": 2, "goal": {"n_points": 50}}"#).unwrap();
        assert_eq!(config.n_groups, 2);
        assert_eq!(config.goal, Some(Goal::NPoints(50)));
        assert_eq!(config.folder_template, "tmp-{}");
    }

    #[test]
    fn test_default_combine_pattern_follows_naming() {
        let config = DistributeConfig::default();
        assert_eq!(config.combine_pattern, "tmp-*/learner_*.ckpt");
    }
}
