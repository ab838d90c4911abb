//! Config validation.

use crate::config::{DistributeConfig, NamingPattern};
use crate::error::ConfigError;

/// Validate a folder template (exactly one `{}` placeholder).
pub fn validate_folder_template(template: &str) -> Result<(), ConfigError> {
    let placeholders = template.matches("{}").count();
    if placeholders != 1 {
        return Err(ConfigError::ValidationFailed(format!(
            "Folder template must contain exactly one '{{}}' placeholder, got {} in '{}'",
            placeholders, template
        )));
    }
    Ok(())
}

/// Validate a per-index naming pattern.
pub fn validate_naming(naming: &NamingPattern) -> Result<(), ConfigError> {
    if naming.prefix.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Naming prefix cannot be empty".to_string(),
        ));
    }

    if naming.prefix.contains(std::path::MAIN_SEPARATOR) || naming.prefix.contains('/') {
        return Err(ConfigError::ValidationFailed(format!(
            "Naming prefix must not contain path separators: {}",
            naming.prefix
        )));
    }

    if naming.extension.is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Naming extension cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validate a complete distribution config.
///
/// The goal/interval combination is checked where a run is dispatched, since
/// a config without either is still fine for recombination.
pub fn validate_config(config: &DistributeConfig) -> Result<(), ConfigError> {
    if config.n_groups == 0 {
        return Err(ConfigError::ValidationFailed(
            "n_groups must be at least 1".to_string(),
        ));
    }

    validate_folder_template(&config.folder_template)?;

    if let Some(naming) = &config.checkpoint.naming {
        validate_naming(naming)?;
    }

    if config.combine_pattern.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "combine_pattern cannot be empty".to_string(),
        ));
    }

    if let Some(naming) = &config.checkpoint.naming {
        validate_combine_pattern(&config.combine_pattern, naming)?;
    }

    Ok(())
}

/// A combine pattern must find the files a naming pattern writes.
pub fn validate_combine_pattern(pattern: &str, naming: &NamingPattern) -> Result<(), ConfigError> {
    let member_glob = naming.glob();
    if !pattern.ends_with(&member_glob) {
        return Err(ConfigError::ValidationFailed(format!(
            "combine_pattern '{}' does not match member files '{}'",
            pattern, member_glob
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&DistributeConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_groups_rejected() {
        let config = DistributeConfig {
            n_groups: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_template_placeholder_count() {
        assert!(validate_folder_template("run-{}").is_ok());
        assert!(validate_folder_template("run").is_err());
        assert!(validate_folder_template("run-{}-{}").is_err());
    }

    #[test]
    fn test_combine_pattern_must_follow_naming() {
        let naming = NamingPattern {
            prefix: "member".to_string(),
            ..Default::default()
        };
        assert!(validate_combine_pattern("tmp-*/member_*.ckpt", &naming).is_ok());
        assert!(validate_combine_pattern("tmp-*/learner_*.ckpt", &naming).is_err());

        let config = DistributeConfig {
            checkpoint: crate::config::CheckpointConfig {
                compress: true,
                naming: Some(naming),
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_naming_rejects_separator() {
        let naming = NamingPattern {
            prefix: "a/b".to_string(),
            ..Default::default()
        };
        assert!(validate_naming(&naming).is_err());
    }
}
