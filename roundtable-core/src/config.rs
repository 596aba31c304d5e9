//! Configuration loading and validation

use crate::error::{ErrorContext, RoundtableError, RoundtableResult};
use crate::logging::LoggingConfig;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Interview loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Maximum expert turns per interview before the branch wraps up
    pub max_turns: usize,
    /// Result-count hint passed along to search providers
    pub max_search_results: usize,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            max_turns: 2,
            max_search_results: 3,
        }
    }
}

/// Checkpoint persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the file-backed checkpoint store
    pub checkpoint_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: ".roundtable/checkpoints".to_string(),
        }
    }
}

/// Top-level configuration for the report engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundtableConfig {
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RoundtableConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> RoundtableResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RoundtableError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: RoundtableConfig =
            toml::from_str(&content).map_err(|e| RoundtableError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> RoundtableResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| RoundtableError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| RoundtableError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> RoundtableResult<()> {
        if self.interview.max_turns == 0 {
            return Err(RoundtableError::Config {
                message: "interview.max_turns must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set interview.max_turns to a positive value"),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(RoundtableError::Config {
                message: "retry.max_attempts must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set retry.max_attempts to a positive value"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtable.toml");

        let mut config = RoundtableConfig::default();
        config.interview.max_turns = 5;
        config.save_to_file(&path).unwrap();

        let loaded = RoundtableConfig::from_file(&path).unwrap();
        assert_eq!(loaded.interview.max_turns, 5);
        assert_eq!(loaded.retry.max_attempts, config.retry.max_attempts);
    }

    #[test]
    fn zero_max_turns_is_rejected() {
        let mut config = RoundtableConfig::default();
        config.interview.max_turns = 0;
        assert!(config.validate().is_err());
    }
}
