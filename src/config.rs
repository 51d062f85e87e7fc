//! Engine configuration.
//!
//! Defaults cover every field, so a YAML file only needs the values it
//! changes. `DOCSTAMP_*` environment variables override whatever the file says.
//!
//! ```yaml
//! concurrency: 8
//! fetch:
//!   max_attempts: 5
//!   base_delay_ms: 250
//! validator:
//!   min_spreadsheet_size: 2048
//! template:
//!   missing: error
//! ```

use crate::fetch::FetchConfig;
use crate::ooxml::TemplateOptions;
use crate::ooxml::docx::MissingValuePolicy;
use crate::validate::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(String),

    #[error("Invalid value {value:?} for {name}")]
    InvalidVar { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fetch: FetchConfig,
    pub validator: ValidatorConfig,
    pub template: TemplateOptions,
    /// Batch items processed at once
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            validator: ValidatorConfig::default(),
            template: TemplateOptions::default(),
            concurrency: 4,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Defaults with `DOCSTAMP_*` overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        override_with(&lookup, "DOCSTAMP_CONCURRENCY", &mut self.concurrency)?;
        override_with(&lookup, "DOCSTAMP_FETCH_MAX_ATTEMPTS", &mut self.fetch.max_attempts)?;
        override_with(&lookup, "DOCSTAMP_FETCH_BASE_DELAY_MS", &mut self.fetch.base_delay_ms)?;
        override_with(&lookup, "DOCSTAMP_FETCH_TIMEOUT_MS", &mut self.fetch.attempt_timeout_ms)?;
        override_with(
            &lookup,
            "DOCSTAMP_MIN_DOCX_SIZE",
            &mut self.validator.min_word_processing_size,
        )?;
        override_with(&lookup, "DOCSTAMP_MIN_XLSX_SIZE", &mut self.validator.min_spreadsheet_size)?;
        override_with(&lookup, "DOCSTAMP_START_DELIMITER", &mut self.template.start_delimiter)?;
        override_with(&lookup, "DOCSTAMP_END_DELIMITER", &mut self.template.end_delimiter)?;

        if let Some(value) = lookup("DOCSTAMP_MISSING_VALUES") {
            self.template.missing = match value.trim().to_ascii_lowercase().as_str() {
                "blank" => MissingValuePolicy::Blank,
                "error" => MissingValuePolicy::Error,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "DOCSTAMP_MISSING_VALUES".to_string(),
                        value,
                    });
                },
            };
        }
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        Ok(())
    }
}

fn override_with<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(name) {
        *target = value.trim().parse().map_err(|_| ConfigError::InvalidVar {
            name: name.to_string(),
            value,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.base_delay_ms, 500);
        assert_eq!(config.validator.min_word_processing_size, 1024);
        assert_eq!(config.template.start_delimiter, '{');
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), config);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "concurrency: 8\nfetch:\n  max_attempts: 5\ntemplate:\n  missing: error\n  start_delimiter: '['\n";
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.fetch.base_delay_ms, 500);
        assert_eq!(config.template.missing, MissingValuePolicy::Error);
        assert_eq!(config.template.start_delimiter, '[');
        assert_eq!(config.template.end_delimiter, '}');
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            EngineConfig::from_yaml_str("concurrency: [1, 2"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOCSTAMP_CONCURRENCY", "2"),
            ("DOCSTAMP_FETCH_TIMEOUT_MS", "1500"),
            ("DOCSTAMP_MISSING_VALUES", "Error"),
            ("DOCSTAMP_MIN_XLSX_SIZE", "4096"),
        ]
        .into_iter()
        .collect();
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.fetch.attempt_timeout_ms, 1500);
        assert_eq!(config.template.missing, MissingValuePolicy::Error);
        assert_eq!(config.validator.min_spreadsheet_size, 4096);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|name| (name == "DOCSTAMP_CONCURRENCY").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { ref name, .. } if name == "DOCSTAMP_CONCURRENCY"));
    }
}
