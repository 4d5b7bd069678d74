//! Loading [`EngineConfig`] from YAML.

use sim_core::{validate_config, EngineConfig, ValidationError};
use std::path::Path;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to parse config YAML: {source}")]
    Yaml { source: serde_yaml::Error },
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Parse and validate a YAML document. Missing fields take their defaults.
pub fn parse_config(yaml: &str) -> Result<EngineConfig, ConfigError> {
    let cfg: EngineConfig = if yaml.trim().is_empty() {
        EngineConfig::default()
    } else {
        serde_yaml::from_str(yaml)?
    };
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg = parse_config(
            "max_ticks_per_request: 50\nworkforce:\n  min_multiplier: 0.5\n",
        )
        .unwrap();
        assert_eq!(cfg.max_ticks_per_request, 50);
        assert_eq!(cfg.workforce.min_multiplier, Decimal::new(5, 1));
        assert_eq!(cfg.workforce.baseline_pct, 25);
        assert_eq!(cfg.logistics, EngineConfig::default().logistics);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(parse_config("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse_config("max_ticks_per_request: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("max_ticks_per_request: [1]\n"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/definitely/not/here.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
