//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ToolbarConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and panel resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Unknown panel: {0}")]
    UnknownPanel(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ToolbarConfig, ConfigError> {
    let config: ToolbarConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ToolbarConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = parse_config("enabled = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_message_lists_fields() {
        let err = parse_config("max_request_history = 0\npath_prefix = \"x\"").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation failed: "));
        assert!(message.contains("path_prefix"));
        assert!(message.contains("max_request_history"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/debug-toolbar.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
