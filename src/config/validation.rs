//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (history capacities > 0)
//! - Check host entries parse as addresses or CIDR networks
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ToolbarConfig → Result<(), Vec<ValidationError>>
//! - Panel names are resolved later against the registry, not here

use std::fmt;

use crate::config::schema::ToolbarConfig;
use crate::http::access::HostNet;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &ToolbarConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.path_prefix.starts_with('/') {
        errors.push(ValidationError {
            field: "path_prefix",
            message: format!("must start with '/', got {:?}", config.path_prefix),
        });
    }
    if config.root_path() == "/" {
        errors.push(ValidationError {
            field: "path_prefix",
            message: "must not be the site root".to_string(),
        });
    }

    for (field, value) in [
        ("max_request_history", config.max_request_history),
        ("max_exception_history", config.max_exception_history),
    ] {
        if value == 0 {
            errors.push(ValidationError {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
    }

    for host in &config.hosts {
        if let Err(message) = host.parse::<HostNet>() {
            errors.push(ValidationError {
                field: "hosts",
                message,
            });
        }
    }

    if config.exclude_prefixes.iter().any(|p| p.is_empty()) {
        errors.push(ValidationError {
            field: "exclude_prefixes",
            message: "empty prefix would exclude every request".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ToolbarConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let config = ToolbarConfig {
            path_prefix: "debug".to_string(),
            max_request_history: 0,
            max_exception_history: 0,
            hosts: vec!["not-an-ip".to_string(), "10.0.0.0/99".to_string()],
            exclude_prefixes: vec![String::new()],
            ..Default::default()
        };

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "path_prefix",
                "max_request_history",
                "max_exception_history",
                "hosts",
                "hosts",
                "exclude_prefixes",
            ]
        );
    }
}
