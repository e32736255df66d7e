//! Error types for rune-compose

use std::path::PathBuf;
use thiserror::Error;

/// Result type for compose resolution
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Compose resolution error types
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("No compose file found in {} (tried: {tried})", .dir.display())]
    NotFound { dir: PathBuf, tried: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Service '{service}': unsupported value for '{field}': {message}")]
    FieldType {
        service: String,
        field: String,
        message: String,
    },

    #[error("Invalid {kind} '{name}': {message}")]
    InvalidDefinition {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("Service '{service}' depends on undefined service '{dependency}'")]
    UndefinedDependency { service: String, dependency: String },

    #[error("Dependency cycle detected among services: {}", .services.join(", "))]
    Cycle { services: Vec<String> },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ComposeError {
    pub(crate) fn field(service: &str, field: &str, message: impl ToString) -> Self {
        ComposeError::FieldType {
            service: service.to_string(),
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}
