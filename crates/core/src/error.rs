use std::io;
use std::path::PathBuf;

use crate::validator::ValidationFailure;

/// Errors that can occur during launcher operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    #[error("Validation failed for {}: {failure}", dir.display())]
    ValidationError {
        dir: PathBuf,
        failure: ValidationFailure,
    },

    #[error("Build failed for module '{module}' (exit code {code:?})")]
    BuildError { module: String, code: Option<i32> },

    #[error("Library error: {0}")]
    LibraryError(String),

    #[error("Plugin error: {0}")]
    PluginError(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Module '{0}' timed out")]
    Timeout(String),

    #[error("Module '{0}' not found")]
    ModuleNotFound(String),

    #[error("No game is running")]
    NoActiveGame,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for launcher operations
pub type Result<T> = std::result::Result<T, Error>;
