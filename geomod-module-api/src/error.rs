//! Error types for module authors

use thiserror::Error;

/// Errors a module can return from its lifecycle hooks
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A resource the module needs is unavailable
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl ModuleError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
