//! Plugin runtime error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering, ordering, loading or unloading plugins
#[derive(Error, Debug)]
pub enum PluginError {
    /// A plugin with this name is already in the catalog
    #[error("Plugin '{name}' is already registered")]
    DuplicateName { name: String },

    /// Plugin not found in the catalog
    #[error("Plugin '{name}' not found")]
    NotFound { name: String },

    /// Dependency graph contains a cycle; `names` is the cycle path
    #[error("Cyclic dependency: {}", .names.join(" -> "))]
    CyclicDependency { names: Vec<String> },

    /// A declared dependency is not in the catalog
    #[error("Plugin '{dependent}' depends on '{missing}', which is not registered")]
    MissingDependency { dependent: String, missing: String },

    /// The native library could not be opened
    #[error("Failed to load plugin library {path}: {cause}")]
    LoadFailed { path: PathBuf, cause: String },

    /// The native library does not export a required hook
    #[error("Plugin '{name}' does not export entry point '{hook}'")]
    EntryPointMissing { name: String, hook: String },

    /// The module was built against a different module ABI
    #[error("Plugin '{name}' API version mismatch: expected {expected}, found {found}")]
    ApiVersionMismatch {
        name: String,
        expected: u32,
        found: u32,
    },

    /// The startup hook reported a failure
    #[error("Plugin '{name}' failed to start: {cause}")]
    StartupFailed { name: String, cause: String },

    /// The shutdown hook reported a failure
    #[error("Plugin '{name}' failed to shut down: {cause}")]
    ShutdownFailed { name: String, cause: String },

    /// Other loaded plugins still depend on this one
    #[error("Plugin '{name}' is required by loaded plugins: {}", .dependents.join(", "))]
    HasDependents {
        name: String,
        dependents: Vec<String>,
    },

    /// Plugin must be unloaded before it can be removed
    #[error("Plugin '{name}' is still loaded")]
    StillLoaded { name: String },

    /// A manifest file could not be read or parsed
    #[error("Invalid plugin manifest {path}: {cause}")]
    ParseError { path: PathBuf, cause: String },

    /// Descriptor violates a structural rule (empty name, no library...)
    #[error("Invalid plugin descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    /// A module handle was driven through an illegal transition
    #[error("Plugin '{name}' cannot {operation} while {state}")]
    InvalidState {
        name: String,
        operation: &'static str,
        state: String,
    },

    /// `initialize` called on an initialized manager
    #[error("Plugin manager is already initialized")]
    AlreadyInitialized,

    /// Configuration error (parsing, saving, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub(crate) fn not_found(name: &str) -> Self {
        Self::NotFound {
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_dependency_display() {
        let err = PluginError::CyclicDependency {
            names: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency: A -> B -> A");
    }

    #[test]
    fn test_missing_dependency_display() {
        let err = PluginError::MissingDependency {
            dependent: "A".to_string(),
            missing: "Z".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'A'"));
        assert!(msg.contains("'Z'"));
    }

    #[test]
    fn test_has_dependents_display() {
        let err = PluginError::HasDependents {
            name: "GDAL".to_string(),
            dependents: vec!["PGIS".to_string(), "WCS".to_string()],
        };
        assert!(err.to_string().ends_with("PGIS, WCS"));
    }

    #[test]
    fn test_api_version_mismatch_display() {
        let err = PluginError::ApiVersionMismatch {
            name: "ogr".to_string(),
            expected: 1,
            found: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 1"));
        assert!(msg.contains("found 2"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = PluginError::InvalidState {
            name: "ogr".to_string(),
            operation: "unload",
            state: "started".to_string(),
        };
        assert_eq!(err.to_string(), "Plugin 'ogr' cannot unload while started");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PluginError = io_err.into();
        assert!(matches!(err, PluginError::Io(_)));
    }
}
