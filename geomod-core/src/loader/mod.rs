//! Library loading - where native code enters the process
//!
//! A [`LibraryLoader`] opens a shared object and returns a [`NativeLibrary`].
//! The library turns its two exported hook symbols into a typed
//! [`ModuleHooks`] capability, so nothing outside the loader implementation
//! ever handles raw function pointers.
//!
//! - [`DylibLoader`]: real shared objects through `libloading`
//! - [`mock::MockLoader`]: in-memory modules for tests and embedding

mod dylib;
pub mod mock;

pub use dylib::DylibLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by a library loader
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// No file at the given path
    #[error("Library not found: {path}")]
    NotFound { path: PathBuf },

    /// The OS loader refused the file
    #[error("Failed to open library {path}: {cause}")]
    LoadFailed { path: PathBuf, cause: String },

    /// A required symbol is not exported
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    /// The OS loader failed to unmap the library
    #[error("Failed to close library {path}: {cause}")]
    CloseFailed { path: PathBuf, cause: String },
}

/// Names of the two hook symbols a module must export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoints {
    pub startup: String,
    pub shutdown: String,
}

impl Default for EntryPoints {
    fn default() -> Self {
        Self {
            startup: geomod_module_api::STARTUP_SYMBOL.to_string(),
            shutdown: geomod_module_api::SHUTDOWN_SYMBOL.to_string(),
        }
    }
}

/// Startup/shutdown capability resolved from a loaded library.
///
/// Must not outlive the [`NativeLibrary`] it came from.
pub trait ModuleHooks: Send + Sync {
    /// Run the startup hook; `Err` carries the module's failure message.
    fn start(&mut self) -> Result<(), String>;

    /// Run the shutdown hook; `Err` carries the module's failure message.
    fn stop(&mut self) -> Result<(), String>;
}

/// A library mapped into the process.
///
/// Closing consumes the value, so a library cannot be closed twice.
pub trait NativeLibrary: Send + Sync {
    fn path(&self) -> &Path;

    /// ABI version reported by the module, `None` if it exports none.
    fn api_version(&self) -> Option<u32>;

    /// Resolve the startup and shutdown hooks.
    fn hooks(&self, entry_points: &EntryPoints) -> Result<Box<dyn ModuleHooks>, LoaderError>;

    /// Unmap the library.
    fn close(self: Box<Self>) -> Result<(), LoaderError>;
}

/// Opens native libraries
pub trait LibraryLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LoaderError>;
}
