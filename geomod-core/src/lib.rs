//! geomod-core: runtime for native plugin modules
//!
//! This crate discovers plugin manifests, orders plugins by their
//! dependencies and drives their shared libraries through load, startup,
//! shutdown and unload:
//!
//! - **Descriptors** - [`PluginDescriptor`], read from and written to JSON
//!   manifests by the [`manifest`] codec
//! - **Discovery** - [`Finder`] scans directories for manifests
//! - **Ordering** - [`resolver::resolve`] computes a dependency-first load order
//! - **Loading** - [`LibraryLoader`] opens shared objects; [`ModuleHandle`]
//!   tracks one of them through its lifecycle
//! - **Management** - [`PluginManager`] owns the catalog and the loaded set
//!
//! # Quick Start
//!
//! ```no_run
//! use geomod_core::{ManagerConfig, PluginManager, DylibLoader};
//!
//! fn example() -> Result<(), geomod_core::PluginError> {
//!     let config = ManagerConfig::load(&ManagerConfig::default_path())?;
//!     let manager = PluginManager::new(config, DylibLoader);
//!
//!     let report = manager.initialize()?;
//!     println!("{} plugins discovered", report.discovered);
//!
//!     manager.load("te.da.pgis")?;
//!     println!("loaded: {:?}", manager.loaded());
//!
//!     manager.finalize();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  PluginManager                   │
//! │  ┌──────────┐  ┌──────────┐  ┌────────────────┐  │
//! │  │  Finder  │  │ Catalog  │  │  loaded set    │  │
//! │  │(manifest)│─▶│(by name) │─▶│ ModuleHandle.. │  │
//! │  └──────────┘  └──────────┘  └───────┬────────┘  │
//! │                     resolver         │           │
//! └──────────────────────────────────────┼───────────┘
//!                                        ▼
//!                                  LibraryLoader
//! ```

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod enabled;
pub mod error;
pub mod events;
pub mod finder;
pub mod handle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod resolver;

// Re-export key types for convenience
pub use catalog::Catalog;
pub use config::ManagerConfig;
pub use descriptor::{PluginDescriptor, Provider};
pub use enabled::EnabledPlugins;
pub use error::PluginError;
pub use events::{Observer, ObserverId, PluginEvent};
pub use finder::{Discovery, FileSystem, Finder, LocalFileSystem, PLUGIN_PATH_ENV};
pub use handle::{ModuleHandle, ModuleState};
pub use loader::{DylibLoader, EntryPoints, LibraryLoader, LoaderError, ModuleHooks, NativeLibrary};
pub use manager::{InitReport, ManagerState, PluginManager};
