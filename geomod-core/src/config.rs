//! Plugin manager configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PluginError;
use crate::finder::Finder;
use crate::loader::EntryPoints;
use crate::manifest::MANIFEST_EXTENSION;

/// Configuration for [`crate::PluginManager`]
///
/// Stored as TOML. Every field is optional in the file:
///
/// ```toml
/// search_dirs = ["/opt/geomod/plugins"]
/// include_default_dirs = false
/// manifest_extension = ".plugin.json"
/// enabled_file = "/etc/geomod/enabled.toml"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Extra manifest directories, scanned after the default ones
    pub search_dirs: Vec<PathBuf>,

    /// Scan `$GEOMOD_PLUGIN_PATH`, the working directory and the
    /// installation plugin directory
    pub include_default_dirs: bool,

    /// File name suffix of plugin manifests
    pub manifest_extension: String,

    /// Exported symbol run when a plugin starts
    pub startup_symbol: String,

    /// Exported symbol run when a plugin stops
    pub shutdown_symbol: String,

    /// Plugins to load during initialization; `None` enables nothing
    pub enabled_file: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let entry_points = EntryPoints::default();
        Self {
            search_dirs: Vec::new(),
            include_default_dirs: true,
            manifest_extension: MANIFEST_EXTENSION.to_string(),
            startup_symbol: entry_points.startup,
            shutdown_symbol: entry_points.shutdown,
            enabled_file: Some(geomod_paths::config_dir().join("plugins").join("enabled.toml")),
        }
    }
}

impl ManagerConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        geomod_paths::config_dir().join("plugins.toml")
    }

    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PluginError::Config(e.to_string()))
    }

    /// Save as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PluginError> {
        let content = toml::to_string_pretty(self).map_err(|e| PluginError::Config(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directories to scan, in order.
    pub fn resolved_search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = if self.include_default_dirs {
            Finder::default_search_dirs()
        } else {
            Vec::new()
        };
        dirs.extend(self.search_dirs.iter().cloned());
        dirs
    }

    pub fn entry_points(&self) -> EntryPoints {
        EntryPoints {
            startup: self.startup_symbol.clone(),
            shutdown: self.shutdown_symbol.clone(),
        }
    }

    /// Configuration scanning only `dirs`, with nothing enabled at startup.
    ///
    /// The enabled file lives inside the first directory. Without any
    /// directory there is no enabled file at all.
    pub fn isolated(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let search_dirs: Vec<PathBuf> = dirs.into_iter().collect();
        let enabled_file = search_dirs.first().map(|d| d.join("enabled.toml"));
        Self {
            search_dirs,
            include_default_dirs: false,
            enabled_file,
            ..Self::default()
        }
    }
}
