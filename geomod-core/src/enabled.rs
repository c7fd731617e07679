//! Enabled plugins - which plugins to load on startup

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::PluginError;

/// Names of plugins the user wants loaded at initialization
///
/// Stored as TOML in `~/.config/geomod/plugins/enabled.toml`:
///
/// ```toml
/// enabled = ["te.da.gdal", "te.da.ogr"]
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledPlugins {
    #[serde(default)]
    pub enabled: BTreeSet<String>,
}

impl EnabledPlugins {
    /// Load from a TOML file; a missing file means nothing is enabled.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PluginError::Config(e.to_string()))
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PluginError> {
        let content = toml::to_string_pretty(self).map_err(|e| PluginError::Config(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn enable(&mut self, name: &str) {
        self.enabled.insert(name.to_string());
    }

    pub fn disable(&mut self, name: &str) {
        self.enabled.remove(name);
    }

    /// Enabled names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for EnabledPlugins {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_enable_disable() {
        let mut enabled = EnabledPlugins::default();

        enabled.enable("te.da.gdal");
        assert!(enabled.is_enabled("te.da.gdal"));
        assert!(!enabled.is_enabled("te.da.ogr"));

        enabled.disable("te.da.gdal");
        assert!(!enabled.is_enabled("te.da.gdal"));
    }

    #[test]
    fn test_load_missing_file() {
        let enabled = EnabledPlugins::load(Path::new("/nonexistent/path/enabled.toml")).unwrap();
        assert!(enabled.enabled.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/plugins/enabled.toml");

        let enabled: EnabledPlugins = ["te.da.ogr", "te.da.gdal"].into_iter().collect();
        enabled.save(&path).unwrap();

        let loaded = EnabledPlugins::load(&path).unwrap();
        assert_eq!(loaded, enabled);
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["te.da.gdal", "te.da.ogr"]);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enabled.toml");
        std::fs::write(&path, "enabled = 42").unwrap();

        assert!(matches!(
            EnabledPlugins::load(&path),
            Err(PluginError::Config(_))
        ));
    }

    #[test]
    fn test_toml_format() {
        let mut enabled = EnabledPlugins::default();
        enabled.enable("hello");

        let toml_str = toml::to_string_pretty(&enabled).unwrap();
        assert!(toml_str.contains("enabled"));
        assert!(toml_str.contains("hello"));
    }
}
