//! Plugin descriptor - what a plugin is, independent of whether it is loaded

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PluginError;

/// Declarative record describing one plugin.
///
/// Identity is the `name`. Dependencies are plain names resolved against the
/// catalog at load time, never pointers to other descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginDescriptor {
    /// Unique plugin name (catalog key)
    pub name: String,
    /// Human-readable title
    #[serde(default)]
    pub title: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Plugin version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Category tag (e.g. "Data Access")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Names of plugins that must be loaded first, in declared order
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Resource directories the plugin needs
    #[serde(default)]
    pub resources: Vec<PathBuf>,
    /// Path to the native library file
    pub library: PathBuf,
    /// Who ships the plugin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

/// Plugin provider contact information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Provider {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PluginDescriptor {
    /// Create a descriptor with the two required fields set.
    pub fn new(name: impl Into<String>, library: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: String::new(),
            version: None,
            category: None,
            dependencies: Vec::new(),
            resources: Vec::new(),
            library: library.into(),
            provider: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Append one dependency name.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Append one resource path.
    pub fn with_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources.push(path.into());
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Whether this plugin declares `name` as a direct dependency.
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    /// Check the structural rules every catalog entry must satisfy.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.trim().is_empty() {
            return Err(invalid("plugin name is empty"));
        }
        if self.library.as_os_str().is_empty() {
            return Err(invalid(format!("plugin '{}' has no library path", self.name)));
        }
        if let Some(dep) = self.dependencies.iter().find(|d| d.trim().is_empty()) {
            return Err(invalid(format!(
                "plugin '{}' declares an empty dependency name {dep:?}",
                self.name
            )));
        }
        Ok(())
    }

    /// Resolve a relative `library` path against `base`.
    ///
    /// Manifests usually name the library relative to their own directory.
    pub(crate) fn resolve_library(&mut self, base: &Path) {
        if self.library.is_relative() {
            self.library = base.join(&self.library);
        }
    }
}

fn invalid(reason: impl Into<String>) -> PluginError {
    PluginError::InvalidDescriptor {
        reason: reason.into(),
    }
}
