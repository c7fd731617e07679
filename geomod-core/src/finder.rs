//! Finder - discovers plugin manifests on disk
//!
//! The finder never loads anything. It lists the search directories, parses
//! every manifest it meets and hands the descriptors back in
//! directory-then-file order. A broken manifest costs only itself.

use std::io;
use std::path::{Path, PathBuf};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::manifest::{self, MANIFEST_EXTENSION};

/// Environment variable holding extra manifest directories (`PATH` syntax).
pub const PLUGIN_PATH_ENV: &str = "GEOMOD_PLUGIN_PATH";

/// Filesystem operations the finder relies on
pub trait FileSystem: Send + Sync {
    fn is_directory(&self, path: &Path) -> bool;

    /// Entries of a directory, as full paths.
    fn list_directory(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn is_regular_file(&self, path: &Path) -> bool;
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_directory(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Result of a discovery pass
#[derive(Debug, Default)]
pub struct Discovery {
    /// Parsed descriptors, in encounter order
    pub found: Vec<PluginDescriptor>,
    /// One entry per manifest or directory that could not be used
    pub errors: Vec<PluginError>,
}

/// Scans directories for plugin manifests
pub struct Finder {
    fs: Box<dyn FileSystem>,
    extension: String,
}

impl Default for Finder {
    fn default() -> Self {
        Self::new()
    }
}

impl Finder {
    /// Finder over the local filesystem using the default manifest extension.
    pub fn new() -> Self {
        Self {
            fs: Box::new(LocalFileSystem),
            extension: MANIFEST_EXTENSION.to_string(),
        }
    }

    pub fn with_filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Default lookup list: `$GEOMOD_PLUGIN_PATH` entries, the current
    /// working directory, then the installation plugin directory.
    pub fn default_search_dirs() -> Vec<PathBuf> {
        let mut dirs = Vec::new();

        if let Some(paths) = std::env::var_os(PLUGIN_PATH_ENV) {
            dirs.extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }

        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }

        if let Some(installed) = geomod_paths::plugins_dir() {
            dirs.push(installed);
        }

        dirs
    }

    /// Discover manifests in `search_dirs`, in order.
    ///
    /// Missing or non-directory entries are skipped, as are repeats of a
    /// directory already scanned. Files within one directory are visited
    /// sorted by name so results do not depend on `read_dir` order.
    pub fn discover(&self, search_dirs: &[PathBuf]) -> Discovery {
        let mut discovery = Discovery::default();
        let mut scanned: Vec<&Path> = Vec::new();

        for dir in search_dirs {
            if scanned.contains(&dir.as_path()) {
                continue;
            }
            scanned.push(dir);

            if !self.fs.is_directory(dir) {
                tracing::debug!(dir = %dir.display(), "Plugin directory does not exist");
                continue;
            }

            let mut entries = match self.fs.list_directory(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Cannot list plugin directory");
                    discovery.errors.push(PluginError::Io(e));
                    continue;
                }
            };
            entries.sort();

            for path in entries {
                if !manifest::is_manifest(&path, &self.extension) || !self.fs.is_regular_file(&path)
                {
                    continue;
                }

                match manifest::read(&path) {
                    Ok(mut descriptor) => {
                        descriptor.resolve_library(path.parent().unwrap_or(dir));
                        tracing::debug!(
                            plugin = %descriptor.name,
                            manifest = %path.display(),
                            "Discovered plugin"
                        );
                        discovery.found.push(descriptor);
                    }
                    Err(e) => {
                        tracing::warn!(manifest = %path.display(), error = %e, "Skipping invalid manifest");
                        discovery.errors.push(e);
                    }
                }
            }
        }

        discovery
    }
}
