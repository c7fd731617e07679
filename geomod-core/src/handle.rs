//! ModuleHandle - one loaded plugin library and its lifecycle state

use std::fmt;
use std::path::Path;

use geomod_module_api::API_VERSION;

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::loader::{EntryPoints, LibraryLoader, LoaderError, ModuleHooks, NativeLibrary};

/// Lifecycle state of a module handle
///
/// `Unloaded -> Loaded -> Started -> Loaded -> Unloaded`. `Unloaded` is
/// terminal once reached from `Loaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Library closed; the handle is spent
    Unloaded,
    /// Library open, hooks resolved, startup not run (or already shut down)
    Loaded,
    /// Startup hook completed successfully
    Started,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Started => "started",
        })
    }
}

/// Exclusive owner of a loaded plugin library.
///
/// The startup hook runs at most once per start/stop cycle, whatever the
/// module itself does to guard re-entry. Dropping a handle whose library is
/// still open stops and closes it.
pub struct ModuleHandle {
    name: String,
    state: ModuleState,
    // Declared before `library`: hooks must never outlive the library.
    hooks: Option<Box<dyn ModuleHooks>>,
    library: Option<Box<dyn NativeLibrary>>,
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("library", &self.library_path())
            .finish()
    }
}

impl ModuleHandle {
    /// Open the descriptor's library and resolve its hooks.
    ///
    /// On any failure the library is closed again before returning; no
    /// partially loaded handle exists.
    pub fn load(
        descriptor: &PluginDescriptor,
        loader: &dyn LibraryLoader,
        entry_points: &EntryPoints,
    ) -> Result<Self, PluginError> {
        let name = descriptor.name.as_str();

        let library = loader
            .open(&descriptor.library)
            .map_err(|e| PluginError::LoadFailed {
                path: descriptor.library.clone(),
                cause: e.to_string(),
            })?;

        if let Some(found) = library.api_version()
            && found != API_VERSION
        {
            close_library(name, library);
            return Err(PluginError::ApiVersionMismatch {
                name: name.to_string(),
                expected: API_VERSION,
                found,
            });
        }

        let hooks = match library.hooks(entry_points) {
            Ok(hooks) => hooks,
            Err(e) => {
                close_library(name, library);
                return Err(match e {
                    LoaderError::SymbolNotFound { symbol } => PluginError::EntryPointMissing {
                        name: name.to_string(),
                        hook: symbol,
                    },
                    other => PluginError::LoadFailed {
                        path: descriptor.library.clone(),
                        cause: other.to_string(),
                    },
                });
            }
        };

        tracing::debug!(
            plugin = %name,
            library = %descriptor.library.display(),
            "Plugin library opened"
        );

        Ok(Self {
            name: name.to_string(),
            state: ModuleState::Loaded,
            hooks: Some(hooks),
            library: Some(library),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Path of the open library, `None` once unloaded.
    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_ref().map(|l| l.path())
    }

    /// Run the startup hook. No-op when already started.
    pub fn start(&mut self) -> Result<(), PluginError> {
        match (self.state, self.hooks.as_mut()) {
            (ModuleState::Started, _) => Ok(()),
            (ModuleState::Loaded, Some(hooks)) => {
                hooks.start().map_err(|cause| PluginError::StartupFailed {
                    name: self.name.clone(),
                    cause,
                })?;
                self.state = ModuleState::Started;
                Ok(())
            }
            _ => Err(self.invalid("start")),
        }
    }

    /// Run the shutdown hook if started; no-op otherwise.
    ///
    /// The handle is back in `Loaded` even when the hook reports a failure:
    /// the hook has run and will not be retried.
    pub fn stop(&mut self) -> Result<(), PluginError> {
        if self.state != ModuleState::Started {
            return Ok(());
        }
        self.state = ModuleState::Loaded;

        match self.hooks.as_mut() {
            Some(hooks) => hooks.stop().map_err(|cause| PluginError::ShutdownFailed {
                name: self.name.clone(),
                cause,
            }),
            None => Ok(()),
        }
    }

    /// Close the library. Requires the handle to be stopped first.
    ///
    /// A failure reported by the OS while unmapping is logged; the handle is
    /// unloaded either way.
    pub fn unload(&mut self) -> Result<(), PluginError> {
        match self.state {
            ModuleState::Started => Err(self.invalid("unload")),
            ModuleState::Unloaded => Ok(()),
            ModuleState::Loaded => {
                self.state = ModuleState::Unloaded;
                self.hooks = None;
                if let Some(library) = self.library.take() {
                    close_library(&self.name, library);
                }
                Ok(())
            }
        }
    }

    fn invalid(&self, operation: &'static str) -> PluginError {
        PluginError::InvalidState {
            name: self.name.clone(),
            operation,
            state: self.state.to_string(),
        }
    }
}

impl Drop for ModuleHandle {
    fn drop(&mut self) {
        if self.library.is_none() {
            return;
        }

        if let Err(e) = self.stop() {
            tracing::warn!(plugin = %self.name, error = %e, "Plugin shutdown failed during drop");
        }
        if let Err(e) = self.unload() {
            tracing::warn!(plugin = %self.name, error = %e, "Plugin unload failed during drop");
        }
    }
}

fn close_library(name: &str, library: Box<dyn NativeLibrary>) {
    if let Err(e) = library.close() {
        tracing::warn!(plugin = %name, error = %e, "Failed to close plugin library");
    }
}
