//! In-memory library loader.
//!
//! Lets the manager run its whole lifecycle without real shared objects.
//! Every open/start/stop/close is appended to a shared [`Journal`] as
//! `"<op>:<label>"`, so tests can assert exact call order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{EntryPoints, LibraryLoader, LoaderError, ModuleHooks, NativeLibrary};

/// Ordered record of loader activity
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, op: &str, label: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{op}:{label}"));
    }

    /// All entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How often `entry` (e.g. `"start:GDAL"`) was recorded.
    pub fn count(&self, entry: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| *e == entry)
            .count()
    }

    /// Entries starting with `op:` (e.g. `"start"`), labels only.
    pub fn ops(&self, op: &str) -> Vec<String> {
        let prefix = format!("{op}:");
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Behavior of one fake module
#[derive(Debug, Clone)]
pub struct MockModule {
    label: String,
    open_error: Option<String>,
    startup_error: Option<String>,
    shutdown_error: Option<String>,
    missing_symbols: Vec<String>,
    api_version: Option<u32>,
}

impl MockModule {
    /// A well-behaved module; `label` names it in the journal.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            open_error: None,
            startup_error: None,
            shutdown_error: None,
            missing_symbols: Vec::new(),
            api_version: Some(geomod_module_api::API_VERSION),
        }
    }

    /// The OS loader refuses the library.
    pub fn failing_open(mut self, cause: impl Into<String>) -> Self {
        self.open_error = Some(cause.into());
        self
    }

    /// The startup hook reports `cause`.
    pub fn failing_startup(mut self, cause: impl Into<String>) -> Self {
        self.startup_error = Some(cause.into());
        self
    }

    /// The shutdown hook reports `cause`.
    pub fn failing_shutdown(mut self, cause: impl Into<String>) -> Self {
        self.shutdown_error = Some(cause.into());
        self
    }

    /// The library does not export `symbol`.
    pub fn without_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.missing_symbols.push(symbol.into());
        self
    }

    /// The ABI version the module reports (`None`: no version symbol).
    pub fn with_api_version(mut self, version: Option<u32>) -> Self {
        self.api_version = version;
        self
    }
}

/// [`LibraryLoader`] serving [`MockModule`]s registered by path
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    modules: Arc<RwLock<HashMap<PathBuf, MockModule>>>,
    journal: Journal,
    open: Arc<AtomicUsize>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MockLoader::register`].
    pub fn with_module(self, path: impl Into<PathBuf>, module: MockModule) -> Self {
        self.register(path, module);
        self
    }

    /// Serve `module` for `path`, replacing any previous registration.
    pub fn register(&self, path: impl Into<PathBuf>, module: MockModule) {
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), module);
    }

    /// Shared journal of loader activity.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Libraries opened and not yet closed.
    pub fn open_libraries(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl LibraryLoader for MockLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LoaderError> {
        let module = self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound {
                path: path.to_path_buf(),
            })?;

        if let Some(cause) = &module.open_error {
            return Err(LoaderError::LoadFailed {
                path: path.to_path_buf(),
                cause: cause.clone(),
            });
        }

        self.journal.record("open", &module.label);
        self.open.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockLibrary {
            path: path.to_path_buf(),
            module,
            journal: self.journal.clone(),
            open: Arc::clone(&self.open),
        }))
    }
}

struct MockLibrary {
    path: PathBuf,
    module: MockModule,
    journal: Journal,
    open: Arc<AtomicUsize>,
}

impl NativeLibrary for MockLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn api_version(&self) -> Option<u32> {
        self.module.api_version
    }

    fn hooks(&self, entry_points: &EntryPoints) -> Result<Box<dyn ModuleHooks>, LoaderError> {
        for symbol in [&entry_points.startup, &entry_points.shutdown] {
            if self.module.missing_symbols.contains(symbol) {
                return Err(LoaderError::SymbolNotFound {
                    symbol: symbol.clone(),
                });
            }
        }

        Ok(Box::new(MockHooks {
            label: self.module.label.clone(),
            startup_error: self.module.startup_error.clone(),
            shutdown_error: self.module.shutdown_error.clone(),
            journal: self.journal.clone(),
        }))
    }

    fn close(self: Box<Self>) -> Result<(), LoaderError> {
        self.journal.record("close", &self.module.label);
        self.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockHooks {
    label: String,
    startup_error: Option<String>,
    shutdown_error: Option<String>,
    journal: Journal,
}

impl ModuleHooks for MockHooks {
    fn start(&mut self) -> Result<(), String> {
        self.journal.record("start", &self.label);
        self.startup_error.clone().map_or(Ok(()), Err)
    }

    fn stop(&mut self) -> Result<(), String> {
        self.journal.record("stop", &self.label);
        self.shutdown_error.clone().map_or(Ok(()), Err)
    }
}
