//! PluginManager - owns the catalog and the loaded set
//!
//! Every operation that changes the catalog or the loaded set runs under one
//! write lock held for the whole batch. A batch either commits completely or
//! leaves the loaded set exactly as it found it. Observers are told about
//! what happened once the lock has been released.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::catalog::Catalog;
use crate::config::ManagerConfig;
use crate::descriptor::PluginDescriptor;
use crate::enabled::EnabledPlugins;
use crate::error::PluginError;
use crate::events::{Observer, ObserverId, PluginEvent};
use crate::finder::{FileSystem, Finder};
use crate::handle::ModuleHandle;
use crate::loader::{DylibLoader, EntryPoints, LibraryLoader};
use crate::resolver;

/// Lifecycle of the manager itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Constructed, [`PluginManager::initialize`] not called yet
    Uninitialized,
    /// Discovery ran and enabled plugins were loaded
    Initialized,
    /// [`PluginManager::finalize`] unloaded everything
    Finalized,
}

/// Outcome of [`PluginManager::initialize`]
#[derive(Debug, Default)]
pub struct InitReport {
    /// Manifests parsed during discovery
    pub discovered: usize,
    /// Plugins loaded because they are enabled, in load order
    pub loaded: Vec<String>,
    /// Everything that went wrong; none of it stopped initialization
    pub errors: Vec<PluginError>,
}

struct ManagerInner {
    state: ManagerState,
    catalog: Catalog,
    /// Load order
    loaded: Vec<ModuleHandle>,
    /// Name -> reason of the last failed load attempt
    broken: BTreeMap<String, String>,
}

impl ManagerInner {
    fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|h| h.name() == name)
    }

    fn loaded_names(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(ModuleHandle::name)
    }

    /// Load `requested` and their dependencies. Returns the newly loaded
    /// names in load order.
    fn load_batch<S: AsRef<str>>(
        &mut self,
        requested: &[S],
        loader: &dyn LibraryLoader,
        entry_points: &EntryPoints,
        events: &mut Vec<PluginEvent>,
    ) -> Result<Vec<String>, PluginError> {
        let order = resolver::resolve(requested, &self.catalog)?;
        let mut batch: Vec<ModuleHandle> = Vec::new();

        for name in order {
            if self.is_loaded(&name) {
                tracing::debug!(plugin = %name, "Plugin already loaded");
                continue;
            }

            let started = self
                .catalog
                .get(&name)
                .ok_or_else(|| PluginError::not_found(&name))
                .and_then(|descriptor| ModuleHandle::load(descriptor, loader, entry_points))
                .and_then(|mut handle| {
                    handle.start()?;
                    Ok(handle)
                });

            match started {
                Ok(handle) => batch.push(handle),
                Err(e) => {
                    tracing::error!(plugin = %name, error = %e, "Failed to load plugin");
                    roll_back(batch);
                    self.broken.insert(name.clone(), e.to_string());
                    events.push(PluginEvent::LoadFailed {
                        name,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        let names: Vec<String> = batch.iter().map(|h| h.name().to_string()).collect();
        for name in &names {
            self.broken.remove(name);
            tracing::info!(plugin = %name, "Plugin loaded");
            events.push(PluginEvent::Loaded { name: name.clone() });
        }
        self.loaded.extend(batch);

        Ok(names)
    }

    fn unload_all(&mut self, events: &mut Vec<PluginEvent>) {
        while let Some(handle) = self.loaded.pop() {
            events.push(PluginEvent::Unloaded {
                name: handle.name().to_string(),
            });
            shut_down(handle);
        }
    }
}

/// Undo a partially loaded batch, last loaded first.
fn roll_back(batch: Vec<ModuleHandle>) {
    for handle in batch.into_iter().rev() {
        tracing::warn!(plugin = %handle.name(), "Rolling back plugin load");
        shut_down(handle);
    }
}

/// Stop and unload a handle, logging failures.
fn shut_down(mut handle: ModuleHandle) {
    if let Err(e) = handle.stop() {
        tracing::warn!(plugin = %handle.name(), error = %e, "Plugin shutdown failed");
    }
    if let Err(e) = handle.unload() {
        tracing::warn!(plugin = %handle.name(), error = %e, "Plugin unload failed");
    }
    tracing::info!(plugin = %handle.name(), "Plugin unloaded");
}

/// Registry of known plugins and owner of the loaded ones.
///
/// Construct one per process and share it behind an `Arc`:
///
/// ```no_run
/// use std::sync::Arc;
/// use geomod_core::PluginManager;
///
/// let manager = Arc::new(PluginManager::with_defaults());
/// let report = manager.initialize()?;
/// for error in &report.errors {
///     eprintln!("plugin error: {error}");
/// }
/// # Ok::<(), geomod_core::PluginError>(())
/// ```
pub struct PluginManager {
    inner: RwLock<ManagerInner>,
    loader: Arc<dyn LibraryLoader>,
    finder: Finder,
    config: ManagerConfig,
    entry_points: EntryPoints,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: AtomicU64,
}

impl PluginManager {
    pub fn new(config: ManagerConfig, loader: impl LibraryLoader + 'static) -> Self {
        let finder = Finder::new().with_extension(config.manifest_extension.clone());
        let entry_points = config.entry_points();
        Self {
            inner: RwLock::new(ManagerInner {
                state: ManagerState::Uninitialized,
                catalog: Catalog::new(),
                loaded: Vec::new(),
                broken: BTreeMap::new(),
            }),
            loader: Arc::new(loader),
            finder,
            config,
            entry_points,
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        }
    }

    /// Default configuration, loading real shared objects.
    pub fn with_defaults() -> Self {
        Self::new(ManagerConfig::default(), DylibLoader)
    }

    /// Discover manifests through `fs` instead of the local filesystem.
    pub fn with_filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.finder = std::mem::take(&mut self.finder).with_filesystem(fs);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, ManagerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ManagerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Lifecycle ---

    /// Discover manifests, add them to the catalog and load the enabled
    /// plugins.
    ///
    /// Individual failures (bad manifests, duplicate names, plugins that do
    /// not load) end up in the report; only calling this twice is an error.
    pub fn initialize(&self) -> Result<InitReport, PluginError> {
        let mut report = InitReport::default();
        let mut events = Vec::new();

        {
            let mut inner = self.write();
            if inner.state == ManagerState::Initialized {
                return Err(PluginError::AlreadyInitialized);
            }

            let discovery = self.finder.discover(&self.config.resolved_search_dirs());
            report.discovered = discovery.found.len();
            report.errors.extend(discovery.errors);

            for descriptor in discovery.found {
                let name = descriptor.name.clone();
                match inner.catalog.insert(descriptor) {
                    Ok(()) => events.push(PluginEvent::Inserted { name }),
                    Err(e) => {
                        tracing::warn!(plugin = %name, error = %e, "Ignoring discovered plugin");
                        report.errors.push(e);
                    }
                }
            }

            let enabled = match &self.config.enabled_file {
                Some(path) => EnabledPlugins::load(path).unwrap_or_else(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read enabled plugins");
                    report.errors.push(e);
                    EnabledPlugins::default()
                }),
                None => EnabledPlugins::default(),
            };

            for name in enabled.names() {
                if !inner.catalog.contains(name) {
                    tracing::warn!(plugin = %name, "Enabled plugin not found");
                    report.errors.push(PluginError::not_found(name));
                    continue;
                }
                match inner.load_batch(&[name], &*self.loader, &self.entry_points, &mut events) {
                    Ok(loaded) => report.loaded.extend(loaded),
                    Err(e) => report.errors.push(e),
                }
            }

            inner.state = ManagerState::Initialized;
            tracing::info!(
                discovered = report.discovered,
                loaded = report.loaded.len(),
                errors = report.errors.len(),
                "Plugin manager initialized"
            );
        }

        self.notify(&events);
        Ok(report)
    }

    /// Unload every plugin and forget the catalog.
    pub fn finalize(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.write();
            inner.unload_all(&mut events);
            events.extend(
                inner
                    .catalog
                    .names()
                    .map(|name| PluginEvent::Removed { name: name.to_string() }),
            );
            inner.catalog.clear();
            inner.broken.clear();
            inner.state = ManagerState::Finalized;
        }
        tracing::info!("Plugin manager finalized");
        self.notify(&events);
    }

    pub fn state(&self) -> ManagerState {
        self.read().state
    }

    /// Persist the currently loaded plugins as the enabled set.
    pub fn save_enabled(&self) -> Result<(), PluginError> {
        let path = self
            .config
            .enabled_file
            .as_ref()
            .ok_or_else(|| PluginError::Config("no enabled-plugins file configured".to_string()))?;
        let enabled: EnabledPlugins = self.loaded().into_iter().collect();
        enabled.save(path)
    }

    // --- Catalog ---

    /// Add a descriptor to the catalog.
    pub fn insert(&self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        let name = descriptor.name.clone();
        self.write().catalog.insert(descriptor)?;
        tracing::debug!(plugin = %name, "Plugin registered");
        self.notify(&[PluginEvent::Inserted { name }]);
        Ok(())
    }

    /// Remove a descriptor from the catalog. The plugin must not be loaded.
    pub fn remove(&self, name: &str) -> Result<PluginDescriptor, PluginError> {
        let removed = {
            let mut inner = self.write();
            if inner.is_loaded(name) {
                return Err(PluginError::StillLoaded {
                    name: name.to_string(),
                });
            }
            let removed = inner
                .catalog
                .remove(name)
                .ok_or_else(|| PluginError::not_found(name))?;
            inner.broken.remove(name);
            removed
        };

        self.notify(&[PluginEvent::Removed {
            name: name.to_string(),
        }]);
        Ok(removed)
    }

    /// Descriptor registered under `name`.
    pub fn get(&self, name: &str) -> Result<PluginDescriptor, PluginError> {
        self.read()
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::not_found(name))
    }

    /// Catalog names in insertion order.
    pub fn plugins(&self) -> Vec<String> {
        self.read().catalog.names().map(str::to_string).collect()
    }

    /// Number of plugins in the catalog.
    pub fn len(&self) -> usize {
        self.read().catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().catalog.is_empty()
    }

    // --- Loading ---

    /// Load `name` and everything it depends on.
    ///
    /// Already loaded plugins are skipped. If any plugin of the batch fails,
    /// the ones started by this call are stopped and unloaded in reverse
    /// order and the loaded set is left untouched.
    pub fn load(&self, name: &str) -> Result<(), PluginError> {
        self.load_many(&[name])
    }

    /// Load every plugin in the catalog, as one batch.
    pub fn load_all(&self) -> Result<(), PluginError> {
        let mut events = Vec::new();
        let result = {
            let mut inner = self.write();
            let all: Vec<String> = inner.catalog.names().map(str::to_string).collect();
            inner.load_batch(&all, &*self.loader, &self.entry_points, &mut events)
        };
        self.notify(&events);
        result.map(|_| ())
    }

    fn load_many(&self, names: &[&str]) -> Result<(), PluginError> {
        let mut events = Vec::new();
        let result = self
            .write()
            .load_batch(names, &*self.loader, &self.entry_points, &mut events);
        self.notify(&events);
        result.map(|_| ())
    }

    /// Stop and unload `name`.
    ///
    /// No-op if the plugin is registered but not loaded. Fails while other
    /// loaded plugins depend on it. A failing shutdown hook is logged; the
    /// plugin is unloaded regardless.
    pub fn unload(&self, name: &str) -> Result<(), PluginError> {
        {
            let mut inner = self.write();
            if !inner.catalog.contains(name) {
                return Err(PluginError::not_found(name));
            }
            let Some(position) = inner.loaded.iter().position(|h| h.name() == name) else {
                tracing::debug!(plugin = %name, "Plugin not loaded");
                return Ok(());
            };

            let dependents = resolver::dependents(name, inner.loaded_names(), &inner.catalog);
            if !dependents.is_empty() {
                return Err(PluginError::HasDependents {
                    name: name.to_string(),
                    dependents,
                });
            }

            shut_down(inner.loaded.remove(position));
        }

        self.notify(&[PluginEvent::Unloaded {
            name: name.to_string(),
        }]);
        Ok(())
    }

    /// Stop and unload everything, in reverse load order.
    pub fn unload_all(&self) {
        let mut events = Vec::new();
        self.write().unload_all(&mut events);
        self.notify(&events);
    }

    // --- Queries ---

    pub fn is_loaded(&self, name: &str) -> bool {
        self.read().is_loaded(name)
    }

    /// Loaded plugin names in load order.
    pub fn loaded(&self) -> Vec<String> {
        self.read().loaded_names().map(str::to_string).collect()
    }

    /// Loaded plugins that directly depend on `name`.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        let inner = self.read();
        resolver::dependents(name, inner.loaded_names(), &inner.catalog)
    }

    /// Whether the last attempt to load `name` failed.
    pub fn is_broken(&self, name: &str) -> bool {
        self.read().broken.contains_key(name)
    }

    /// Plugins whose last load failed, with the reason.
    pub fn broken(&self) -> BTreeMap<String, String> {
        self.read().broken.clone()
    }

    // --- Observers ---

    /// Register a callback for lifecycle events.
    ///
    /// Callbacks run on the thread that performed the operation, after the
    /// manager's lock is released, so they may call back into the manager.
    pub fn subscribe(&self, observer: impl Fn(&PluginEvent) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    /// Remove a callback. Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    fn notify(&self, events: &[PluginEvent]) {
        if events.is_empty() {
            return;
        }

        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for event in events {
            for observer in &observers {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| observer(event)));
                if result.is_err() {
                    tracing::error!(plugin = %event.name(), "Plugin observer panicked");
                }
            }
        }
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut events = Vec::new();
        inner.unload_all(&mut events);
    }
}
