//! Lifecycle tests for PluginManager
//!
//! Drives the manager through the mock loader and checks the batch rules:
//! - Loads are all-or-nothing and follow dependency order
//! - Unloads respect dependents and run in reverse order
//! - Initialization discovers manifests and loads the enabled plugins

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use geomod_core::loader::mock::{MockLoader, MockModule};
use geomod_core::{
    EnabledPlugins, ManagerConfig, ManagerState, PluginDescriptor, PluginError, PluginEvent,
    PluginManager, manifest,
};
use tempfile::TempDir;

fn descriptor(name: &str, deps: &[&str]) -> PluginDescriptor {
    deps.iter().fold(
        PluginDescriptor::new(name, format!("lib{name}.so")),
        |d, dep| d.with_dependency(*dep),
    )
}

fn create_test_manager(plugins: &[(&str, &[&str])]) -> (PluginManager, MockLoader) {
    let loader = MockLoader::new();
    let manager = PluginManager::new(ManagerConfig::isolated(Vec::new()), loader.clone());
    for (name, deps) in plugins {
        loader.register(format!("lib{name}.so"), MockModule::new(*name));
        manager.insert(descriptor(name, deps)).unwrap();
    }
    (manager, loader)
}

/// Write a manifest whose library lives next to it, and serve that library
/// from `loader`.
fn install(dir: &Path, loader: &MockLoader, name: &str, deps: &[&str]) {
    let desc = descriptor(name, deps)
        .with_title(format!("{name} driver"))
        .with_category("Data Access");
    manifest::write(&desc, &dir.join(format!("{name}.plugin.json"))).unwrap();
    loader.register(dir.join(format!("lib{name}.so")), MockModule::new(name));
}

#[test]
fn cycle_leaves_catalog_and_loaded_set_untouched() {
    let (manager, loader) = create_test_manager(&[("A", &["B"]), ("B", &["A"])]);

    match manager.load("A").unwrap_err() {
        PluginError::CyclicDependency { names } => {
            assert_eq!(names.first(), names.last());
            assert!(names.contains(&"B".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(manager.plugins(), vec!["A", "B"]);
    assert!(manager.loaded().is_empty());
    assert_eq!(loader.open_libraries(), 0);
}

#[test]
fn failing_root_dependency_loads_nothing() {
    let (manager, loader) = create_test_manager(&[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
    loader.register("libA.so", MockModule::new("A").failing_startup("cannot init"));

    assert!(matches!(
        manager.load("C"),
        Err(PluginError::StartupFailed { ref name, .. }) if name == "A"
    ));
    assert!(manager.loaded().is_empty());
    assert!(loader.journal().ops("start").iter().all(|n| n == "A"));
}

#[test]
fn second_load_is_a_noop() {
    let (manager, loader) = create_test_manager(&[("A", &[])]);

    manager.load("A").unwrap();
    manager.load("A").unwrap();

    assert_eq!(manager.loaded(), vec!["A"]);
    assert_eq!(loader.journal().count("open:A"), 1);
    assert_eq!(loader.journal().count("start:A"), 1);
}

#[test]
fn dependents_block_unload_until_released() {
    let (manager, _) = create_test_manager(&[("A", &[]), ("B", &["A"])]);
    manager.load("B").unwrap();

    assert!(matches!(
        manager.unload("A"),
        Err(PluginError::HasDependents { .. })
    ));
    assert_eq!(manager.loaded(), vec!["A", "B"]);

    manager.unload("B").unwrap();
    manager.unload("A").unwrap();
    assert!(manager.loaded().is_empty());
}

#[test]
fn load_all_puts_dependent_last() {
    let (manager, loader) =
        create_test_manager(&[("GDAL", &[]), ("OGR", &[]), ("PGIS", &["GDAL"])]);

    manager.load_all().unwrap();

    let loaded = manager.loaded();
    assert!(
        loaded == ["GDAL", "OGR", "PGIS"] || loaded == ["OGR", "GDAL", "PGIS"],
        "{loaded:?}"
    );
    assert_eq!(loader.journal().ops("start"), loaded);

    manager.unload_all();
    let mut reversed = loaded.clone();
    reversed.reverse();
    assert_eq!(loader.journal().ops("stop"), reversed);
}

#[test]
fn missing_entry_point_is_reported_with_hook_name() {
    let (manager, loader) = create_test_manager(&[("WMS", &[])]);
    loader.register(
        "libWMS.so",
        MockModule::new("WMS").without_symbol(geomod_module_api::SHUTDOWN_SYMBOL),
    );

    match manager.load("WMS").unwrap_err() {
        PluginError::EntryPointMissing { name, hook } => {
            assert_eq!(name, "WMS");
            assert_eq!(hook, geomod_module_api::SHUTDOWN_SYMBOL);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.is_broken("WMS"));
    assert_eq!(loader.open_libraries(), 0);
}

#[test]
fn initialize_discovers_and_loads_enabled() {
    let dir = TempDir::new().unwrap();
    let loader = MockLoader::new();
    install(dir.path(), &loader, "te.da.gdal", &[]);
    install(dir.path(), &loader, "te.da.ogr", &[]);
    install(dir.path(), &loader, "te.da.pgis", &["te.da.gdal"]);
    std::fs::write(dir.path().join("broken.plugin.json"), "{ not json").unwrap();

    let config = ManagerConfig::isolated([dir.path().to_path_buf()]);
    let enabled: EnabledPlugins = ["te.da.pgis"].into_iter().collect();
    enabled.save(config.enabled_file.as_deref().unwrap()).unwrap();

    let manager = PluginManager::new(config, loader.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    manager.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    let report = manager.initialize().unwrap();

    assert_eq!(report.discovered, 3);
    assert_eq!(report.loaded, vec!["te.da.gdal", "te.da.pgis"]);
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], PluginError::ParseError { .. }));

    assert_eq!(manager.state(), ManagerState::Initialized);
    assert_eq!(manager.len(), 3);
    assert_eq!(manager.loaded(), vec!["te.da.gdal", "te.da.pgis"]);
    assert_eq!(
        manager.get("te.da.ogr").unwrap().library,
        dir.path().join("libte.da.ogr.so")
    );

    let events = events.lock().unwrap();
    let inserted = events
        .iter()
        .filter(|e| matches!(e, PluginEvent::Inserted { .. }))
        .count();
    assert_eq!(inserted, 3);
    assert_eq!(
        events.last(),
        Some(&PluginEvent::Loaded {
            name: "te.da.pgis".to_string()
        })
    );
}

#[test]
fn initialize_twice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = PluginManager::new(
        ManagerConfig::isolated([dir.path().to_path_buf()]),
        MockLoader::new(),
    );

    manager.initialize().unwrap();
    assert!(matches!(
        manager.initialize(),
        Err(PluginError::AlreadyInitialized)
    ));
}

#[test]
fn initialize_reports_unknown_enabled_and_duplicates() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let loader = MockLoader::new();
    install(first.path(), &loader, "te.da.gdal", &[]);
    install(second.path(), &loader, "te.da.gdal", &[]);

    let config =
        ManagerConfig::isolated([first.path().to_path_buf(), second.path().to_path_buf()]);
    let enabled: EnabledPlugins = ["te.da.gdal", "te.da.ghost"].into_iter().collect();
    enabled.save(config.enabled_file.as_deref().unwrap()).unwrap();

    let manager = PluginManager::new(config, loader);
    let report = manager.initialize().unwrap();

    assert_eq!(report.discovered, 2);
    assert_eq!(report.loaded, vec!["te.da.gdal"]);
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, PluginError::DuplicateName { name } if name == "te.da.gdal")));
    assert!(report
        .errors
        .iter()
        .any(|e| matches!(e, PluginError::NotFound { name } if name == "te.da.ghost")));

    // First directory wins.
    assert_eq!(
        manager.get("te.da.gdal").unwrap().library,
        first.path().join("libte.da.gdal.so")
    );
}

#[test]
fn finalize_then_reinitialize() {
    let dir = TempDir::new().unwrap();
    let loader = MockLoader::new();
    install(dir.path(), &loader, "te.da.gdal", &[]);
    install(dir.path(), &loader, "te.da.ogr", &[]);

    let config = ManagerConfig::isolated([dir.path().to_path_buf()]);
    let enabled_file: PathBuf = config.enabled_file.clone().unwrap();
    let manager = PluginManager::new(config, loader.clone());

    manager.initialize().unwrap();
    manager.load_all().unwrap();
    manager.save_enabled().unwrap();

    manager.finalize();
    assert_eq!(manager.state(), ManagerState::Finalized);
    assert!(manager.is_empty());
    assert!(manager.loaded().is_empty());
    assert_eq!(loader.open_libraries(), 0);

    let saved = EnabledPlugins::load(&enabled_file).unwrap();
    assert!(saved.is_enabled("te.da.gdal"));
    assert!(saved.is_enabled("te.da.ogr"));

    let report = manager.initialize().unwrap();
    assert_eq!(report.loaded.len(), 2);
    assert_eq!(manager.state(), ManagerState::Initialized);
}
