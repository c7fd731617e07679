//! Hello Module - A minimal example module for geomod
//!
//! This module demonstrates:
//! - Implementing the `Module` trait
//! - Exporting the entry points with `export_module!`
//! - Reporting a startup failure back to the runtime
//!
//! ## Building
//!
//! ```bash
//! cargo build --release
//! ```
//!
//! ## Installing
//!
//! ```bash
//! mkdir -p ~/.local/share/geomod/plugins
//! cp hello.plugin.json target/release/libhello_module.so ~/.local/share/geomod/plugins/
//! export GEOMOD_PLUGIN_PATH=~/.local/share/geomod/plugins
//! ```
//!
//! Set `HELLO_MODULE_FAIL=1` to watch the runtime reject the module.

use std::sync::atomic::{AtomicU32, Ordering};

use geomod_module_api::{Module, ModuleError, export_module};

/// Startups across the lifetime of the library mapping.
static STARTS: AtomicU32 = AtomicU32::new(0);

#[derive(Default)]
pub struct HelloModule {
    greeting: Option<String>,
}

impl Module for HelloModule {
    fn startup(&mut self) -> Result<(), ModuleError> {
        if std::env::var_os("HELLO_MODULE_FAIL").is_some() {
            return Err(ModuleError::config("HELLO_MODULE_FAIL is set"));
        }

        let count = STARTS.fetch_add(1, Ordering::SeqCst) + 1;
        let greeting = format!("hello module started ({count})");
        eprintln!("{greeting}");
        self.greeting = Some(greeting);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ModuleError> {
        if let Some(greeting) = self.greeting.take() {
            eprintln!("goodbye from: {greeting}");
        }
        Ok(())
    }
}

export_module!(HelloModule);
