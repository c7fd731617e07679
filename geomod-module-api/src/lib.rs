//! geomod-module-api - Module API for the geomod plugin runtime
//!
//! This crate provides what a natively loaded plugin module needs: the
//! [`Module`] lifecycle trait and the [`export_module!`] macro that turns an
//! implementation into the C entry points the runtime resolves.
//!
//! # Example
//!
//! ```ignore
//! use geomod_module_api::{Module, ModuleError, export_module};
//!
//! #[derive(Default)]
//! pub struct GdalDriver;
//!
//! impl Module for GdalDriver {
//!     fn startup(&mut self) -> Result<(), ModuleError> {
//!         // register data source factories, load driver metadata...
//!         Ok(())
//!     }
//!
//!     fn shutdown(&mut self) -> Result<(), ModuleError> {
//!         Ok(())
//!     }
//! }
//!
//! export_module!(GdalDriver);
//! ```

pub mod error;
pub mod hooks;

pub use error::ModuleError;

/// Current module ABI version. Modules reporting a different version are
/// rejected at load time.
pub const API_VERSION: u32 = 1;

/// Startup hook symbol: `extern "C" fn() -> i32`.
pub const STARTUP_SYMBOL: &str = "_geomod_module_startup";

/// Shutdown hook symbol: `extern "C" fn() -> i32`.
pub const SHUTDOWN_SYMBOL: &str = "_geomod_module_shutdown";

/// Optional ABI version symbol: `extern "C" fn() -> u32`.
pub const API_VERSION_SYMBOL: &str = "_geomod_module_api_version";

/// Optional failure message symbol: `extern "C" fn() -> *const c_char`.
pub const LAST_ERROR_SYMBOL: &str = "_geomod_module_last_error";

/// Lifecycle of a natively loaded module.
///
/// The runtime calls `startup` once after loading the library and
/// `shutdown` once before unloading it. Guarding against repeated calls is
/// the runtime's job, not the module's.
pub trait Module: Send {
    /// Initialize the module: register factories, read resources, etc.
    fn startup(&mut self) -> Result<(), ModuleError>;

    /// Release everything registered in `startup`.
    fn shutdown(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Export a module type for dynamic loading.
///
/// The type must implement [`Module`] and `Default`.
///
/// # Generated Functions
///
/// - `_geomod_module_startup()`: creates the module and runs `startup`
/// - `_geomod_module_shutdown()`: runs `shutdown` and drops the module
/// - `_geomod_module_api_version()`: returns [`API_VERSION`]
/// - `_geomod_module_last_error()`: message of the last failed hook, or null
#[macro_export]
macro_rules! export_module {
    ($module_type:ty) => {
        static __GEOMOD_MODULE: $crate::hooks::ModuleSlot<$module_type> =
            ::std::sync::Mutex::new(None);
        static __GEOMOD_LAST_ERROR: $crate::hooks::ErrorSlot = ::std::sync::Mutex::new(None);

        #[unsafe(no_mangle)]
        pub extern "C" fn _geomod_module_startup() -> i32 {
            $crate::hooks::run_startup(&__GEOMOD_MODULE, &__GEOMOD_LAST_ERROR)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _geomod_module_shutdown() -> i32 {
            $crate::hooks::run_shutdown(&__GEOMOD_MODULE, &__GEOMOD_LAST_ERROR)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _geomod_module_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _geomod_module_last_error() -> *const ::std::ffi::c_char {
            $crate::hooks::last_error_ptr(&__GEOMOD_LAST_ERROR)
        }
    };
}
