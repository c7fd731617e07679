//! Shared-object loading with libloading.
//!
//! All unsafe code of the runtime lives here. Hook symbols are copied out
//! as plain function pointers; they stay valid only while the `Library`
//! they came from is open, which `ModuleHandle` guarantees by dropping the
//! hooks before closing the library.

use libloading::{Library, Symbol};
use std::ffi::{CStr, c_char};
use std::path::{Path, PathBuf};

use geomod_module_api::{API_VERSION_SYMBOL, LAST_ERROR_SYMBOL, hooks::STATUS_OK};

use super::{EntryPoints, LibraryLoader, LoaderError, ModuleHooks, NativeLibrary};

/// Type of the startup/shutdown entry points.
type HookFn = unsafe extern "C" fn() -> i32;

/// Type of the optional ABI version entry point.
type ApiVersionFn = unsafe extern "C" fn() -> u32;

/// Type of the optional last-error entry point.
type LastErrorFn = unsafe extern "C" fn() -> *const c_char;

/// Loads plugin modules as native shared objects
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl LibraryLoader for DylibLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeLibrary>, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::NotFound {
                path: path.to_path_buf(),
            });
        }

        // SAFETY: Loading runs the library's initializers. The path comes
        // from a manifest the application chose to load.
        let library = unsafe { Library::new(path) }.map_err(|e| LoaderError::LoadFailed {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        Ok(Box::new(DylibLibrary {
            path: path.to_path_buf(),
            library,
        }))
    }
}

struct DylibLibrary {
    path: PathBuf,
    library: Library,
}

impl DylibLibrary {
    /// Copy a function pointer out of the library.
    ///
    /// # Safety
    ///
    /// `T` must match the real signature of the exported symbol.
    unsafe fn symbol<T: Copy>(&self, name: &str) -> Result<T, LoaderError> {
        // SAFETY: forwarded to the caller.
        let symbol: Symbol<T> = unsafe { self.library.get(name.as_bytes()) }.map_err(|_| {
            LoaderError::SymbolNotFound {
                symbol: name.to_string(),
            }
        })?;
        Ok(*symbol)
    }
}

impl NativeLibrary for DylibLibrary {
    fn path(&self) -> &Path {
        &self.path
    }

    fn api_version(&self) -> Option<u32> {
        // SAFETY: the module API declares this symbol as `extern "C" fn() -> u32`.
        let version_fn = unsafe { self.symbol::<ApiVersionFn>(API_VERSION_SYMBOL) }.ok()?;
        // SAFETY: the library is open while `self` exists.
        Some(unsafe { version_fn() })
    }

    fn hooks(&self, entry_points: &EntryPoints) -> Result<Box<dyn ModuleHooks>, LoaderError> {
        // SAFETY: hook symbols are declared as `extern "C" fn() -> i32`.
        let startup = unsafe { self.symbol::<HookFn>(&entry_points.startup)? };
        // SAFETY: as above.
        let shutdown = unsafe { self.symbol::<HookFn>(&entry_points.shutdown)? };
        // SAFETY: declared as `extern "C" fn() -> *const c_char`.
        let last_error = unsafe { self.symbol::<LastErrorFn>(LAST_ERROR_SYMBOL) }.ok();

        Ok(Box::new(DylibHooks {
            startup,
            shutdown,
            last_error,
        }))
    }

    fn close(self: Box<Self>) -> Result<(), LoaderError> {
        let DylibLibrary { path, library } = *self;
        library
            .close()
            .map_err(|e| LoaderError::CloseFailed {
                path,
                cause: e.to_string(),
            })
    }
}

struct DylibHooks {
    startup: HookFn,
    shutdown: HookFn,
    last_error: Option<LastErrorFn>,
}

impl DylibHooks {
    fn invoke(&self, hook: HookFn, hook_name: &str) -> Result<(), String> {
        // SAFETY: the owning ModuleHandle keeps the library open while
        // hooks exist.
        let status = unsafe { hook() };
        if status == STATUS_OK {
            return Ok(());
        }

        let message = self.last_error.and_then(|last_error| {
            // SAFETY: the module returns null or a NUL-terminated string it
            // owns until its next hook call; we copy it out immediately.
            let ptr = unsafe { last_error() };
            (!ptr.is_null()).then(|| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        });

        Err(match message {
            Some(message) => message,
            None => format!("{hook_name} hook returned status {status}"),
        })
    }
}

impl ModuleHooks for DylibHooks {
    fn start(&mut self) -> Result<(), String> {
        self.invoke(self.startup, "startup")
    }

    fn stop(&mut self) -> Result<(), String> {
        self.invoke(self.shutdown, "shutdown")
    }
}
