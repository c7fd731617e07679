//! Runtime support for the entry points generated by [`export_module!`].
//!
//! The generated C functions take no arguments, so the module instance and
//! the last failure message live in statics owned by the plugin library.
//! Everything here runs behind `catch_unwind`: a panic must never unwind
//! across the C boundary into the host.
//!
//! [`export_module!`]: crate::export_module

use std::any::Any;
use std::ffi::{CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Module, ModuleError};

/// Hook returned successfully.
pub const STATUS_OK: i32 = 0;
/// Hook returned an error; see the last-error entry point.
pub const STATUS_FAILED: i32 = 1;
/// Hook panicked; see the last-error entry point.
pub const STATUS_PANICKED: i32 = 2;

/// Storage for the live module instance.
pub type ModuleSlot<M> = Mutex<Option<M>>;

/// Storage for the most recent failure message.
pub type ErrorSlot = Mutex<Option<CString>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create the module (if needed) and run its startup hook.
///
/// A module whose startup fails is dropped, so the next attempt starts
/// from a fresh `Default` instance.
pub fn run_startup<M: Module + Default>(slot: &ModuleSlot<M>, last_error: &ErrorSlot) -> i32 {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut guard = lock(slot);
        let outcome = guard.get_or_insert_with(M::default).startup();
        if outcome.is_err() {
            *guard = None;
        }
        outcome
    }));

    if result.is_err() {
        lock(slot).take();
    }

    finish(result, last_error)
}

/// Run the shutdown hook and drop the module instance.
///
/// Shutting down a module that was never started is a successful no-op.
pub fn run_shutdown<M: Module>(slot: &ModuleSlot<M>, last_error: &ErrorSlot) -> i32 {
    let result = catch_unwind(AssertUnwindSafe(|| match lock(slot).take() {
        Some(mut module) => module.shutdown(),
        None => Ok(()),
    }));

    finish(result, last_error)
}

/// Pointer to the last failure message, or null if the last hook succeeded.
///
/// The pointer stays valid until the next hook call.
pub fn last_error_ptr(last_error: &ErrorSlot) -> *const c_char {
    lock(last_error)
        .as_ref()
        .map_or(std::ptr::null(), |message| message.as_ptr())
}

fn finish(result: Result<Result<(), ModuleError>, Box<dyn Any + Send>>, last_error: &ErrorSlot) -> i32 {
    let (status, message) = match result {
        Ok(Ok(())) => (STATUS_OK, None),
        Ok(Err(e)) => (STATUS_FAILED, Some(e.to_string())),
        Err(payload) => (STATUS_PANICKED, Some(panic_message(payload.as_ref()))),
    };

    *lock(last_error) = message.map(|m| CString::new(m.replace('\0', " ")).unwrap_or_default());
    status
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[derive(Default)]
    struct Counter {
        starts: u32,
    }

    impl Module for Counter {
        fn startup(&mut self) -> Result<(), ModuleError> {
            self.starts += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct Failing;

    impl Module for Failing {
        fn startup(&mut self) -> Result<(), ModuleError> {
            Err(ModuleError::ResourceUnavailable("GDAL_DATA".into()))
        }
    }

    #[derive(Default)]
    struct Panicking;

    impl Module for Panicking {
        fn startup(&mut self) -> Result<(), ModuleError> {
            panic!("boom")
        }
    }

    fn message(slot: &ErrorSlot) -> Option<String> {
        let ptr = last_error_ptr(slot);
        if ptr.is_null() {
            return None;
        }
        // SAFETY: the pointer comes from a CString still owned by `slot`.
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    #[test]
    fn test_startup_creates_module() {
        let slot: ModuleSlot<Counter> = Mutex::new(None);
        let errors: ErrorSlot = Mutex::new(None);

        assert_eq!(run_startup(&slot, &errors), STATUS_OK);
        assert_eq!(slot.lock().unwrap().as_ref().unwrap().starts, 1);
        assert!(message(&errors).is_none());
    }

    #[test]
    fn test_shutdown_drops_module() {
        let slot: ModuleSlot<Counter> = Mutex::new(None);
        let errors: ErrorSlot = Mutex::new(None);

        run_startup(&slot, &errors);
        assert_eq!(run_shutdown(&slot, &errors), STATUS_OK);
        assert!(slot.lock().unwrap().is_none());
    }

    #[test]
    fn test_shutdown_without_startup_is_ok() {
        let slot: ModuleSlot<Counter> = Mutex::new(None);
        let errors: ErrorSlot = Mutex::new(None);

        assert_eq!(run_shutdown(&slot, &errors), STATUS_OK);
    }

    #[test]
    fn test_startup_error_sets_message() {
        let slot: ModuleSlot<Failing> = Mutex::new(None);
        let errors: ErrorSlot = Mutex::new(None);

        assert_eq!(run_startup(&slot, &errors), STATUS_FAILED);
        assert!(slot.lock().unwrap().is_none());
        assert!(message(&errors).unwrap().contains("GDAL_DATA"));
    }

    #[test]
    fn test_startup_panic_is_contained() {
        let slot: ModuleSlot<Panicking> = Mutex::new(None);
        let errors: ErrorSlot = Mutex::new(None);

        assert_eq!(run_startup(&slot, &errors), STATUS_PANICKED);
        assert!(message(&errors).unwrap().contains("boom"));
        assert!(lock(&slot).is_none());
    }

    #[test]
    fn test_success_clears_previous_message() {
        let failing: ModuleSlot<Failing> = Mutex::new(None);
        let counter: ModuleSlot<Counter> = Mutex::new(None);
        let errors: ErrorSlot = Mutex::new(None);

        run_startup(&failing, &errors);
        assert!(message(&errors).is_some());

        run_startup(&counter, &errors);
        assert!(message(&errors).is_none());
    }
}
