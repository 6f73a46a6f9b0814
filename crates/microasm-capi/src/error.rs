//! Thread-local last-error slot and the call guard used by every export

use microasm_sys::{MASM_ERROR_GENERAL, MASM_OK, MasmResult};
use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use tracing::debug;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// A failed call: the code returned across the boundary and its diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    pub code: MasmResult,
    pub message: String,
}

impl Failure {
    pub(crate) fn new(code: MasmResult, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Overwrite the calling thread's last error
fn set_last_error(message: &str) {
    // Interior NULs would truncate the C string early
    let text = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(text));
}

/// Pointer to the calling thread's last error, or null if none was set
///
/// Valid until the next failing call on the same thread.
pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |text| text.as_ptr())
    })
}

/// Run an export body, recording failures and containing panics
///
/// Success leaves the last error untouched.
pub(crate) fn guard(name: &str, body: impl FnOnce() -> Result<(), Failure>) -> MasmResult {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => MASM_OK,
        Ok(Err(failure)) => {
            debug!(call = name, code = failure.code, error = %failure.message, "Call failed");
            set_last_error(&failure.message);
            failure.code
        }
        Err(_) => {
            set_last_error(&format!("{name}: internal error (panic)"));
            MASM_ERROR_GENERAL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microasm_sys::MASM_ERROR_MEMORY;
    use std::ffi::CStr;

    fn last_error() -> Option<String> {
        let ptr = last_error_ptr();
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    }

    #[test]
    fn test_guard_records_failure() {
        let code = guard("test", || Err(Failure::new(MASM_ERROR_MEMORY, "out of range")));
        assert_eq!(code, MASM_ERROR_MEMORY);
        assert_eq!(last_error().as_deref(), Some("out of range"));
    }

    #[test]
    fn test_success_keeps_stale_error() {
        set_last_error("earlier");
        assert_eq!(guard("test", || Ok(())), MASM_OK);
        assert_eq!(last_error().as_deref(), Some("earlier"));
    }

    #[test]
    fn test_panic_is_contained() {
        let code = guard("boom", || panic!("unexpected"));
        assert_eq!(code, MASM_ERROR_GENERAL);
        assert!(last_error().unwrap().contains("boom"));
    }

    #[test]
    fn test_interior_nul_is_replaced() {
        set_last_error("a\0b");
        assert_eq!(last_error().as_deref(), Some("a b"));
    }

    #[test]
    fn test_slot_is_per_thread() {
        set_last_error("main thread");
        std::thread::spawn(|| assert!(last_error_ptr().is_null()))
            .join()
            .unwrap();
        assert_eq!(last_error().as_deref(), Some("main thread"));
    }
}
