//! C ABI of the MicroASM interpreter
//!
//! Every `masm_*` export takes an opaque handle produced by
//! [`masm_create_interpreter`]. Failures return a negative result code and
//! overwrite the calling thread's last error, which
//! [`masm_get_last_error`] exposes. Successful calls leave it untouched.
//!
//! A null handle is rejected with `MASM_ERROR_INVALID_HANDLE` by every
//! operation except destroy, where it is a no-op. Handles that were already
//! destroyed must not be passed in.

mod error;

use microasm_sys::{
    MASM_ERROR_EXECUTION_FAILED, MASM_ERROR_GENERAL, MASM_ERROR_INVALID_ARGUMENT,
    MASM_ERROR_INVALID_HANDLE, MASM_ERROR_LOAD_FAILED, MASM_ERROR_MEMORY, MasmInterpreterHandle,
    MasmResult,
};
use microasm_vm::{Machine, MachineConfig};
use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_int};
use std::ptr;
use tracing::debug;

use crate::error::{Failure, guard, last_error_ptr};

/// Borrow the machine behind a handle
///
/// # Safety
///
/// `handle` must be null or a live handle from [`masm_create_interpreter`]
/// with no other outstanding borrow.
unsafe fn machine<'a>(handle: MasmInterpreterHandle) -> Result<&'a mut Machine, Failure> {
    if handle.is_null() {
        return Err(Failure::new(
            MASM_ERROR_INVALID_HANDLE,
            "Invalid interpreter handle (null)",
        ));
    }
    // SAFETY: non-null handles originate from Box::into_raw in create
    Ok(unsafe { &mut *handle.cast::<Machine>() })
}

/// Store `value` through a caller-provided out-pointer
///
/// # Safety
///
/// `out` must be null or valid for a write of `T`.
unsafe fn write_out<T>(out: *mut T, value: T) -> Result<(), Failure> {
    if out.is_null() {
        return Err(Failure::new(
            MASM_ERROR_INVALID_ARGUMENT,
            "Output pointer cannot be null",
        ));
    }
    // SAFETY: checked non-null; validity is the caller's contract
    unsafe { out.write(value) };
    Ok(())
}

fn ram_failure(err: impl ToString) -> Failure {
    Failure::new(MASM_ERROR_MEMORY, err.to_string())
}

/// Create an interpreter with a RAM image of `ram_size` bytes
///
/// Returns null on failure and sets the last error.
#[unsafe(no_mangle)]
pub extern "C" fn masm_create_interpreter(
    ram_size: c_int,
    debug_mode: c_int,
) -> MasmInterpreterHandle {
    let mut handle = ptr::null_mut();
    guard("masm_create_interpreter", || {
        let ram_size = usize::try_from(ram_size)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                Failure::new(
                    MASM_ERROR_GENERAL,
                    format!("RAM size must be positive, got {ram_size}"),
                )
            })?;
        let config = MachineConfig {
            ram_size,
            debug: debug_mode != 0,
        };
        let vm = Machine::new(config)
            .map_err(|e| Failure::new(MASM_ERROR_GENERAL, e.to_string()))?;
        handle = Box::into_raw(Box::new(vm)).cast();
        debug!(ram_size, debug = config.debug, "Interpreter created");
        Ok(())
    });
    handle
}

/// Destroy an interpreter; null is a no-op
///
/// # Safety
///
/// `handle` must be null or a live handle that is not used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_destroy_interpreter(handle: MasmInterpreterHandle) {
    if handle.is_null() {
        return;
    }
    guard("masm_destroy_interpreter", || {
        // SAFETY: ownership returns to us exactly once
        drop(unsafe { Box::from_raw(handle.cast::<Machine>()) });
        debug!("Interpreter destroyed");
        Ok(())
    });
}

/// Load a bytecode file into a freshly created interpreter
///
/// # Safety
///
/// `handle` must be null or live; `path` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_load_bytecode(
    handle: MasmInterpreterHandle,
    path: *const c_char,
) -> MasmResult {
    guard("masm_load_bytecode", || {
        let vm = unsafe { machine(handle) }?;
        if path.is_null() {
            return Err(Failure::new(
                MASM_ERROR_INVALID_ARGUMENT,
                "Bytecode file path cannot be null",
            ));
        }
        // SAFETY: checked non-null; NUL termination is the caller's contract
        let path = unsafe { CStr::from_ptr(path) }.to_str().map_err(|_| {
            Failure::new(
                MASM_ERROR_INVALID_ARGUMENT,
                "Bytecode file path is not valid UTF-8",
            )
        })?;
        vm.load_file(path).map_err(|e| {
            Failure::new(
                MASM_ERROR_LOAD_FAILED,
                format!("Failed to load bytecode file '{path}': {e}"),
            )
        })
    })
}

/// Run the loaded program with the given script arguments
///
/// # Safety
///
/// `handle` must be null or live; when `argc > 0`, `argv` must point to
/// `argc` NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_execute(
    handle: MasmInterpreterHandle,
    argc: c_int,
    argv: *const *const c_char,
) -> MasmResult {
    guard("masm_execute", || {
        let vm = unsafe { machine(handle) }?;
        let count = usize::try_from(argc).map_err(|_| {
            Failure::new(
                MASM_ERROR_INVALID_ARGUMENT,
                format!("Argument count cannot be negative: {argc}"),
            )
        })?;
        if count > 0 && argv.is_null() {
            return Err(Failure::new(
                MASM_ERROR_INVALID_ARGUMENT,
                "Argument vector cannot be null when argc > 0",
            ));
        }

        let mut args: Vec<Cow<'_, str>> = Vec::with_capacity(count);
        for i in 0..count {
            // SAFETY: argv holds argc entries per the caller's contract
            let arg = unsafe { *argv.add(i) };
            if arg.is_null() {
                return Err(Failure::new(
                    MASM_ERROR_INVALID_ARGUMENT,
                    format!("Script argument {i} is null"),
                ));
            }
            args.push(unsafe { CStr::from_ptr(arg) }.to_string_lossy());
        }

        vm.execute(&args)
            .map_err(|e| Failure::new(MASM_ERROR_EXECUTION_FAILED, e.to_string()))
    })
}

/// Read register `index` into `out_value`
///
/// # Safety
///
/// `handle` must be null or live; `out_value` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_get_register(
    handle: MasmInterpreterHandle,
    index: c_int,
    out_value: *mut i32,
) -> MasmResult {
    guard("masm_get_register", || {
        let vm = unsafe { machine(handle) }?;
        let value = vm
            .register(index.into())
            .map_err(|e| Failure::new(MASM_ERROR_GENERAL, e.to_string()))?;
        unsafe { write_out(out_value, value) }
    })
}

/// Read the little-endian word at `address`
///
/// # Safety
///
/// `handle` must be null or live; `out_value` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_read_ram_int(
    handle: MasmInterpreterHandle,
    address: c_int,
    out_value: *mut i32,
) -> MasmResult {
    guard("masm_read_ram_int", || {
        let vm = unsafe { machine(handle) }?;
        let value = vm.read_word(address.into()).map_err(ram_failure)?;
        unsafe { write_out(out_value, value) }
    })
}

/// Write a little-endian word at `address`
///
/// # Safety
///
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_write_ram_int(
    handle: MasmInterpreterHandle,
    address: c_int,
    value: i32,
) -> MasmResult {
    guard("masm_write_ram_int", || {
        let vm = unsafe { machine(handle) }?;
        vm.write_word(address.into(), value).map_err(ram_failure)
    })
}

/// Last error recorded on the calling thread, or null if there was none
///
/// The string stays valid until the next failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn masm_get_last_error() -> *const c_char {
    last_error_ptr()
}

/// Toggle per-instruction tracing
///
/// # Safety
///
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_set_debug_mode(
    handle: MasmInterpreterHandle,
    enabled: c_int,
) -> MasmResult {
    guard("masm_set_debug_mode", || {
        let vm = unsafe { machine(handle) }?;
        vm.set_debug(enabled != 0);
        Ok(())
    })
}

/// Current code offset of the instruction pointer
///
/// After a fault this is the offset just past the faulting instruction.
///
/// # Safety
///
/// `handle` must be null or live; `out_value` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_get_instruction_pointer(
    handle: MasmInterpreterHandle,
    out_value: *mut c_int,
) -> MasmResult {
    guard("masm_get_instruction_pointer", || {
        let vm = unsafe { machine(handle) }?;
        // Code segments are bounded by a u32 header field
        let ip = c_int::try_from(vm.ip()).map_err(|_| {
            Failure::new(MASM_ERROR_GENERAL, "Instruction pointer exceeds int range")
        })?;
        unsafe { write_out(out_value, ip) }
    })
}

/// Number of registers in the register file
///
/// # Safety
///
/// `handle` must be null or live; `out_value` must be null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn masm_get_register_count(
    handle: MasmInterpreterHandle,
    out_value: *mut c_int,
) -> MasmResult {
    guard("masm_get_register_count", || {
        let vm = unsafe { machine(handle) }?;
        let count = c_int::try_from(vm.registers().len())
            .map_err(|_| Failure::new(MASM_ERROR_GENERAL, "Register count exceeds int range"))?;
        unsafe { write_out(out_value, count) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use microasm_sys::MASM_OK;

    fn last_error() -> String {
        let ptr = masm_get_last_error();
        assert!(!ptr.is_null());
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    #[test]
    fn test_create_rejects_non_positive_ram() {
        assert!(masm_create_interpreter(0, 0).is_null());
        assert_eq!(last_error(), "RAM size must be positive, got 0");
        assert!(masm_create_interpreter(-4, 1).is_null());
        assert_eq!(last_error(), "RAM size must be positive, got -4");
    }

    #[test]
    fn test_null_handle_is_uniform() {
        let null = ptr::null_mut();
        let path = c"missing.bin";
        let mut out = 0;
        unsafe {
            assert_eq!(masm_load_bytecode(null, path.as_ptr()), MASM_ERROR_INVALID_HANDLE);
            assert_eq!(masm_execute(null, 0, ptr::null()), MASM_ERROR_INVALID_HANDLE);
            assert_eq!(masm_get_register(null, 0, &mut out), MASM_ERROR_INVALID_HANDLE);
            assert_eq!(masm_read_ram_int(null, 0, &mut out), MASM_ERROR_INVALID_HANDLE);
            assert_eq!(masm_write_ram_int(null, 0, 1), MASM_ERROR_INVALID_HANDLE);
            masm_destroy_interpreter(null);
        }
        assert!(last_error().contains("Invalid interpreter handle"));
    }

    #[test]
    fn test_null_out_pointer() {
        let h = masm_create_interpreter(1024, 0);
        unsafe {
            assert_eq!(
                masm_get_register(h, 0, ptr::null_mut()),
                MASM_ERROR_INVALID_ARGUMENT
            );
            assert_eq!(
                masm_read_ram_int(h, 0, ptr::null_mut()),
                MASM_ERROR_INVALID_ARGUMENT
            );
            masm_destroy_interpreter(h);
        }
    }

    #[test]
    fn test_register_access() {
        let h = masm_create_interpreter(1024, 0);
        let mut value = -1;
        let mut count = 0;
        unsafe {
            assert_eq!(masm_get_register(h, 0, &mut value), MASM_OK);
            assert_eq!(value, 0);
            assert_eq!(masm_get_register(h, 7, &mut value), MASM_OK);
            assert_eq!(value, 1024);
            assert_eq!(masm_get_register(h, 24, &mut value), MASM_ERROR_GENERAL);
            assert_eq!(masm_get_register(h, -1, &mut value), MASM_ERROR_GENERAL);
            assert_eq!(masm_get_register_count(h, &mut count), MASM_OK);
            assert_eq!(count, 24);
            masm_destroy_interpreter(h);
        }
    }

    #[test]
    fn test_ram_bounds() {
        let h = masm_create_interpreter(1024, 0);
        let mut value = 0;
        unsafe {
            assert_eq!(masm_write_ram_int(h, 1020, 7), MASM_OK);
            assert_eq!(masm_read_ram_int(h, 1020, &mut value), MASM_OK);
            assert_eq!(value, 7);
            assert_eq!(masm_write_ram_int(h, 1021, 7), MASM_ERROR_MEMORY);
            assert_eq!(masm_read_ram_int(h, -1, &mut value), MASM_ERROR_MEMORY);
            masm_destroy_interpreter(h);
        }
    }

    #[test]
    fn test_execute_before_load() {
        let h = masm_create_interpreter(1024, 0);
        unsafe {
            assert_eq!(masm_execute(h, 0, ptr::null()), MASM_ERROR_EXECUTION_FAILED);
            assert!(last_error().contains("no bytecode loaded"));
            assert_eq!(masm_execute(h, -1, ptr::null()), MASM_ERROR_INVALID_ARGUMENT);
            assert_eq!(masm_execute(h, 2, ptr::null()), MASM_ERROR_INVALID_ARGUMENT);
            masm_destroy_interpreter(h);
        }
    }

    #[test]
    fn test_load_rejects_null_path() {
        let h = masm_create_interpreter(1024, 0);
        unsafe {
            assert_eq!(masm_load_bytecode(h, ptr::null()), MASM_ERROR_INVALID_ARGUMENT);
            masm_destroy_interpreter(h);
        }
    }

    #[test]
    fn test_debug_mode_and_ip() {
        let h = masm_create_interpreter(1024, 0);
        let mut ip = -1;
        unsafe {
            assert_eq!(masm_set_debug_mode(h, 1), MASM_OK);
            assert_eq!(masm_get_instruction_pointer(h, &mut ip), MASM_OK);
            assert_eq!(ip, 0);
            assert_eq!(
                masm_set_debug_mode(ptr::null_mut(), 1),
                MASM_ERROR_INVALID_HANDLE
            );
            masm_destroy_interpreter(h);
        }
    }
}
