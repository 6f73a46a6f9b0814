//! Raw C ABI of the MicroASM interpreter library
//!
//! Types, result codes and function signatures shared by the exporting side
//! (`microasm-capi`) and the dynamically binding side (`microasm-host`).
//! Nothing here is safe to call directly; use `microasm-host`.

#![allow(non_camel_case_types)]

use std::ffi::c_char;
use std::os::raw::c_int;

/// Opaque interpreter instance
#[repr(C)]
pub struct MasmInterpreter {
    _private: [u8; 0],
}

/// Handle to an interpreter instance; null means "no instance"
pub type MasmInterpreterHandle = *mut MasmInterpreter;

// Result codes
pub type MasmResult = c_int;
pub const MASM_OK: MasmResult = 0;
pub const MASM_ERROR_GENERAL: MasmResult = -1;
pub const MASM_ERROR_INVALID_HANDLE: MasmResult = -2;
pub const MASM_ERROR_LOAD_FAILED: MasmResult = -3;
pub const MASM_ERROR_EXECUTION_FAILED: MasmResult = -4;
pub const MASM_ERROR_INVALID_ARGUMENT: MasmResult = -5;
pub const MASM_ERROR_MEMORY: MasmResult = -6;

// Function signatures
pub type masm_create_interpreter_fn =
    unsafe extern "C" fn(ram_size: c_int, debug_mode: c_int) -> MasmInterpreterHandle;
pub type masm_destroy_interpreter_fn = unsafe extern "C" fn(handle: MasmInterpreterHandle);
pub type masm_load_bytecode_fn =
    unsafe extern "C" fn(handle: MasmInterpreterHandle, path: *const c_char) -> MasmResult;
pub type masm_execute_fn = unsafe extern "C" fn(
    handle: MasmInterpreterHandle,
    argc: c_int,
    argv: *const *const c_char,
) -> MasmResult;
pub type masm_get_register_fn = unsafe extern "C" fn(
    handle: MasmInterpreterHandle,
    index: c_int,
    out_value: *mut i32,
) -> MasmResult;
pub type masm_read_ram_int_fn = unsafe extern "C" fn(
    handle: MasmInterpreterHandle,
    address: c_int,
    out_value: *mut i32,
) -> MasmResult;
pub type masm_write_ram_int_fn =
    unsafe extern "C" fn(handle: MasmInterpreterHandle, address: c_int, value: i32) -> MasmResult;
pub type masm_get_last_error_fn = unsafe extern "C" fn() -> *const c_char;
pub type masm_set_debug_mode_fn =
    unsafe extern "C" fn(handle: MasmInterpreterHandle, enabled: c_int) -> MasmResult;
pub type masm_get_instruction_pointer_fn =
    unsafe extern "C" fn(handle: MasmInterpreterHandle, out_value: *mut c_int) -> MasmResult;
pub type masm_get_register_count_fn =
    unsafe extern "C" fn(handle: MasmInterpreterHandle, out_value: *mut c_int) -> MasmResult;

// Exported symbol names, NUL-terminated for dynamic lookup
pub const SYM_CREATE_INTERPRETER: &[u8] = b"masm_create_interpreter\0";
pub const SYM_DESTROY_INTERPRETER: &[u8] = b"masm_destroy_interpreter\0";
pub const SYM_LOAD_BYTECODE: &[u8] = b"masm_load_bytecode\0";
pub const SYM_EXECUTE: &[u8] = b"masm_execute\0";
pub const SYM_GET_REGISTER: &[u8] = b"masm_get_register\0";
pub const SYM_READ_RAM_INT: &[u8] = b"masm_read_ram_int\0";
pub const SYM_WRITE_RAM_INT: &[u8] = b"masm_write_ram_int\0";
pub const SYM_GET_LAST_ERROR: &[u8] = b"masm_get_last_error\0";
pub const SYM_SET_DEBUG_MODE: &[u8] = b"masm_set_debug_mode\0";
pub const SYM_GET_INSTRUCTION_POINTER: &[u8] = b"masm_get_instruction_pointer\0";
pub const SYM_GET_REGISTER_COUNT: &[u8] = b"masm_get_register_count\0";

/// Default library file name for the current platform
#[cfg(target_os = "windows")]
pub const LIBRARY_NAME: &str = "microasm_capi.dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_NAME: &str = "libmicroasm_capi.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_NAME: &str = "libmicroasm_capi.so";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes_are_distinct() {
        let codes = [
            MASM_OK,
            MASM_ERROR_GENERAL,
            MASM_ERROR_INVALID_HANDLE,
            MASM_ERROR_LOAD_FAILED,
            MASM_ERROR_EXECUTION_FAILED,
            MASM_ERROR_INVALID_ARGUMENT,
            MASM_ERROR_MEMORY,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_symbol_names_are_nul_terminated() {
        for sym in [
            SYM_CREATE_INTERPRETER,
            SYM_DESTROY_INTERPRETER,
            SYM_LOAD_BYTECODE,
            SYM_EXECUTE,
            SYM_GET_REGISTER,
            SYM_READ_RAM_INT,
            SYM_WRITE_RAM_INT,
            SYM_GET_LAST_ERROR,
            SYM_SET_DEBUG_MODE,
            SYM_GET_INSTRUCTION_POINTER,
            SYM_GET_REGISTER_COUNT,
        ] {
            assert_eq!(sym.last(), Some(&0));
            assert!(sym.starts_with(b"masm_"));
        }
    }
}
