//! Entry-point table for the interpreter library

use libloading::Library;
use microasm_sys::*;
use std::ffi::CStr;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{MasmError, MasmResult};

/// The resolved `masm_*` entry points
///
/// Function pointers resolved from a shared library stay valid for as long
/// as the table lives, since the table keeps the library open.
pub struct Bindings {
    pub(crate) create: masm_create_interpreter_fn,
    pub(crate) destroy: masm_destroy_interpreter_fn,
    pub(crate) load_bytecode: masm_load_bytecode_fn,
    pub(crate) execute: masm_execute_fn,
    pub(crate) get_register: masm_get_register_fn,
    pub(crate) read_ram_int: masm_read_ram_int_fn,
    pub(crate) write_ram_int: masm_write_ram_int_fn,
    pub(crate) get_last_error: masm_get_last_error_fn,
    pub(crate) set_debug_mode: masm_set_debug_mode_fn,
    pub(crate) get_instruction_pointer: masm_get_instruction_pointer_fn,
    pub(crate) get_register_count: masm_get_register_count_fn,
    library: Option<Library>,
}

/// Resolve one symbol to a copied function pointer
fn symbol<T: Copy>(library: &Library, name: &'static [u8]) -> MasmResult<T> {
    // SAFETY: T is the declared C signature of `name` in microasm-sys
    match unsafe { library.get::<T>(name) } {
        Ok(sym) => Ok(*sym),
        Err(source) => Err(MasmError::MissingEntryPoint {
            symbol: symbol_name(name),
            source,
        }),
    }
}

fn symbol_name(name: &'static [u8]) -> &'static str {
    CStr::from_bytes_with_nul(name)
        .ok()
        .and_then(|s| s.to_str().ok())
        .unwrap_or("<invalid symbol>")
}

impl Bindings {
    /// Open a shared library and resolve every entry point
    ///
    /// Fails with a binding error, before any interpreter call is made, when
    /// the library or one of its exports is missing.
    pub fn load(path: impl AsRef<Path>) -> MasmResult<Self> {
        let path = path.as_ref();
        // SAFETY: loading runs the library's initializers; the caller chose the path
        let library = unsafe { Library::new(path) }.map_err(|source| MasmError::LibraryNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let bindings = Self {
            create: symbol(&library, SYM_CREATE_INTERPRETER)?,
            destroy: symbol(&library, SYM_DESTROY_INTERPRETER)?,
            load_bytecode: symbol(&library, SYM_LOAD_BYTECODE)?,
            execute: symbol(&library, SYM_EXECUTE)?,
            get_register: symbol(&library, SYM_GET_REGISTER)?,
            read_ram_int: symbol(&library, SYM_READ_RAM_INT)?,
            write_ram_int: symbol(&library, SYM_WRITE_RAM_INT)?,
            get_last_error: symbol(&library, SYM_GET_LAST_ERROR)?,
            set_debug_mode: symbol(&library, SYM_SET_DEBUG_MODE)?,
            get_instruction_pointer: symbol(&library, SYM_GET_INSTRUCTION_POINTER)?,
            get_register_count: symbol(&library, SYM_GET_REGISTER_COUNT)?,
            library: Some(library),
        };
        debug!(path = %path.display(), "Bound interpreter library");
        Ok(bindings)
    }

    /// Entry points of the runtime linked into this binary
    #[cfg(feature = "linked")]
    pub fn linked() -> Self {
        use microasm_capi as capi;

        Self {
            create: capi::masm_create_interpreter,
            destroy: capi::masm_destroy_interpreter,
            load_bytecode: capi::masm_load_bytecode,
            execute: capi::masm_execute,
            get_register: capi::masm_get_register,
            read_ram_int: capi::masm_read_ram_int,
            write_ram_int: capi::masm_write_ram_int,
            get_last_error: capi::masm_get_last_error,
            set_debug_mode: capi::masm_set_debug_mode,
            get_instruction_pointer: capi::masm_get_instruction_pointer,
            get_register_count: capi::masm_get_register_count,
            library: None,
        }
    }

    /// Whether the entry points come from a dynamically opened library
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    /// The runtime's last error on this thread, if it has recorded one
    pub fn last_error(&self) -> Option<String> {
        // SAFETY: returns null or a NUL-terminated string owned by the runtime
        unsafe {
            let ptr = (self.get_last_error)();
            if ptr.is_null() {
                None
            } else {
                Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
            }
        }
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("dynamic", &self.is_dynamic())
            .finish_non_exhaustive()
    }
}
