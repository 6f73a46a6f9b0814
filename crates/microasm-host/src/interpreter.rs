//! RAII owner of one interpreter handle

use microasm_sys::{MasmInterpreter, MasmInterpreterHandle, MasmResult as RawResult};
use std::ffi::{CString, c_char, c_int};
use std::marker::PhantomData;
use std::path::Path;
use std::ptr::{self, NonNull};
use tracing::debug;

use crate::bindings::Bindings;
use crate::error::{ErrorKind, MasmError, MasmResult};

/// One live interpreter instance
///
/// The handle is created in [`Interpreter::new`] and destroyed exactly once
/// when the value is dropped, on every exit path.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync`. The runtime does no internal locking
/// and keeps its last error per thread.
///
/// ```compile_fail
/// use microasm_host::{Bindings, Interpreter};
///
/// let bindings = Bindings::linked();
/// let interp = Interpreter::new(&bindings, 1024, false).unwrap();
/// std::thread::scope(|s| {
///     s.spawn(move || drop(interp));
/// });
/// ```
pub struct Interpreter<'b> {
    bindings: &'b Bindings,
    handle: NonNull<MasmInterpreter>,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

fn invalid_argument(message: impl Into<String>) -> MasmError {
    MasmError::call(ErrorKind::InvalidArgument, Some(message.into()))
}

fn c_int_arg(value: impl TryInto<c_int>, what: &str) -> MasmResult<c_int> {
    value
        .try_into()
        .map_err(|_| invalid_argument(format!("{what} does not fit in a C int")))
}

impl<'b> Interpreter<'b> {
    /// Create an interpreter with `ram_size` bytes of RAM
    pub fn new(bindings: &'b Bindings, ram_size: usize, debug: bool) -> MasmResult<Self> {
        let ram = c_int_arg(ram_size, "RAM size")?;
        // SAFETY: plain integer arguments
        let raw = unsafe { (bindings.create)(ram, c_int::from(debug)) };
        let handle = NonNull::new(raw)
            .ok_or_else(|| MasmError::call(ErrorKind::General, bindings.last_error()))?;
        // Rebind: tracing's macro expansion imports `field::debug`, shadowing the parameter
        let debug_mode = debug;
        debug!(ram_size, debug = debug_mode, "Interpreter handle acquired");
        Ok(Self {
            bindings,
            handle,
            _not_send: PhantomData,
        })
    }

    /// The raw handle; stays owned by `self`
    pub fn raw(&self) -> MasmInterpreterHandle {
        self.handle.as_ptr()
    }

    /// Map a result code, capturing the error text immediately
    fn check(&self, code: RawResult) -> MasmResult<()> {
        match ErrorKind::from_code(code) {
            None => Ok(()),
            Some(kind) => Err(MasmError::call(kind, self.bindings.last_error())),
        }
    }

    /// Load a bytecode artifact
    ///
    /// After a failure the instance stays usable and the load may be retried.
    pub fn load(&mut self, path: impl AsRef<Path>) -> MasmResult<()> {
        let path = path.as_ref();
        let text = path
            .to_str()
            .ok_or_else(|| invalid_argument(format!("Path is not UTF-8: {}", path.display())))?;
        let c_path = CString::new(text)
            .map_err(|_| invalid_argument(format!("Path contains a NUL byte: {text}")))?;
        // SAFETY: live handle, NUL-terminated path
        let code = unsafe { (self.bindings.load_bytecode)(self.raw(), c_path.as_ptr()) };
        self.check(code)
    }

    /// Run the loaded program
    ///
    /// On a fault the registers and RAM keep their state at the fault point.
    pub fn execute<S: AsRef<str>>(&mut self, args: &[S]) -> MasmResult<()> {
        let owned = args
            .iter()
            .map(|a| CString::new(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid_argument("Script argument contains a NUL byte"))?;
        let argv: Vec<*const c_char> = owned.iter().map(|a| a.as_ptr()).collect();
        let argc = c_int_arg(argv.len(), "Argument count")?;
        let argv_ptr = if argv.is_empty() {
            ptr::null()
        } else {
            argv.as_ptr()
        };
        // SAFETY: argv holds argc valid strings that outlive the call
        let code = unsafe { (self.bindings.execute)(self.raw(), argc, argv_ptr) };
        self.check(code)
    }

    /// Value of register `index`
    pub fn register(&self, index: usize) -> MasmResult<i32> {
        // Oversized indices still reach the runtime, which rejects them
        let index = c_int::try_from(index).unwrap_or(c_int::MAX);
        let mut value = 0;
        // SAFETY: live handle, valid out-pointer
        let code = unsafe { (self.bindings.get_register)(self.raw(), index, &mut value) };
        self.check(code).map(|()| value)
    }

    /// Read the word at `address`
    pub fn read_ram_int(&self, address: i32) -> MasmResult<i32> {
        let mut value = 0;
        // SAFETY: live handle, valid out-pointer
        let code = unsafe { (self.bindings.read_ram_int)(self.raw(), address, &mut value) };
        self.check(code).map(|()| value)
    }

    /// Write the word at `address`
    pub fn write_ram_int(&mut self, address: i32, value: i32) -> MasmResult<()> {
        // SAFETY: live handle
        let code = unsafe { (self.bindings.write_ram_int)(self.raw(), address, value) };
        self.check(code)
    }

    /// Toggle per-instruction tracing
    pub fn set_debug(&mut self, enabled: bool) -> MasmResult<()> {
        // SAFETY: live handle
        let code = unsafe { (self.bindings.set_debug_mode)(self.raw(), c_int::from(enabled)) };
        self.check(code)
    }

    /// Current code offset
    pub fn instruction_pointer(&self) -> MasmResult<usize> {
        let mut value = 0;
        // SAFETY: live handle, valid out-pointer
        let code =
            unsafe { (self.bindings.get_instruction_pointer)(self.raw(), &mut value) };
        self.check(code)?;
        usize::try_from(value).map_err(|_| MasmError::call(ErrorKind::General, None))
    }

    /// Size of the register file
    pub fn register_count(&self) -> MasmResult<usize> {
        let mut value = 0;
        // SAFETY: live handle, valid out-pointer
        let code = unsafe { (self.bindings.get_register_count)(self.raw(), &mut value) };
        self.check(code)?;
        usize::try_from(value).map_err(|_| MasmError::call(ErrorKind::General, None))
    }
}

impl Drop for Interpreter<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle came from create and is released only here
        unsafe { (self.bindings.destroy)(self.handle.as_ptr()) };
        debug!("Interpreter handle released");
    }
}

impl std::fmt::Debug for Interpreter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("handle", &self.handle)
            .finish()
    }
}
