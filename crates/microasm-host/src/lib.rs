//! Safe host-side access to a MicroASM interpreter library
//!
//! [`Bindings`] resolves the `masm_*` entry points, either from a shared
//! library at runtime or from the statically linked runtime. An
//! [`Interpreter`] owns one interpreter handle and destroys it when dropped.
//!
//! ```no_run
//! use microasm_host::{Bindings, Interpreter};
//!
//! let bindings = Bindings::load("./libmicroasm_capi.so")?;
//! let mut interp = Interpreter::new(&bindings, 65536, false)?;
//! interp.load("example.bin")?;
//! if let Err(e) = interp.execute(&["arg1", "arg2"]) {
//!     eprintln!("{e}");
//! }
//! println!("R0 = {}", interp.register(0)?);
//! # Ok::<(), microasm_host::MasmError>(())
//! ```

#![warn(missing_docs)]

mod bindings;
mod error;
mod interpreter;

pub use bindings::Bindings;
pub use error::{ErrorKind, MasmError, MasmResult, UNKNOWN_ERROR};
pub use interpreter::Interpreter;
pub use microasm_sys::LIBRARY_NAME;
