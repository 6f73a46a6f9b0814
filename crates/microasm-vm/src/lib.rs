//! # MicroASM VM
//!
//! The interpreter behind the MicroASM C ABI. A [`Machine`] owns a register
//! file, a RAM image of caller-chosen size and at most one loaded program, and
//! moves through a fixed lifecycle:
//!
//! ```text
//! Created --load--> Loaded --execute--> Executed | Faulted
//! ```
//!
//! A failed load leaves the machine `Created`; execution runs exactly once per
//! load and a fault leaves registers and RAM as they were at the faulting
//! instruction.
//!
//! ```
//! use microasm_bytecode::{Opcode, Operand, ProgramBuilder, reg};
//! use microasm_vm::{Machine, MachineConfig};
//!
//! let mut b = ProgramBuilder::new();
//! b.emit(Opcode::Mov, &[Operand::reg(reg::RAX), Operand::imm(40)])
//!     .emit(Opcode::Add, &[Operand::reg(reg::RAX), Operand::imm(2)])
//!     .emit(Opcode::Hlt, &[]);
//!
//! let mut vm = Machine::new(MachineConfig::default()).unwrap();
//! vm.load_program(b.finish().unwrap()).unwrap();
//! vm.execute(&[] as &[&str]).unwrap();
//! assert_eq!(vm.register(0).unwrap(), 42);
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

mod console;
mod error;
mod exec;
mod heap;
mod machine;
mod memory;
mod native;

pub use console::{BufferConsole, Console, Port, StdConsole};
pub use error::{Fault, FaultKind, VmError, VmResult};
pub use machine::{Machine, MachineConfig, State};
pub use memory::{MemoryError, Ram};
pub use native::{NativeCall, NativeFn, NativeResult};

/// Default RAM size in bytes (64 KiB)
pub const DEFAULT_RAM_SIZE: usize = 65536;
