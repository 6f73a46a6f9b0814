//! VM error types

use microasm_bytecode::{BytecodeError, Opcode};
use thiserror::Error;

use crate::machine::State;
use crate::memory::MemoryError;

/// Result type alias for VM operations
pub type VmResult<T> = Result<T, VmError>;

/// Errors returned by [`Machine`](crate::Machine) operations
#[derive(Debug, Error)]
pub enum VmError {
    /// RAM size is zero or unrepresentable
    #[error("RAM size must be positive, got {0}")]
    InvalidRamSize(i64),

    /// The RAM image could not be allocated
    #[error("Failed to allocate {size} bytes of RAM: {source}")]
    Allocation {
        /// Requested RAM size in bytes
        size: usize,
        /// Allocator error
        source: std::collections::TryReserveError,
    },

    /// Reading or validating the artifact failed
    #[error("Failed to load bytecode: {0}")]
    Load(#[from] BytecodeError),

    /// Data segment does not fit above the data base
    #[error(
        "RAM size ({ram_size}) too small for data segment (size {data_size} at base {base})"
    )]
    DataSegmentTooLarge {
        /// RAM size in bytes
        ram_size: usize,
        /// Data segment size in bytes
        data_size: usize,
        /// Data base address
        base: usize,
    },

    /// Operation not permitted in the current lifecycle state
    #[error("{operation} is not permitted: {reason}")]
    InvalidState {
        /// Rejected operation
        operation: &'static str,
        /// Why it was rejected
        reason: &'static str,
        /// State at the time of the call
        state: State,
    },

    /// Register index outside the register file
    #[error("Register index {index} out of bounds (0-{max})")]
    RegisterIndex {
        /// Requested index
        index: i64,
        /// Highest valid index
        max: usize,
    },

    /// Host RAM access out of bounds
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Runtime fault during execution
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl VmError {
    /// Whether this is a runtime fault raised by the executing program
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

/// Runtime fault with the location of the faulting instruction
#[derive(Debug, Error)]
#[error("Runtime error at bytecode offset {offset}{}: {kind}", format_opcode(.opcode))]
pub struct Fault {
    /// Code offset of the faulting instruction
    pub offset: usize,
    /// Opcode, when it could be decoded
    pub opcode: Option<Opcode>,
    /// What went wrong
    pub kind: FaultKind,
}

fn format_opcode(opcode: &Option<Opcode>) -> String {
    match opcode {
        Some(op) => format!(" ({})", op),
        None => String::new(),
    }
}

/// Kinds of runtime fault
#[derive(Debug, Error)]
pub enum FaultKind {
    /// Instruction could not be decoded
    #[error("{0}")]
    Decode(#[from] BytecodeError),

    /// Integer division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Register index outside the register file
    #[error("Invalid register index encountered: {0}")]
    InvalidRegister(i32),

    /// Operand type not accepted in this position
    #[error("Expected {expected} operand, got {found}")]
    InvalidOperand {
        /// What the instruction accepts
        expected: &'static str,
        /// What was encoded
        found: &'static str,
    },

    /// Branch target outside the code segment
    #[error("Jump target {0} is outside the code segment")]
    JumpOutOfRange(i32),

    /// RAM access out of bounds
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// Negative length for a block operation
    #[error("Length cannot be negative: {0}")]
    NegativeLength(i32),

    /// Pop or return with an empty stack
    #[error("Stack underflow")]
    StackUnderflow,

    /// Push below address zero
    #[error("Stack overflow")]
    StackOverflow,

    /// Output to a port other than 1 (stdout) or 2 (stderr)
    #[error("Invalid output port: {0}")]
    InvalidPort(i32),

    /// `GETARG` index outside the script arguments
    #[error("GETARG index out of bounds: {0}")]
    ArgumentIndex(i32),

    /// `MALLOC` with a size that is zero or negative
    #[error("Invalid allocation size: {0}")]
    AllocationSize(i32),

    /// `FREE` of an address that is not the start of a live block
    #[error("Invalid pointer passed to FREE: {0}")]
    InvalidFree(i32),

    /// `MNI` naming a function that is not registered
    #[error("Unknown native function: {0}")]
    UnknownNative(String),

    /// A native function reported an error
    #[error("Native function {name} failed: {message}")]
    Native {
        /// Registered name, `Module.Function`
        name: String,
        /// What went wrong
        message: String,
    },

    /// Writing to the console failed
    #[error("Console I/O failed: {0}")]
    Console(#[from] std::io::Error),
}
