//! # MicroASM Bytecode
//!
//! This crate defines the `.bin` artifact format consumed by the MicroASM
//! interpreter: a fixed little-endian header followed by a code segment and a
//! data segment.
//!
//! Every operand in the code segment is encoded as one type byte followed by a
//! little-endian `i32`, so instructions have a fixed shape per opcode and can
//! be decoded at any offset.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod builder;
pub mod error;
pub mod header;
pub mod instruction;
pub mod opcode;
pub mod operand;
pub mod program;

pub use builder::{Label, ProgramBuilder};
pub use error::{BytecodeError, Result};
pub use header::Header;
pub use instruction::{DecodedInstruction, Instruction, MAX_OPERANDS};
pub use opcode::Opcode;
pub use operand::{Operand, OperandType};
pub use program::Program;

/// Magic number at the start of every artifact ("MASM" read little-endian)
pub const BYTECODE_MAGIC: u32 = 0x4D53_414D;

/// Bytecode format version
pub const BYTECODE_VERSION: u16 = 1;

/// Number of integer registers in the register file
pub const REGISTER_COUNT: usize = 24;

/// Size in bytes of a RAM word
pub const WORD_SIZE: usize = 4;

/// Register mnemonics, indexed by register number
pub const REGISTER_NAMES: [&str; REGISTER_COUNT] = [
    "RAX", "RBX", "RCX", "RDX", "RSI", "RDI", "RBP", "RSP", "R0", "R1", "R2", "R3", "R4", "R5",
    "R6", "R7", "R8", "R9", "R10", "R11", "R12", "R13", "R14", "R15",
];

/// Well-known register indices
pub mod reg {
    /// Accumulator
    pub const RAX: u8 = 0;
    /// Base register
    pub const RBX: u8 = 1;
    /// Counter register
    pub const RCX: u8 = 2;
    /// Data register
    pub const RDX: u8 = 3;
    /// Source index
    pub const RSI: u8 = 4;
    /// Destination index
    pub const RDI: u8 = 5;
    /// Frame base pointer
    pub const RBP: u8 = 6;
    /// Stack pointer
    pub const RSP: u8 = 7;
    /// First general purpose register (`R0`); `R0..R15` follow contiguously
    pub const R0: u8 = 8;
}
