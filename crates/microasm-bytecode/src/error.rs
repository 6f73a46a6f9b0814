//! Bytecode errors

use thiserror::Error;

use crate::opcode::Opcode;

/// Errors that can occur while reading, decoding or building bytecode
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Artifact shorter than the fixed header
    #[error("Artifact too short for header: {0} bytes")]
    TruncatedHeader(usize),

    /// Invalid magic number
    #[error("Invalid magic number 0x{0:08X}, not a MASM binary")]
    InvalidMagic(u32),

    /// Unsupported format version
    #[error("Unsupported bytecode version: {0}")]
    UnsupportedVersion(u16),

    /// A segment is shorter than the header declares
    #[error("Truncated {segment} segment: expected {expected} bytes, found {actual}")]
    TruncatedSegment {
        /// Segment name ("code" or "data")
        segment: &'static str,
        /// Size declared in the header
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Entry point outside a non-empty code segment
    #[error("Entry point {entry} is outside the code segment (size {code_size})")]
    EntryPointOutOfRange {
        /// Declared entry point
        entry: u32,
        /// Code segment size
        code_size: u32,
    },

    /// Unknown opcode byte
    #[error("Invalid opcode 0x{opcode:02X} at offset {offset}")]
    InvalidOpcode {
        /// Raw opcode byte
        opcode: u8,
        /// Code offset of the opcode
        offset: usize,
    },

    /// Assembler-only opcode found in the code segment
    #[error("Pseudo-instruction {opcode:?} cannot be executed (offset {offset})")]
    PseudoInstruction {
        /// The pseudo opcode
        opcode: Opcode,
        /// Code offset of the opcode
        offset: usize,
    },

    /// Unknown operand type byte
    #[error("Invalid operand type {ty} at offset {offset}")]
    InvalidOperandType {
        /// Raw type byte
        ty: u8,
        /// Code offset of the type byte
        offset: usize,
    },

    /// Instruction runs past the end of the code segment
    #[error("Unexpected end of bytecode at offset {offset}")]
    UnexpectedEnd {
        /// Offset where more bytes were expected
        offset: usize,
    },

    /// Wrong number of operands handed to the builder
    #[error("{opcode:?} takes {expected} operand(s), got {actual}")]
    ArityMismatch {
        /// Opcode being emitted
        opcode: Opcode,
        /// Operands the opcode takes
        expected: usize,
        /// Operands supplied
        actual: usize,
    },

    /// Label referenced but never bound
    #[error("Label {0} was never bound")]
    UnboundLabel(usize),

    /// Segment larger than the format can describe
    #[error("{0} segment exceeds 4 GiB")]
    SegmentTooLarge(&'static str),

    /// IO error while reading or writing an artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
