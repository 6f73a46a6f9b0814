//! Instruction decoding

use serde::Serialize;
use std::fmt;

use crate::error::{BytecodeError, Result};
use crate::opcode::Opcode;
use crate::operand::{OPERAND_SIZE, Operand, OperandType};

/// Largest operand count of any opcode
pub const MAX_OPERANDS: usize = 3;

/// One decoded instruction
///
/// Operands live in a fixed array so the interpreter can decode at the
/// instruction pointer on every step without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The opcode
    pub opcode: Opcode,
    operands: [Operand; MAX_OPERANDS],
    arity: u8,
}

impl Instruction {
    /// Decode the instruction starting at `offset` in `code`
    ///
    /// Returns the instruction and the offset of the byte after it.
    pub fn decode(code: &[u8], offset: usize) -> Result<(Self, usize)> {
        let byte = *code
            .get(offset)
            .ok_or(BytecodeError::UnexpectedEnd { offset })?;
        let opcode =
            Opcode::from_u8(byte).ok_or(BytecodeError::InvalidOpcode { opcode: byte, offset })?;
        let arity = opcode
            .operand_count()
            .ok_or(BytecodeError::PseudoInstruction { opcode, offset })?;

        let mut operands = [Operand::Immediate(0); MAX_OPERANDS];
        let mut cursor = offset + 1;
        for slot in operands.iter_mut().take(arity) {
            let bytes = code
                .get(cursor..cursor + OPERAND_SIZE)
                .ok_or(BytecodeError::UnexpectedEnd { offset: cursor })?;
            let ty = OperandType::from_u8(bytes[0]).ok_or(BytecodeError::InvalidOperandType {
                ty: bytes[0],
                offset: cursor,
            })?;
            let value = i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
            *slot = Operand::from_parts(ty, value);
            cursor += OPERAND_SIZE;
        }

        Ok((
            Self {
                opcode,
                operands,
                arity: arity as u8,
            },
            cursor,
        ))
    }

    /// Build an instruction, checking the operand count
    pub fn new(opcode: Opcode, operands: &[Operand]) -> Result<Self> {
        let expected = opcode
            .operand_count()
            .ok_or(BytecodeError::PseudoInstruction { opcode, offset: 0 })?;
        if operands.len() != expected {
            return Err(BytecodeError::ArityMismatch {
                opcode,
                expected,
                actual: operands.len(),
            });
        }
        let mut slots = [Operand::Immediate(0); MAX_OPERANDS];
        slots[..expected].copy_from_slice(operands);
        Ok(Self {
            opcode,
            operands: slots,
            arity: expected as u8,
        })
    }

    /// The operands actually used by this opcode
    pub fn operands(&self) -> &[Operand] {
        &self.operands[..self.arity as usize]
    }

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        1 + self.arity as usize * OPERAND_SIZE
    }

    /// Append the encoded form to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode as u8);
        for op in self.operands() {
            op.encode(out);
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (i, op) in self.operands().iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, op)?;
        }
        Ok(())
    }
}

/// A disassembled instruction with its location, used for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedInstruction {
    /// Code offset of the opcode byte
    pub offset: usize,
    /// The opcode
    pub opcode: Opcode,
    /// Operands in encoding order
    pub operands: Vec<Operand>,
    /// Human-readable assembly text
    pub text: String,
}

impl DecodedInstruction {
    pub(crate) fn new(offset: usize, instruction: &Instruction) -> Self {
        Self {
            offset,
            opcode: instruction.opcode,
            operands: instruction.operands().to_vec(),
            text: instruction.to_string(),
        }
    }
}
