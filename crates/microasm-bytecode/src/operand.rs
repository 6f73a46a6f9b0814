//! Typed instruction operands

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::REGISTER_NAMES;

/// Encoded size of one operand: type byte plus `i32` value
pub const OPERAND_SIZE: usize = 5;

/// Operand type tag, the first byte of every encoded operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperandType {
    /// Register index (0-23)
    Register = 0x01,
    /// Integer literal
    Immediate = 0x02,
    /// Absolute code offset resolved by the assembler
    Label = 0x03,
    /// Offset into the data segment
    Data = 0x04,
}

impl OperandType {
    /// Decode a type byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Register),
            0x02 => Some(Self::Immediate),
            0x03 => Some(Self::Label),
            0x04 => Some(Self::Data),
            _ => None,
        }
    }
}

/// A decoded operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// Register index; range is checked at execution time
    Register(i32),
    /// Integer literal
    Immediate(i32),
    /// Absolute code offset
    Label(i32),
    /// Offset into the data segment
    Data(i32),
}

impl Operand {
    /// Register operand
    #[inline]
    pub const fn reg(index: u8) -> Self {
        Self::Register(index as i32)
    }

    /// Immediate operand
    #[inline]
    pub const fn imm(value: i32) -> Self {
        Self::Immediate(value)
    }

    /// Data segment operand
    #[inline]
    pub const fn data(offset: i32) -> Self {
        Self::Data(offset)
    }

    /// Type tag of this operand
    pub fn operand_type(self) -> OperandType {
        match self {
            Self::Register(_) => OperandType::Register,
            Self::Immediate(_) => OperandType::Immediate,
            Self::Label(_) => OperandType::Label,
            Self::Data(_) => OperandType::Data,
        }
    }

    /// Raw encoded value
    pub fn raw_value(self) -> i32 {
        match self {
            Self::Register(v) | Self::Immediate(v) | Self::Label(v) | Self::Data(v) => v,
        }
    }

    /// Build an operand from its type tag and raw value
    pub fn from_parts(ty: OperandType, value: i32) -> Self {
        match ty {
            OperandType::Register => Self::Register(value),
            OperandType::Immediate => Self::Immediate(value),
            OperandType::Label => Self::Label(value),
            OperandType::Data => Self::Data(value),
        }
    }

    /// Append the encoded form to `out`
    pub fn encode(self, out: &mut Vec<u8>) {
        out.push(self.operand_type() as u8);
        out.extend_from_slice(&self.raw_value().to_le_bytes());
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Register(idx) => {
                let name = usize::try_from(idx)
                    .ok()
                    .and_then(|i| REGISTER_NAMES.get(i));
                match name {
                    Some(name) => f.write_str(name),
                    None => write!(f, "R?{}", idx),
                }
            }
            Self::Immediate(v) => write!(f, "{}", v),
            Self::Label(v) => write!(f, "@{:#06x}", v),
            Self::Data(v) => write!(f, "${}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let mut out = Vec::new();
        Operand::imm(-2).encode(&mut out);
        assert_eq!(out, vec![0x02, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(out.len(), OPERAND_SIZE);
    }

    #[test]
    fn test_display() {
        assert_eq!(Operand::reg(0).to_string(), "RAX");
        assert_eq!(Operand::reg(8).to_string(), "R0");
        assert_eq!(Operand::Register(99).to_string(), "R?99");
        assert_eq!(Operand::Label(16).to_string(), "@0x0010");
        assert_eq!(Operand::data(3).to_string(), "$3");
    }

    #[test]
    fn test_serialize_shape() {
        let json = serde_json::to_value(Operand::reg(1)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "register", "value": 1}));
    }
}
