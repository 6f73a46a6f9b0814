//! Fixed artifact header

use serde::{Deserialize, Serialize};

use crate::error::{BytecodeError, Result};
use crate::{BYTECODE_MAGIC, BYTECODE_VERSION};

/// Artifact header, stored little-endian at offset 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Must equal [`BYTECODE_MAGIC`]
    pub magic: u32,
    /// Format version
    pub version: u16,
    /// Reserved, written as zero
    pub reserved: u16,
    /// Size of the code segment in bytes
    pub code_size: u32,
    /// Size of the data segment in bytes
    pub data_size: u32,
    /// Offset of the first instruction within the code segment
    pub entry_point: u32,
}

impl Header {
    /// Encoded size of the header in bytes
    pub const SIZE: usize = 20;

    /// Create a header for segments of the given sizes
    pub fn new(code_size: u32, data_size: u32, entry_point: u32) -> Self {
        Self {
            magic: BYTECODE_MAGIC,
            version: BYTECODE_VERSION,
            reserved: 0,
            code_size,
            data_size,
            entry_point,
        }
    }

    /// Decode and validate a header from the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(BytecodeError::TruncatedHeader(bytes.len()));
        }

        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);

        let header = Self {
            magic: u32_at(0),
            version: u16_at(4),
            reserved: u16_at(6),
            code_size: u32_at(8),
            data_size: u32_at(12),
            entry_point: u32_at(16),
        };

        if header.magic != BYTECODE_MAGIC {
            return Err(BytecodeError::InvalidMagic(header.magic));
        }
        if header.version != BYTECODE_VERSION {
            return Err(BytecodeError::UnsupportedVersion(header.version));
        }
        // An empty code segment may still declare entry point 0
        if header.code_size > 0 && header.entry_point >= header.code_size {
            return Err(BytecodeError::EntryPointOutOfRange {
                entry: header.entry_point,
                code_size: header.code_size,
            });
        }

        Ok(header)
    }

    /// Encode the header
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        out[8..12].copy_from_slice(&self.code_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.data_size.to_le_bytes());
        out[16..20].copy_from_slice(&self.entry_point.to_le_bytes());
        out
    }
}
