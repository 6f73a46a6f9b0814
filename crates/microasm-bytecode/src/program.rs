//! Loaded artifact: header plus code and data segments

use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{BytecodeError, Result};
use crate::header::Header;
use crate::instruction::{DecodedInstruction, Instruction};

/// A complete MicroASM program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Artifact header
    pub header: Header,
    /// Code segment
    pub code: Vec<u8>,
    /// Data segment, copied into RAM at the data base on load
    pub data: Vec<u8>,
}

impl Program {
    /// Create a program from raw segments
    pub fn new(code: Vec<u8>, data: Vec<u8>, entry_point: u32) -> Result<Self> {
        let code_size =
            u32::try_from(code.len()).map_err(|_| BytecodeError::SegmentTooLarge("code"))?;
        let data_size =
            u32::try_from(data.len()).map_err(|_| BytecodeError::SegmentTooLarge("data"))?;
        let header = Header::new(code_size, data_size, entry_point);
        if code_size > 0 && entry_point >= code_size {
            return Err(BytecodeError::EntryPointOutOfRange {
                entry: entry_point,
                code_size,
            });
        }
        Ok(Self { header, code, data })
    }

    /// Parse an artifact from memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(bytes)?;
        let body = &bytes[Header::SIZE..];

        let code_len = header.code_size as usize;
        if body.len() < code_len {
            return Err(BytecodeError::TruncatedSegment {
                segment: "code",
                expected: code_len,
                actual: body.len(),
            });
        }
        let (code, rest) = body.split_at(code_len);

        let data_len = header.data_size as usize;
        if rest.len() < data_len {
            return Err(BytecodeError::TruncatedSegment {
                segment: "data",
                expected: data_len,
                actual: rest.len(),
            });
        }
        let (data, trailing) = rest.split_at(data_len);

        if !trailing.is_empty() {
            warn!(
                extra = trailing.len(),
                "Extra data found after code and data segments"
            );
        }

        Ok(Self {
            header,
            code: code.to_vec(),
            data: data.to_vec(),
        })
    }

    /// Read and parse an artifact file
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Encode the artifact
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Header::SIZE + self.code.len() + self.data.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.code);
        out.extend_from_slice(&self.data);
        out
    }

    /// Write the encoded artifact to a file
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_bytes())?;
        Ok(())
    }

    /// Entry point as a code offset
    pub fn entry_point(&self) -> usize {
        self.header.entry_point as usize
    }

    /// Decode the code segment linearly from offset 0
    ///
    /// Stops at the first malformed instruction and reports its offset.
    pub fn disassemble(&self) -> Result<Vec<DecodedInstruction>> {
        let mut listing = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let (inst, next) = Instruction::decode(&self.code, offset)?;
            listing.push(DecodedInstruction::new(offset, &inst));
            offset = next;
        }
        Ok(listing)
    }
}
