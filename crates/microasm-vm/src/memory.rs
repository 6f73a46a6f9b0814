//! Byte-addressable RAM image with bounds-checked word access

use microasm_bytecode::WORD_SIZE;
use std::collections::TryReserveError;
use thiserror::Error;

/// Out-of-bounds RAM access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Memory access out of bounds at address {address} (length {len}, RAM size {size})")]
pub struct MemoryError {
    /// First byte of the attempted access
    pub address: i64,
    /// Bytes accessed
    pub len: usize,
    /// RAM size in bytes
    pub size: usize,
}

/// The RAM image owned by one machine
#[derive(Debug, Clone)]
pub struct Ram {
    bytes: Vec<u8>,
}

impl Ram {
    /// Allocate `size` zeroed bytes
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn try_new(size: usize) -> Result<Self, TryReserveError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size)?;
        bytes.resize(size, 0);
        Ok(Self { bytes })
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Validate `[address, address + len)` and return it as a range
    fn range(&self, address: i64, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let err = || MemoryError {
            address,
            len,
            size: self.bytes.len(),
        };
        let start = usize::try_from(address).map_err(|_| err())?;
        let end = start.checked_add(len).ok_or_else(err)?;
        if end > self.bytes.len() {
            return Err(err());
        }
        Ok(start..end)
    }

    /// Read a little-endian word
    pub fn read_word(&self, address: i64) -> Result<i32, MemoryError> {
        let r = self.range(address, WORD_SIZE)?;
        let b = &self.bytes[r];
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Write a little-endian word
    pub fn write_word(&mut self, address: i64, value: i32) -> Result<(), MemoryError> {
        let r = self.range(address, WORD_SIZE)?;
        self.bytes[r].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read one byte
    pub fn read_byte(&self, address: i64) -> Result<u8, MemoryError> {
        let r = self.range(address, 1)?;
        Ok(self.bytes[r.start])
    }

    /// Write one byte
    pub fn write_byte(&mut self, address: i64, value: u8) -> Result<(), MemoryError> {
        let r = self.range(address, 1)?;
        self.bytes[r.start] = value;
        Ok(())
    }

    /// Borrow a byte range
    pub fn slice(&self, address: i64, len: usize) -> Result<&[u8], MemoryError> {
        let r = self.range(address, len)?;
        Ok(&self.bytes[r])
    }

    /// Mutably borrow a byte range
    pub fn slice_mut(&mut self, address: i64, len: usize) -> Result<&mut [u8], MemoryError> {
        let r = self.range(address, len)?;
        Ok(&mut self.bytes[r])
    }

    /// Copy `len` bytes from `src` to `dst`; ranges may overlap
    pub fn copy_within(&mut self, src: i64, dst: i64, len: usize) -> Result<(), MemoryError> {
        let from = self.range(src, len)?;
        let to = self.range(dst, len)?;
        self.bytes.copy_within(from, to.start);
        Ok(())
    }

    /// Read a NUL-terminated string starting at `address`
    ///
    /// Running off the end of RAM before the terminator is an error.
    pub fn read_cstr(&self, address: i64) -> Result<&[u8], MemoryError> {
        let start = self.range(address, 0)?.start;
        let tail = &self.bytes[start..];
        match tail.iter().position(|&b| b == 0) {
            Some(end) => Ok(&tail[..end]),
            None => Err(MemoryError {
                address,
                len: tail.len() + 1,
                size: self.bytes.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unallocatable_size_is_an_error() {
        assert!(Ram::try_new(usize::MAX).is_err());
        assert!(Ram::try_new(isize::MAX as usize + 1).is_err());
    }

    #[test]
    fn test_try_new_zeroes() {
        let ram = Ram::try_new(32).unwrap();
        assert_eq!(ram.len(), 32);
        assert!(ram.slice(0, 32).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_word_roundtrip_at_last_valid_address() {
        let mut ram = Ram::try_new(16).unwrap();
        ram.write_word(12, -7).unwrap();
        assert_eq!(ram.read_word(12).unwrap(), -7);
    }

    #[test]
    fn test_word_out_of_bounds() {
        let mut ram = Ram::try_new(16).unwrap();
        assert!(ram.read_word(13).is_err());
        assert!(ram.write_word(-1, 0).is_err());
        assert!(ram.read_word(i64::MAX).is_err());
        let err = ram.write_word(16, 0).unwrap_err();
        assert_eq!(err.size, 16);
        assert_eq!(err.len, 4);
    }

    #[test]
    fn test_words_are_little_endian() {
        let mut ram = Ram::try_new(8).unwrap();
        ram.write_word(0, 0x0403_0201).unwrap();
        assert_eq!(ram.slice(0, 4).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_read_cstr() {
        let mut ram = Ram::try_new(8).unwrap();
        ram.slice_mut(2, 3).unwrap().copy_from_slice(b"ok\0");
        assert_eq!(ram.read_cstr(2).unwrap(), b"ok");
    }

    #[test]
    fn test_unterminated_cstr() {
        let mut ram = Ram::try_new(4).unwrap();
        ram.slice_mut(0, 4).unwrap().copy_from_slice(b"abcd");
        assert!(ram.read_cstr(0).is_err());
    }

    #[test]
    fn test_copy_within_overlapping() {
        let mut ram = Ram::try_new(8).unwrap();
        ram.slice_mut(0, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        ram.copy_within(0, 2, 4).unwrap();
        assert_eq!(ram.slice(0, 6).unwrap(), &[1, 2, 1, 2, 3, 4]);
    }
}
