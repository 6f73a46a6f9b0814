//! First-fit block allocator over the RAM below the data segment

use microasm_bytecode::WORD_SIZE;
use std::collections::BTreeMap;

/// Bookkeeping for `MALLOC`/`FREE`
///
/// Blocks live in `[start, end)` of the RAM image. Sizes are rounded up to a
/// whole number of words so every block is word aligned.
#[derive(Debug, Clone)]
pub(crate) struct Heap {
    start: usize,
    end: usize,
    /// Live blocks keyed by address, value is the rounded size
    blocks: BTreeMap<usize, usize>,
}

impl Heap {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
            blocks: BTreeMap::new(),
        }
    }

    /// Reserve `size` bytes, `None` when no gap is large enough
    pub(crate) fn allocate(&mut self, size: usize) -> Option<usize> {
        let size = size.checked_next_multiple_of(WORD_SIZE)?;
        let mut cursor = self.start;
        let mut found = None;
        for (&addr, &len) in &self.blocks {
            if addr - cursor >= size {
                found = Some(cursor);
                break;
            }
            cursor = addr + len;
        }
        let addr = match found {
            Some(addr) => addr,
            None if self.end - cursor >= size => cursor,
            None => return None,
        };
        self.blocks.insert(addr, size);
        Some(addr)
    }

    /// Release the block starting at `addr`; false if there is none
    pub(crate) fn free(&mut self, addr: usize) -> bool {
        self.blocks.remove(&addr).is_some()
    }

    /// Bytes held by live blocks
    pub(crate) fn in_use(&self) -> usize {
        self.blocks.values().sum()
    }
}
