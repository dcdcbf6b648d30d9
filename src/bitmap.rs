//! Management of the inode bitmap and the data bitmap.
//! Each bitmap is one block, packed LSB-first: bit `i` lives in byte `i / 8`
//! at position `i % 8`. A set bit means allocated.
//! Inode bitmap bit `i` tracks inode `i + 1`; data bitmap bit `i` tracks data
//! region block `i`.

use crate::config::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Box<[u8; BLOCK_SIZE]>,
    capacity: u64, // Number of meaningful bits; bits past it are never handed out
}

impl Bitmap {
    pub fn new(capacity: u64) -> Self {
        Self::from_block([0u8; BLOCK_SIZE], capacity)
    }

    pub fn from_block(block: [u8; BLOCK_SIZE], capacity: u64) -> Self {
        Self {
            bits: Box::new(block),
            capacity: capacity.min(BITS_PER_BLOCK),
        }
    }

    pub fn as_block(&self) -> &[u8; BLOCK_SIZE] {
        &self.bits
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn is_used(&self, index: u64) -> bool {
        if index >= self.capacity {
            return false;
        }
        self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    /// Linear first-fit scan; the lowest clear bit wins.
    pub fn find_first_free(&self) -> Option<u64> {
        for (j, &byte) in self.bits.iter().enumerate() {
            if byte == 0xFF {
                continue;
            }
            for k in 0..8 {
                let index = j as u64 * 8 + k;
                if index >= self.capacity {
                    return None;
                }
                if byte & (1 << k) == 0 {
                    return Some(index);
                }
            }
        }
        None
    }

    /// Sets a bit. The caller must have seen it clear; there is a single writer.
    pub fn mark_used(&mut self, index: u64) {
        debug_assert!(index < self.capacity, "bit {} out of range", index);
        debug_assert!(!self.is_used(index), "bit {} already set", index);
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
    }

    /// Finds and claims the first free bit.
    pub fn alloc(&mut self) -> Option<u64> {
        let index = self.find_first_free()?;
        self.mark_used(index);
        Some(index)
    }

    pub fn count_used(&self) -> u64 {
        (0..self.capacity).filter(|&i| self.is_used(i)).count() as u64
    }

    pub fn count_free(&self) -> u64 {
        self.capacity - self.count_used()
    }
}
