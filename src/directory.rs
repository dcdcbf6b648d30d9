//! The root directory: exactly one data block of fixed-size entries.
//! Entries 0 and 1 are always `.` and `..`; the rest are free (inode 0) or
//! name one regular file.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::*;

pub fn trim_zero(name: &[u8]) -> &[u8] {
    let end = name.iter().position(|&c| c == 0).unwrap_or(name.len());
    &name[..end]
}

fn name_cmp(n1: &[u8], n2: &[u8]) -> bool {
    trim_zero(n1) == trim_zero(n2)
}

impl DirEntry {
    pub fn is_free(&self) -> bool {
        self.inode_id == 0
    }

    pub fn name_bytes(&self) -> &[u8] {
        trim_zero(&self.name)
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        name_cmp(&self.name, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDir {
    entries: Vec<DirEntry>,
}

impl RootDir {
    /// A fresh root block: `.` and `..` pointing at the root inode, all
    /// other slots zeroed.
    pub fn new() -> Self {
        let mut entries = vec![DirEntry::NULL; NUM_ENTRY_PER_BLOCK];
        entries[0] = DirEntry::new(ROOT_INODE_ID, FileType::Directory, DOT_NAME);
        entries[1] = DirEntry::new(ROOT_INODE_ID, FileType::Directory, DOTDOT_NAME);
        Self { entries }
    }

    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Self {
        let entries = block
            .chunks_exact(DIR_ENTRY_SIZE)
            .map(|chunk| {
                let mut record = [0u8; DIR_ENTRY_SIZE];
                record.copy_from_slice(chunk);
                DirEntry::decode(&record)
            })
            .collect();
        Self { entries }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        for (chunk, entry) in block.chunks_exact_mut(DIR_ENTRY_SIZE).zip(&self.entries) {
            chunk.copy_from_slice(&entry.encode());
        }
        block
    }

    /// Every slot, free ones included.
    pub fn slots(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Slots in use, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_free())
    }

    pub fn lookup(&self, name: &[u8]) -> Option<&DirEntry> {
        self.entries().find(|e| e.name_eq(name))
    }

    /// First free slot after `.` and `..`.
    pub fn find_free_slot(&self) -> Option<usize> {
        (RESERVED_DIR_ENTRIES..self.entries.len()).find(|&i| self.entries[i].is_free())
    }

    /// Places a finalized entry in the first free slot.
    /// Returns the slot index.
    pub fn insert(&mut self, entry: DirEntry) -> Result<usize> {
        let slot = self.find_free_slot().ok_or(FsError::DirectoryFull {
            capacity: NUM_ENTRY_PER_BLOCK,
        })?;
        self.entries[slot] = entry;
        Ok(slot)
    }

    /// Checks `.` and `..` are the first two slots, point at the root and
    /// carry valid checksums.
    pub fn has_dot_entries(&self) -> bool {
        match self.entries.get(0..RESERVED_DIR_ENTRIES) {
            Some([dot, dotdot]) => {
                dot.verify()
                    && dotdot.verify()
                    && dot.inode_id == ROOT_INODE_ID
                    && dot.name_eq(DOT_NAME)
                    && dotdot.inode_id == ROOT_INODE_ID
                    && dotdot.name_eq(DOTDOT_NAME)
            }
            _ => false,
        }
    }
}

impl Default for RootDir {
    fn default() -> Self {
        Self::new()
    }
}
