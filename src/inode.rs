//! Management of the inode table.
//! Inode numbers are 1-based: inode `n` is record `n - 1` of the table.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, FileType, Inode, SuperBlock};

impl Inode {
    /// The root directory inode of a fresh image: two links (`.` and `..`),
    /// one block of entries at data region block 0.
    pub fn root(now: u64, proj_id: u32) -> Self {
        let mut inode = Inode {
            mode: FileType::Directory.mode_bits() | DIR_PERM,
            links: 2,
            size: BLOCK_SIZE as u64,
            atime: now,
            mtime: now,
            ctime: now,
            proj_id,
            ..Default::default()
        };
        inode.direct_ptrs[0] = 1;
        inode.finalize();
        inode
    }

    /// A regular file inode over already allocated data region blocks,
    /// given as 0-based indices in allocation order.
    pub fn regular(size: u64, blocks: &[u64], now: u64) -> Self {
        debug_assert!(blocks.len() <= NUM_DIRECT_PTRS);
        let mut inode = Inode {
            mode: FileType::Regular.mode_bits() | FILE_PERM,
            links: 1,
            size,
            atime: now,
            mtime: now,
            ctime: now,
            ..Default::default()
        };
        for (ptr, &block) in inode.direct_ptrs.iter_mut().zip(blocks) {
            *ptr = block as u32 + 1;
        }
        inode.finalize();
        inode
    }

    pub fn file_type(&self) -> Option<FileType> {
        match self.mode & S_IFMT {
            S_IFREG => Some(FileType::Regular),
            S_IFDIR => Some(FileType::Directory),
            _ => None,
        }
    }

    /// Blocks a file of this size occupies.
    pub fn blocks_for_size(size: u64) -> u64 {
        size.div_ceil(BLOCK_SIZE as u64)
    }

    /// 0-based data region blocks referenced by the direct pointers.
    pub fn data_blocks(&self) -> impl Iterator<Item = u64> + '_ {
        self.direct_ptrs
            .iter()
            .filter(|&&p| p != 0)
            .map(|&p| p as u64 - 1)
    }
}

/// Every inode record of the image, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeTable {
    inodes: Vec<Inode>,
}

impl InodeTable {
    pub fn new(inode_count: u64) -> Self {
        Self {
            inodes: vec![Inode::default(); inode_count as usize],
        }
    }

    pub fn len(&self) -> u64 {
        self.inodes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    fn index(&self, inode_id: u32) -> Result<usize> {
        if inode_id == 0 || inode_id as u64 > self.len() {
            return Err(FsError::InvalidImage(format!(
                "inode {} out of range 1..={}",
                inode_id,
                self.len()
            )));
        }
        Ok(inode_id as usize - 1)
    }

    pub fn get(&self, inode_id: u32) -> Result<&Inode> {
        let i = self.index(inode_id)?;
        Ok(&self.inodes[i])
    }

    pub fn get_mut(&mut self, inode_id: u32) -> Result<&mut Inode> {
        let i = self.index(inode_id)?;
        Ok(&mut self.inodes[i])
    }

    pub fn set(&mut self, inode_id: u32, inode: Inode) -> Result<()> {
        *self.get_mut(inode_id)? = inode;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Inode)> {
        self.inodes
            .iter()
            .enumerate()
            .map(|(i, inode)| (i as u32 + 1, inode))
    }

    /// Reads the inode table region described by the superblock.
    pub fn read(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut table = Self::new(superblock.inode_count);
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for (b, chunk) in table.inodes.chunks_mut(INODES_PER_BLOCK).enumerate() {
            device.read_block(superblock.inode_table_start + b as u64, &mut buf)?;
            for (i, inode) in chunk.iter_mut().enumerate() {
                let mut record = [0u8; INODE_SIZE];
                record.copy_from_slice(&buf[i * INODE_SIZE..(i + 1) * INODE_SIZE]);
                *inode = Inode::decode(&record);
            }
        }
        Ok(table)
    }

    /// Writes every inode table block; space past the last record is zero.
    pub fn write(&self, device: &mut impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
        let mut chunks = self.inodes.chunks(INODES_PER_BLOCK);
        for b in 0..superblock.inode_table_blocks {
            let mut buf = Box::new([0u8; BLOCK_SIZE]);
            if let Some(chunk) = chunks.next() {
                for (i, inode) in chunk.iter().enumerate() {
                    buf[i * INODE_SIZE..(i + 1) * INODE_SIZE].copy_from_slice(&inode.encode());
                }
            }
            device.write_block(superblock.inode_table_start + b, &buf)?;
        }
        Ok(())
    }
}
