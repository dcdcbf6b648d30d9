//! File content in the data region.

use std::collections::BTreeMap;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, FileType, Inode, SuperBlock};

static ZERO_BLOCK: [u8; BLOCK_SIZE] = [0; BLOCK_SIZE];

/// The data region, block 0 being the root directory.
///
/// Only blocks that were written or held data on load are kept; every other
/// block reads as zeros. A fresh image therefore costs one block of memory
/// however large its data region is.
#[derive(Debug, Clone)]
pub struct DataRegion {
    num_blocks: u64,
    blocks: BTreeMap<u64, Box<[u8; BLOCK_SIZE]>>,
}

impl DataRegion {
    pub fn new(num_blocks: u64) -> Self {
        Self {
            num_blocks,
            blocks: BTreeMap::new(),
        }
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    fn check(&self, block: u64) -> Result<()> {
        if block >= self.num_blocks {
            return Err(FsError::InvalidImage(format!(
                "data block {} out of range, region has {} blocks",
                block, self.num_blocks
            )));
        }
        Ok(())
    }

    pub fn block(&self, block: u64) -> Result<&[u8]> {
        self.check(block)?;
        Ok(self.blocks.get(&block).map_or(&ZERO_BLOCK[..], |b| &b[..]))
    }

    pub fn block_mut(&mut self, block: u64) -> Result<&mut [u8]> {
        self.check(block)?;
        let data = self
            .blocks
            .entry(block)
            .or_insert_with(|| Box::new([0u8; BLOCK_SIZE]));
        Ok(&mut data[..])
    }

    /// Reads the region, keeping only blocks that are not all zeros.
    pub fn read(device: &impl BlockDevice, superblock: &SuperBlock) -> Result<Self> {
        let mut region = Self::new(superblock.data_region_blocks);
        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        for i in 0..superblock.data_region_blocks {
            device.read_block(superblock.data_region_start + i, &mut buf)?;
            if buf.iter().any(|&b| b != 0) {
                region.blocks.insert(i, buf.clone());
            }
        }
        Ok(region)
    }

    /// Writes the blocks held in memory. The device must read as zeros
    /// everywhere else in the region.
    pub fn write(&self, device: &mut impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
        for (&i, data) in &self.blocks {
            device.write_block(superblock.data_region_start + i, data)?;
        }
        Ok(())
    }
}

impl PartialEq for DataRegion {
    /// Compares content; a block held as zeros equals one never written.
    fn eq(&self, other: &Self) -> bool {
        self.num_blocks == other.num_blocks
            && self
                .blocks
                .keys()
                .chain(other.blocks.keys())
                .all(|&b| self.block(b).ok() == other.block(b).ok())
    }
}

impl Eq for DataRegion {}

/// Copies `content` into `blocks` in order. Every block is zeroed first so a
/// short final block never exposes what was there before.
pub fn fwrite(region: &mut DataRegion, blocks: &[u64], content: &[u8]) -> Result<()> {
    debug_assert_eq!(blocks.len() as u64, Inode::blocks_for_size(content.len() as u64));
    for (&block, chunk) in blocks.iter().zip(content.chunks(BLOCK_SIZE)) {
        let dest = region.block_mut(block)?;
        dest.fill(0);
        dest[..chunk.len()].copy_from_slice(chunk);
    }
    Ok(())
}

/// Reads the whole content of a regular file inode.
pub fn fread(region: &DataRegion, inode: &Inode) -> Result<Vec<u8>> {
    if inode.file_type() != Some(FileType::Regular) {
        return Err(FsError::InvalidImage("inode is not a regular file".to_string()));
    }
    let expected = Inode::blocks_for_size(inode.size);
    let blocks: Vec<u64> = inode.data_blocks().collect();
    if blocks.len() as u64 != expected {
        return Err(FsError::InvalidImage(format!(
            "inode of {} bytes references {} blocks, expected {}",
            inode.size,
            blocks.len(),
            expected
        )));
    }

    let mut content = Vec::with_capacity(inode.size as usize);
    let mut remaining = inode.size as usize;
    for block in blocks {
        let take = remaining.min(BLOCK_SIZE);
        content.extend_from_slice(&region.block(block)?[..take]);
        remaining -= take;
    }
    Ok(content)
}
