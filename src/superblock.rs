//! Layout calculation and superblock persistence.
//!
//! Regions are laid out back to back from block 0:
//! superblock | inode bitmap | data bitmap | inode table | data region.

use tracing::warn;

use crate::checksum;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::{BlockDevice, SuperBlock};

/// Blocks needed to hold `inode_count` inode records.
pub fn inode_table_blocks(inode_count: u64) -> u64 {
    (inode_count * INODE_SIZE as u64).div_ceil(BLOCK_SIZE as u64)
}

/// A contiguous block range of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub start: u64,
    pub blocks: u64,
}

impl Region {
    pub fn end(&self) -> u64 {
        self.start + self.blocks
    }
}

impl SuperBlock {
    /// Computes the layout of a fresh image.
    /// The checksum is left unset; see [`SuperBlock::finalize`].
    pub fn layout(total_blocks: u64, inode_count: u64, now: u64) -> Result<Self> {
        if inode_count == 0 {
            return Err(FsError::InsufficientCapacity {
                required: 1,
                available: 0,
                reason: "inode count must leave room for the root inode",
            });
        }
        if inode_count > BITS_PER_BLOCK {
            return Err(FsError::InsufficientCapacity {
                required: inode_count,
                available: BITS_PER_BLOCK,
                reason: "inode count exceeds what one inode bitmap block can track",
            });
        }

        let table_blocks = inode_table_blocks(inode_count);
        let inode_bitmap_start = SUPERBLOCK_ID + 1;
        let data_bitmap_start = inode_bitmap_start + INODE_BITMAP_BLOCKS;
        let inode_table_start = data_bitmap_start + DATA_BITMAP_BLOCKS;
        let data_region_start = inode_table_start + table_blocks;

        // At least one data block for the root directory.
        let required = data_region_start + 1;
        if total_blocks < required {
            return Err(FsError::InsufficientCapacity {
                required,
                available: total_blocks,
                reason: "image too small for metadata plus the root directory block",
            });
        }
        let data_region_blocks = total_blocks - data_region_start;
        if data_region_blocks > BITS_PER_BLOCK {
            warn!(
                data_region_blocks,
                trackable = BITS_PER_BLOCK,
                "data region is larger than one bitmap block can track"
            );
        }

        Ok(Self {
            magic: MAGIC,
            version: VERSION,
            block_size: BLOCK_SIZE as u32,
            total_blocks,
            inode_count,
            inode_bitmap_start,
            inode_bitmap_blocks: INODE_BITMAP_BLOCKS,
            data_bitmap_start,
            data_bitmap_blocks: DATA_BITMAP_BLOCKS,
            inode_table_start,
            inode_table_blocks: table_blocks,
            data_region_start,
            data_region_blocks,
            root_inode: ROOT_INODE_ID as u64,
            mtime_epoch: now,
            flags: 0,
            checksum: 0,
        })
    }

    /// The five regions in on-disk order.
    pub fn regions(&self) -> [Region; 5] {
        [
            Region { name: "superblock", start: SUPERBLOCK_ID, blocks: 1 },
            Region {
                name: "inode bitmap",
                start: self.inode_bitmap_start,
                blocks: self.inode_bitmap_blocks,
            },
            Region {
                name: "data bitmap",
                start: self.data_bitmap_start,
                blocks: self.data_bitmap_blocks,
            },
            Region {
                name: "inode table",
                start: self.inode_table_start,
                blocks: self.inode_table_blocks,
            },
            Region {
                name: "data region",
                start: self.data_region_start,
                blocks: self.data_region_blocks,
            },
        ]
    }

    /// Number of data blocks the data bitmap can hand out.
    pub fn allocatable_data_blocks(&self) -> u64 {
        self.data_region_blocks.min(BITS_PER_BLOCK * self.data_bitmap_blocks)
    }

    /// Checks a loaded superblock: identity, checksum, then the region
    /// arithmetic must be exactly what [`SuperBlock::layout`] produces.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(FsError::InvalidImage(format!(
                "bad magic {:#010x}, expected {:#010x}",
                self.magic, MAGIC
            )));
        }
        if self.block_size != BLOCK_SIZE as u32 {
            return Err(FsError::InvalidImage(format!(
                "unsupported block size {}, expected {}",
                self.block_size, BLOCK_SIZE
            )));
        }
        if !self.verify() {
            return Err(FsError::InvalidImage("superblock checksum mismatch".to_string()));
        }

        let expected = Self::layout(self.total_blocks, self.inode_count, self.mtime_epoch)
            .map_err(|e| FsError::InvalidImage(format!("inconsistent geometry: {}", e)))?;
        if self.regions() != expected.regions() || self.root_inode != ROOT_INODE_ID as u64 {
            return Err(FsError::InvalidImage(
                "region offsets do not match the recorded capacity and inode count".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn read_superblock(device: &impl BlockDevice) -> Result<SuperBlock> {
    if device.num_blocks() == 0 {
        return Err(FsError::InvalidImage("image is shorter than one block".to_string()));
    }
    let mut buf = Box::new([0u8; BLOCK_SIZE]);
    device.read_block(SUPERBLOCK_ID, &mut buf)?;
    let superblock = SuperBlock::decode(&buf);
    superblock.validate()?;
    // The checksum also covers the padding after the record.
    if !checksum::verify_superblock_block(&buf) {
        return Err(FsError::InvalidImage("superblock checksum mismatch".to_string()));
    }
    Ok(superblock)
}

pub fn write_superblock(device: &mut impl BlockDevice, superblock: &SuperBlock) -> Result<()> {
    device.write_block(SUPERBLOCK_ID, &superblock.encode())
}
