//! Creating a fresh image file.

use std::path::Path;

use tracing::info;

use crate::block_dev::{FileDisk, replace_atomically};
use crate::config::BLOCK_SIZE;
use crate::error::Result;
use crate::fs::{Image, now_epoch};

/// Knobs for a new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Capacity in KiB; a trailing partial block is dropped.
    pub size_kib: u64,
    pub inode_count: u64,
    /// Stored in the root inode's project field.
    pub project_id: u32,
}

impl FormatOptions {
    pub fn new(size_kib: u64, inode_count: u64) -> Self {
        Self {
            size_kib,
            inode_count,
            project_id: 0,
        }
    }

    pub fn total_blocks(&self) -> u64 {
        self.size_kib.saturating_mul(1024) / BLOCK_SIZE as u64
    }
}

/// Formats a new image of `size_kib` KiB with `inode_count` inodes at `path`,
/// replacing whatever was there.
///
/// Blocks go straight into the destination's temporary file; only the
/// metadata and the root directory block are ever held in memory.
pub fn build(path: &Path, size_kib: u64, inode_count: u64) -> Result<()> {
    build_with(path, &FormatOptions::new(size_kib, inode_count))
}

pub fn build_with(path: &Path, options: &FormatOptions) -> Result<()> {
    let image = Image::format(
        options.total_blocks(),
        options.inode_count,
        options.project_id,
        now_epoch(),
    )?;
    let sb = image.superblock();
    replace_atomically(path, |temp| {
        let mut disk = FileDisk::create(temp, sb.total_blocks)?;
        image.store(&mut disk)
    })?;

    info!(
        path = %path.display(),
        total_blocks = sb.total_blocks,
        inode_count = sb.inode_count,
        data_region_blocks = sb.data_region_blocks,
        "built image"
    );
    Ok(())
}
