//! MiniVSFS is a tiny, flat file system image format: one root directory,
//! regular files only, 4 KiB blocks and 12 direct pointers per inode.
//! This crate builds fresh images and appends host files to existing ones.
//!
//! MiniVSFS image's linear layout:
//! - Superblock (block 0)
//! - Inode Bitmap (1 block)
//! - Data Bitmap (1 block)
//! - Inode Table (ceil(inode_count * 128 / 4096) blocks)
//! - Data Region (the rest, first block holds the root directory)
//!
//! Layers (from bottom to top):
//! 1. Block Device: whole-block access to an image in memory or in a file.
//! 2. Structs/Checksum: on-disk records and their CRC-32/XOR checksums.
//! 3. Superblock/Bitmap/Inode: region layout, allocation and the inode table.
//! 4. Directory/Path/File: root directory slots, name rules, file content.
//! 5. Image: the decoded image and its one mutation, adding a file.
//! 6. Builder/Appender: path-level entry points used by `mkfs_minivsfs`.

mod config;
mod error;
mod checksum;
mod block_dev;
mod structs;
mod bitmap;
mod superblock;
mod inode;
mod directory;
mod path;
mod file;
mod fs;
mod builder;
mod appender;

pub use block_dev::{BlockDevice, FileDisk, MemDisk, replace_atomically};
pub use bitmap::Bitmap;
pub use checksum::crc32;
pub use config::*;
pub use superblock::*;
pub use structs::*;
pub use inode::*;
pub use path::*;
pub use directory::*;
pub use file::*;
pub use fs::*;
pub use builder::*;
pub use appender::*;
pub use error::FsError as Error;
pub use error::Result;
