use std::path::PathBuf;

use thiserror::Error;

/// Every way a format or append can fail.
///
/// All variants are terminal for the operation in progress. The payloads
/// carry the numbers a caller needs to fix the input.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("insufficient capacity: {reason} (need {required} blocks, have {available})")]
    InsufficientCapacity {
        required: u64,
        available: u64,
        reason: &'static str,
    },

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    #[error("file too large: {size} bytes exceeds the direct-pointer limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("no free inode left (image has {inode_count} inodes)")]
    NoFreeInode { inode_count: u64 },

    #[error("no free data blocks: need {needed}, {available} available")]
    NoFreeSpace { needed: u64, available: u64 },

    #[error("root directory is full ({capacity} entries)")]
    DirectoryFull { capacity: usize },

    #[error("file name is {len} bytes, the limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("{0:?} already exists in the root directory")]
    AlreadyExists(String),

    #[error("{0:?} not found in the root directory")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Process exit status for this error kind.
    /// 1 and 2 are left to generic failures and usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            FsError::InsufficientCapacity { .. } => 3,
            FsError::InvalidImage(_) => 4,
            FsError::NotRegularFile(_) => 5,
            FsError::FileTooLarge { .. } => 6,
            FsError::NoFreeInode { .. } => 7,
            FsError::NoFreeSpace { .. } => 8,
            FsError::DirectoryFull { .. } => 9,
            FsError::NameTooLong { .. } => 10,
            FsError::InvalidName(_) => 11,
            FsError::AlreadyExists(_) => 12,
            FsError::NotFound(_) => 13,
            FsError::Io(_) => 14,
        }
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
