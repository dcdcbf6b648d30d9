use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};

pub trait BlockDevice {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> u64;

    /// Reads a block of data from the block device.
    fn read_block(&self, block_id: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes a block of data to the block device.
    fn write_block(&mut self, block_id: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Flushes any buffered data to the backing store.
    fn flush(&mut self) -> Result<()>;
}

/// A whole image held in memory.
///
/// Images are loaded with one read and written back with one atomic
/// replace, so nothing outside ever sees a half-updated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemDisk {
    data: Vec<u8>,
}

impl MemDisk {
    /// Creates a zero-filled disk of `num_blocks` blocks.
    pub fn new(num_blocks: u64) -> Self {
        Self {
            data: vec![0u8; num_blocks as usize * BLOCK_SIZE],
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        debug!(path = %path.display(), bytes = data.len(), "loaded image");
        Ok(Self { data })
    }

    pub fn len_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Writes the whole disk to `path`, replacing any previous file in one
    /// step.
    pub fn persist(&self, path: &Path) -> Result<()> {
        replace_atomically(path, |temp| {
            let mut file = File::create(temp)?;
            file.write_all(&self.data)?;
            file.sync_all()?;
            Ok(())
        })?;
        debug!(path = %path.display(), bytes = self.data.len(), "persisted image");
        Ok(())
    }

    fn range(&self, block_id: u64) -> Result<core::ops::Range<usize>> {
        if block_id >= self.num_blocks() {
            return Err(FsError::InvalidImage(format!(
                "block {} out of range, image has {} blocks",
                block_id,
                self.num_blocks()
            )));
        }
        let start = block_id as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}

/// Produces `path` through `write`, which fills a sibling temporary file.
/// The temporary file is renamed over `path` only when `write` succeeds and
/// is removed otherwise, so `path` is never seen half written.
pub fn replace_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let temp_path = temp_path_for(path);
    let written = write(&temp_path).and_then(|()| fs::rename(&temp_path, path).map_err(FsError::from));
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// A disk backed directly by a file, for images too large to stage in memory.
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    num_blocks: u64,
}

impl FileDisk {
    /// Creates `path` as a zero-filled disk of `num_blocks` blocks. The zeros
    /// are not written; the file is extended and left sparse where the file
    /// system allows it.
    pub fn create(path: &Path, num_blocks: u64) -> Result<Self> {
        let len = num_blocks
            .checked_mul(BLOCK_SIZE as u64)
            .filter(|&len| len <= i64::MAX as u64)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("image of {} blocks exceeds the largest possible file", num_blocks),
                )
            })?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        debug!(path = %path.display(), num_blocks, "created file disk");
        Ok(Self { file, num_blocks })
    }

    fn seek_to(&self, block_id: u64) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(FsError::InvalidImage(format!(
                "block {} out of range, image has {} blocks",
                block_id, self.num_blocks
            )));
        }
        (&self.file).seek(SeekFrom::Start(block_id * BLOCK_SIZE as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    fn read_block(&self, block_id: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        self.seek_to(block_id)?;
        (&self.file).read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, block_id: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.seek_to(block_id)?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

impl BlockDevice for MemDisk {
    fn num_blocks(&self) -> u64 {
        (self.data.len() / BLOCK_SIZE) as u64
    }

    fn read_block(&self, block_id: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        let range = self.range(block_id)?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_block(&mut self, block_id: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        let range = self.range(block_id)?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // Nothing is buffered beyond the vector itself.
        Ok(())
    }
}
