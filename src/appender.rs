//! Adding one host file to an existing image file.

use std::fs::{self, File};
use std::path::Path;

use tracing::{debug, info};

use crate::config::*;
use crate::error::{FsError, Result};
use crate::fs::{AppendReport, Image, now_epoch};
use crate::{MemDisk, SuperBlock, path};

/// Reads the image at `input`, adds `source` to its root directory and
/// writes the result to `output`.
///
/// The whole image is loaded, changed in memory and written once. On any
/// error `output` is left as it was; `input` is only replaced when it is
/// also the output, and then as a whole.
pub fn append(input: &Path, output: &Path, source: &Path) -> Result<AppendReport> {
    let meta = fs::metadata(source)?;
    if !meta.is_file() {
        return Err(FsError::NotRegularFile(source.to_path_buf()));
    }
    let size = meta.len();
    if size > MAX_FILE_SIZE {
        return Err(FsError::FileTooLarge { size, max: MAX_FILE_SIZE });
    }

    let mut image = load_image(input)?;
    debug!(input = %input.display(), "image validated");

    let name = path::base_name(source)?;
    let file = File::open(source)?;
    let report = image.add_file(name, size, file, now_epoch())?;

    image.to_disk()?.persist(output)?;
    info!(
        name = %report.name,
        inode = report.inode,
        blocks = report.block_count(),
        output = %output.display(),
        "appended file"
    );
    Ok(report)
}

/// Reads and validates the image file at `path`.
pub fn load_image(path: &Path) -> Result<Image> {
    let disk = MemDisk::load(path)?;
    check_magic(&disk)?;
    let expected_len = disk_len_for(&disk)?;
    if disk.len_bytes() != expected_len {
        return Err(FsError::InvalidImage(format!(
            "image is {} bytes, superblock describes {}",
            disk.len_bytes(),
            expected_len
        )));
    }
    Image::load(&disk)
}

/// Bad magic is reported before anything else about the image.
fn check_magic(disk: &MemDisk) -> Result<()> {
    let bytes = disk.as_bytes();
    if bytes.len() < 4 {
        return Err(FsError::InvalidImage(format!(
            "image is only {} bytes",
            bytes.len()
        )));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != MAGIC {
        return Err(FsError::InvalidImage(format!(
            "bad magic {:#010x}, expected {:#010x}",
            magic, MAGIC
        )));
    }
    Ok(())
}

fn disk_len_for(disk: &MemDisk) -> Result<u64> {
    let bytes = disk.as_bytes();
    if bytes.len() < BLOCK_SIZE {
        return Err(FsError::InvalidImage("image is shorter than one block".to_string()));
    }
    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(&bytes[..BLOCK_SIZE]);
    let sb = SuperBlock::decode(&block);
    Ok(sb.total_blocks.saturating_mul(BLOCK_SIZE as u64))
}
