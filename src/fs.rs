use std::fmt::Write as _;
use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::bitmap::Bitmap;
use crate::config::*;
use crate::directory::RootDir;
use crate::error::{FsError, Result};
use crate::file::{self, DataRegion};
use crate::inode::InodeTable;
use crate::path::validate_name;
use crate::superblock::read_superblock;
use crate::{BlockDevice, DirEntry, FileType, Inode, MemDisk, SuperBlock};

/// Seconds since the Unix epoch, as stored in every timestamp field.
pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Outcome of adding one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReport {
    pub name: String,
    pub inode: u32,
    pub size: u64,
    /// 0-based data region blocks, in allocation order.
    pub blocks: Vec<u64>,
    pub slot: usize,
}

impl AppendReport {
    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }
}

/// Problems found by [`Image::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// A complete image held as one typed container per region.
/// Everything is decoded in one pass by [`Image::load`] and reassembled by
/// [`Image::store`]; mutations never touch storage in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    superblock: SuperBlock,
    inode_bitmap: Bitmap,
    data_bitmap: Bitmap,
    inodes: InodeTable,
    data: DataRegion,
    root: RootDir,
    root_block: u64,
}

impl Image {
    /// Lays out a fresh image with only the root directory in it.
    pub fn format(total_blocks: u64, inode_count: u64, proj_id: u32, now: u64) -> Result<Self> {
        let mut superblock = SuperBlock::layout(total_blocks, inode_count, now)?;

        let mut inode_bitmap = Bitmap::new(superblock.inode_count);
        let mut data_bitmap = Bitmap::new(superblock.allocatable_data_blocks());
        let root_bit = inode_bitmap.alloc();
        let root_block = data_bitmap.alloc();
        debug_assert_eq!(root_bit, Some(ROOT_INODE_ID as u64 - 1));
        debug_assert_eq!(root_block, Some(0));

        let mut inodes = InodeTable::new(superblock.inode_count);
        inodes.set(ROOT_INODE_ID, Inode::root(now, proj_id))?;

        superblock.finalize();
        debug!(
            total_blocks,
            inode_count,
            data_region_start = superblock.data_region_start,
            data_region_blocks = superblock.data_region_blocks,
            "formatted image"
        );

        let mut image = Self {
            data: DataRegion::new(superblock.data_region_blocks),
            superblock,
            inode_bitmap,
            data_bitmap,
            inodes,
            root: RootDir::new(),
            root_block: 0,
        };
        image.sync_root_block()?;
        Ok(image)
    }

    /// Copies the root directory entries into their data region block.
    fn sync_root_block(&mut self) -> Result<()> {
        self.data
            .block_mut(self.root_block)?
            .copy_from_slice(&self.root.encode());
        Ok(())
    }

    /// Decodes and validates an image stored on `device`.
    pub fn load(device: &impl BlockDevice) -> Result<Self> {
        let superblock = read_superblock(device)?;
        if device.num_blocks() != superblock.total_blocks {
            return Err(FsError::InvalidImage(format!(
                "image holds {} blocks, superblock records {}",
                device.num_blocks(),
                superblock.total_blocks
            )));
        }

        let mut buf = Box::new([0u8; BLOCK_SIZE]);
        device.read_block(superblock.inode_bitmap_start, &mut buf)?;
        let inode_bitmap = Bitmap::from_block(*buf, superblock.inode_count);
        device.read_block(superblock.data_bitmap_start, &mut buf)?;
        let data_bitmap = Bitmap::from_block(*buf, superblock.allocatable_data_blocks());

        let inodes = InodeTable::read(device, &superblock)?;
        let data = DataRegion::read(device, &superblock)?;

        let root_inode = inodes.get(ROOT_INODE_ID)?;
        if !root_inode.verify() {
            return Err(FsError::InvalidImage("root inode checksum mismatch".to_string()));
        }
        if root_inode.file_type() != Some(FileType::Directory)
            || !inode_bitmap.is_used(ROOT_INODE_ID as u64 - 1)
        {
            return Err(FsError::InvalidImage("root inode is not an allocated directory".to_string()));
        }
        if root_inode.links < 2 {
            return Err(FsError::InvalidImage(format!(
                "root inode has {} links, '.' and '..' need 2",
                root_inode.links
            )));
        }
        let root_block = match root_inode.data_blocks().next() {
            Some(b) if b < data.num_blocks() => b,
            _ => {
                return Err(FsError::InvalidImage(
                    "root directory has no valid data block".to_string(),
                ));
            }
        };
        // Otherwise first-fit would hand the directory block to a new file.
        if !data_bitmap.is_used(root_block) {
            return Err(FsError::InvalidImage(format!(
                "root directory block {} is not marked in the data bitmap",
                root_block
            )));
        }
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(data.block(root_block)?);
        let root = RootDir::decode(&block);
        if !root.has_dot_entries() {
            return Err(FsError::InvalidImage(
                "root directory lacks valid '.' and '..' entries".to_string(),
            ));
        }

        Ok(Self {
            superblock,
            inode_bitmap,
            data_bitmap,
            inodes,
            data,
            root,
            root_block,
        })
    }

    /// Writes every region, in block order, to `device`.
    pub fn store(&self, device: &mut impl BlockDevice) -> Result<()> {
        debug_assert!(self.superblock.verify(), "superblock stored with a stale checksum");
        crate::superblock::write_superblock(device, &self.superblock)?;
        device.write_block(self.superblock.inode_bitmap_start, self.inode_bitmap.as_block())?;
        device.write_block(self.superblock.data_bitmap_start, self.data_bitmap.as_block())?;
        self.inodes.write(device, &self.superblock)?;
        self.data.write(device, &self.superblock)?;
        device.flush()
    }

    /// Serializes the image into a fresh in-memory disk.
    pub fn to_disk(&self) -> Result<MemDisk> {
        let mut disk = MemDisk::new(self.superblock.total_blocks);
        self.store(&mut disk)?;
        Ok(disk)
    }

    /// Adds one regular file to the root directory, reading exactly `size`
    /// bytes from `source`.
    ///
    /// Allocation works on copies of the bitmaps and nothing in the image
    /// changes until every check has passed, so a failed call leaves the
    /// image as it was.
    pub fn add_file(
        &mut self,
        name: &[u8],
        size: u64,
        mut source: impl Read,
        now: u64,
    ) -> Result<AppendReport> {
        if size > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge { size, max: MAX_FILE_SIZE });
        }

        let mut inode_bitmap = self.inode_bitmap.clone();
        let mut data_bitmap = self.data_bitmap.clone();

        let inode_id = match inode_bitmap.alloc() {
            Some(bit) => bit as u32 + 1,
            None => {
                return Err(FsError::NoFreeInode {
                    inode_count: self.superblock.inode_count,
                });
            }
        };

        let needed = Inode::blocks_for_size(size);
        let available = data_bitmap.count_free();
        let mut blocks = Vec::with_capacity(needed as usize);
        for _ in 0..needed {
            match data_bitmap.alloc() {
                Some(block) => blocks.push(block),
                None => return Err(FsError::NoFreeSpace { needed, available }),
            }
        }
        debug!(inode_id, ?blocks, "allocated inode and data blocks");

        let mut content = Vec::with_capacity(size as usize);
        source.by_ref().take(size + 1).read_to_end(&mut content)?;
        if content.len() as u64 != size {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes of file content, read {}", size, content.len()),
            )));
        }

        let slot = self.root.find_free_slot().ok_or(FsError::DirectoryFull {
            capacity: NUM_ENTRY_PER_BLOCK,
        })?;
        validate_name(name)?;
        if self.root.lookup(name).is_some() {
            return Err(FsError::AlreadyExists(String::from_utf8_lossy(name).into_owned()));
        }
        let mut root_inode = *self.inodes.get(ROOT_INODE_ID)?;

        // Every check passed; commit.
        self.inodes.set(inode_id, Inode::regular(size, &blocks, now))?;
        file::fwrite(&mut self.data, &blocks, &content)?;
        let inserted = self
            .root
            .insert(DirEntry::new(inode_id, FileType::Regular, name))?;
        debug_assert_eq!(inserted, slot);
        self.sync_root_block()?;

        root_inode.links += 1;
        root_inode.mtime = now;
        root_inode.finalize();
        self.inodes.set(ROOT_INODE_ID, root_inode)?;

        self.inode_bitmap = inode_bitmap;
        self.data_bitmap = data_bitmap;

        self.superblock.mtime_epoch = now;
        self.superblock.finalize();

        Ok(AppendReport {
            name: String::from_utf8_lossy(name).into_owned(),
            inode: inode_id,
            size,
            blocks,
            slot,
        })
    }

    /// Convenience wrapper over [`Image::add_file`] for in-memory content.
    pub fn add_bytes(&mut self, name: &[u8], content: &[u8], now: u64) -> Result<AppendReport> {
        self.add_file(name, content.len() as u64, content, now)
    }

    pub fn lookup(&self, name: &str) -> Result<(u32, &Inode)> {
        let entry = self
            .root
            .lookup(name.as_bytes())
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        Ok((entry.inode_id, self.inodes.get(entry.inode_id)?))
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let (_, inode) = self.lookup(name)?;
        file::fread(&self.data, inode)
    }

    /// Live root directory entries in slot order, `.` and `..` first.
    pub fn read_dir(&self) -> Vec<DirEntry> {
        self.root.entries().copied().collect()
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn inode_bitmap(&self) -> &Bitmap {
        &self.inode_bitmap
    }

    pub fn data_bitmap(&self) -> &Bitmap {
        &self.data_bitmap
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    pub fn root_dir(&self) -> &RootDir {
        &self.root
    }

    pub fn root_inode(&self) -> Result<&Inode> {
        self.inodes.get(ROOT_INODE_ID)
    }

    /// Re-checks every checksum and the agreement between bitmaps, inode
    /// pointers and directory entries.
    pub fn verify(&self) -> VerifyReport {
        let mut problems = Vec::new();
        if let Err(e) = self.superblock.validate() {
            problems.push(format!("superblock: {}", e));
        }

        let mut owner: Vec<Option<u32>> = vec![None; self.data_bitmap.capacity() as usize];
        for (id, inode) in self.inodes.iter() {
            if !self.inode_bitmap.is_used(id as u64 - 1) {
                continue;
            }
            if !inode.verify() {
                problems.push(format!("inode {}: checksum mismatch", id));
            }
            let pointers: Vec<u64> = inode.data_blocks().collect();
            let expected = match inode.file_type() {
                Some(FileType::Regular) => Inode::blocks_for_size(inode.size),
                Some(FileType::Directory) => 1,
                None => {
                    problems.push(format!("inode {}: unknown mode {:#o}", id, inode.mode));
                    continue;
                }
            };
            if pointers.len() as u64 != expected {
                problems.push(format!(
                    "inode {}: {} direct pointers for {} bytes, expected {}",
                    id,
                    pointers.len(),
                    inode.size,
                    expected
                ));
            }
            for block in pointers {
                if block >= self.data_bitmap.capacity() {
                    problems.push(format!("inode {}: pointer to block {} out of range", id, block));
                    continue;
                }
                if !self.data_bitmap.is_used(block) {
                    problems.push(format!("inode {}: block {} not marked in data bitmap", id, block));
                }
                match owner[block as usize] {
                    Some(other) => problems.push(format!(
                        "block {} claimed by inodes {} and {}",
                        block, other, id
                    )),
                    None => owner[block as usize] = Some(id),
                }
            }
        }
        for block in 0..self.data_bitmap.capacity() {
            if self.data_bitmap.is_used(block) && owner[block as usize].is_none() {
                problems.push(format!("data block {}: marked used but unreferenced", block));
            }
        }

        let mut live = 0u16;
        for (slot, entry) in self.root.slots().iter().enumerate() {
            if entry.is_free() {
                continue;
            }
            live += 1;
            if !entry.verify() {
                problems.push(format!("dirent {} ({}): checksum mismatch", slot, entry.name_lossy()));
            }
            if entry.inode_id as u64 > self.superblock.inode_count
                || !self.inode_bitmap.is_used(entry.inode_id as u64 - 1)
            {
                problems.push(format!(
                    "dirent {} ({}): inode {} not allocated",
                    slot,
                    entry.name_lossy(),
                    entry.inode_id
                ));
            }
        }
        match self.root_inode() {
            Ok(root) if root.links != live => problems.push(format!(
                "root inode: link count {} but {} live entries",
                root.links, live
            )),
            Ok(_) => {}
            Err(e) => problems.push(format!("root inode: {}", e)),
        }

        VerifyReport { problems }
    }

    /// Human-readable summary of the image.
    pub fn dump(&self) -> String {
        let sb = &self.superblock;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "MiniVSFS v{} magic={:#010x} block_size={} total_blocks={} mtime={}",
            sb.version, sb.magic, sb.block_size, sb.total_blocks, sb.mtime_epoch
        );
        for r in sb.regions() {
            let _ = writeln!(out, "  {:<12} blocks {:>6}..{:<6} ({})", r.name, r.start, r.end(), r.blocks);
        }
        let _ = writeln!(
            out,
            "  inodes {}/{} used, data blocks {}/{} used",
            self.inode_bitmap.count_used(),
            self.inode_bitmap.capacity(),
            self.data_bitmap.count_used(),
            self.data_bitmap.capacity()
        );
        for entry in self.root.entries() {
            let size = self
                .inodes
                .get(entry.inode_id)
                .map(|i| i.size)
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  {:>5} {:<4} {:>8} {}",
                entry.inode_id,
                match entry.file_type() {
                    Some(FileType::Directory) => "dir",
                    Some(FileType::Regular) => "file",
                    None => "?",
                },
                size,
                entry.name_lossy()
            );
        }
        out
    }
}
