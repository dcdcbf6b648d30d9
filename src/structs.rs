//! On-disk records and their byte-exact little-endian encoding.

use crate::checksum::{self, DIRENT_CRC_OFFSET, INODE_CRC_OFFSET, SUPERBLOCK_CRC_OFFSET};
use crate::config::*;

#[inline]
fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

#[inline]
fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[inline]
fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

#[inline]
fn put(buf: &mut [u8], off: usize, bytes: &[u8]) {
    buf[off..off + bytes.len()].copy_from_slice(bytes);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,               // Magic number to identify the filesystem
    pub version: u32,             // Layout revision, stored only
    pub block_size: u32,          // Fixed to BLOCK_SIZE
    pub total_blocks: u64,        // Total number of blocks in the image
    pub inode_count: u64,         // Total number of inodes in the inode table
    pub inode_bitmap_start: u64,
    pub inode_bitmap_blocks: u64,
    pub data_bitmap_start: u64,
    pub data_bitmap_blocks: u64,
    pub inode_table_start: u64,
    pub inode_table_blocks: u64,
    pub data_region_start: u64,
    pub data_region_blocks: u64,
    pub root_inode: u64,          // Always ROOT_INODE_ID
    pub mtime_epoch: u64,         // Last modification, seconds since the epoch
    pub flags: u32,
    pub checksum: u32,
}

const _: () = assert!(4 * 3 + 8 * 12 + 4 + 4 == SUPERBLOCK_SIZE);
const _: () = assert!(SUPERBLOCK_CRC_OFFSET == 112);

impl SuperBlock {
    /// Encodes into a full block; bytes past the record are zero.
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut b = [0u8; BLOCK_SIZE];
        put(&mut b, 0, &self.magic.to_le_bytes());
        put(&mut b, 4, &self.version.to_le_bytes());
        put(&mut b, 8, &self.block_size.to_le_bytes());
        let wide = [
            self.total_blocks,
            self.inode_count,
            self.inode_bitmap_start,
            self.inode_bitmap_blocks,
            self.data_bitmap_start,
            self.data_bitmap_blocks,
            self.inode_table_start,
            self.inode_table_blocks,
            self.data_region_start,
            self.data_region_blocks,
            self.root_inode,
            self.mtime_epoch,
        ];
        for (i, v) in wide.iter().enumerate() {
            put(&mut b, 12 + i * 8, &v.to_le_bytes());
        }
        put(&mut b, 108, &self.flags.to_le_bytes());
        put(&mut b, SUPERBLOCK_CRC_OFFSET, &self.checksum.to_le_bytes());
        b
    }

    pub fn decode(b: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            magic: read_u32(b, 0),
            version: read_u32(b, 4),
            block_size: read_u32(b, 8),
            total_blocks: read_u64(b, 12),
            inode_count: read_u64(b, 20),
            inode_bitmap_start: read_u64(b, 28),
            inode_bitmap_blocks: read_u64(b, 36),
            data_bitmap_start: read_u64(b, 44),
            data_bitmap_blocks: read_u64(b, 52),
            inode_table_start: read_u64(b, 60),
            inode_table_blocks: read_u64(b, 68),
            data_region_start: read_u64(b, 76),
            data_region_blocks: read_u64(b, 84),
            root_inode: read_u64(b, 92),
            mtime_epoch: read_u64(b, 100),
            flags: read_u32(b, 108),
            checksum: read_u32(b, SUPERBLOCK_CRC_OFFSET),
        }
    }

    /// Must be the last mutation before the superblock is written.
    pub fn finalize(&mut self) -> u32 {
        self.checksum = 0;
        self.checksum = checksum::superblock_checksum(&self.encode());
        self.checksum
    }

    pub fn verify(&self) -> bool {
        self.checksum == checksum::superblock_checksum(&self.encode())
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
}

impl TryFrom<u8> for FileType {
    type Error = u8;

    fn try_from(v: u8) -> core::result::Result<Self, u8> {
        match v {
            1 => Ok(FileType::Regular),
            2 => Ok(FileType::Directory),
            other => Err(other),
        }
    }
}

impl FileType {
    pub fn mode_bits(self) -> u16 {
        match self {
            FileType::Regular => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub mode: u16,
    pub links: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    pub direct_ptrs: [u32; NUM_DIRECT_PTRS], // 1-based data region block numbers, 0 = unused
    pub reserved: [u32; 3],
    pub proj_id: u32,
    pub uid16_gid16: u32,
    pub xattr_ptr: u64,
    pub checksum: u64, // Low 4 bytes CRC-32, high 4 bytes zero
}

const _: () = assert!(2 + 2 + 4 + 4 + 8 * 4 + 4 * NUM_DIRECT_PTRS + 4 * 3 + 4 + 4 + 8 == INODE_CRC_OFFSET);
const _: () = assert!(INODE_CRC_OFFSET + 8 == INODE_SIZE);
const _: () = assert!(BLOCK_SIZE % INODE_SIZE == 0);

impl Inode {
    pub fn encode(&self) -> [u8; INODE_SIZE] {
        let mut b = [0u8; INODE_SIZE];
        put(&mut b, 0, &self.mode.to_le_bytes());
        put(&mut b, 2, &self.links.to_le_bytes());
        put(&mut b, 4, &self.uid.to_le_bytes());
        put(&mut b, 8, &self.gid.to_le_bytes());
        put(&mut b, 12, &self.size.to_le_bytes());
        put(&mut b, 20, &self.atime.to_le_bytes());
        put(&mut b, 28, &self.mtime.to_le_bytes());
        put(&mut b, 36, &self.ctime.to_le_bytes());
        for (i, p) in self.direct_ptrs.iter().enumerate() {
            put(&mut b, 44 + i * 4, &p.to_le_bytes());
        }
        for (i, r) in self.reserved.iter().enumerate() {
            put(&mut b, 92 + i * 4, &r.to_le_bytes());
        }
        put(&mut b, 104, &self.proj_id.to_le_bytes());
        put(&mut b, 108, &self.uid16_gid16.to_le_bytes());
        put(&mut b, 112, &self.xattr_ptr.to_le_bytes());
        put(&mut b, INODE_CRC_OFFSET, &self.checksum.to_le_bytes());
        b
    }

    pub fn decode(b: &[u8; INODE_SIZE]) -> Self {
        let mut direct_ptrs = [0u32; NUM_DIRECT_PTRS];
        for (i, p) in direct_ptrs.iter_mut().enumerate() {
            *p = read_u32(b, 44 + i * 4);
        }
        Self {
            mode: read_u16(b, 0),
            links: read_u16(b, 2),
            uid: read_u32(b, 4),
            gid: read_u32(b, 8),
            size: read_u64(b, 12),
            atime: read_u64(b, 20),
            mtime: read_u64(b, 28),
            ctime: read_u64(b, 36),
            direct_ptrs,
            reserved: [read_u32(b, 92), read_u32(b, 96), read_u32(b, 100)],
            proj_id: read_u32(b, 104),
            uid16_gid16: read_u32(b, 108),
            xattr_ptr: read_u64(b, 112),
            checksum: read_u64(b, INODE_CRC_OFFSET),
        }
    }

    pub fn finalize(&mut self) -> u32 {
        let crc = checksum::inode_checksum(&self.encode());
        self.checksum = crc as u64;
        crc
    }

    pub fn verify(&self) -> bool {
        self.checksum == checksum::inode_checksum(&self.encode()) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub inode_id: u32, // 0 marks a free slot
    pub ftype: u8,
    pub name: [u8; NAME_FIELD_LEN],
    pub checksum: u8,
}

const _: () = assert!(4 + 1 + NAME_FIELD_LEN + 1 == DIR_ENTRY_SIZE);
const _: () = assert!(DIRENT_CRC_OFFSET == 63);

impl DirEntry {
    pub const NULL: Self = Self {
        inode_id: 0,
        ftype: 0,
        name: [0; NAME_FIELD_LEN],
        checksum: 0,
    };

    /// Builds a finalized entry. The name must already be validated.
    pub fn new(inode_id: u32, ftype: FileType, name: &[u8]) -> Self {
        debug_assert!(!name.is_empty() && name.len() <= MAX_FILE_NAME_LEN);
        let mut entry = Self {
            inode_id,
            ftype: ftype as u8,
            name: {
                let mut arr = [0; NAME_FIELD_LEN];
                arr[..name.len()].copy_from_slice(name);
                arr
            },
            checksum: 0,
        };
        entry.finalize();
        entry
    }

    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut b = [0u8; DIR_ENTRY_SIZE];
        put(&mut b, 0, &self.inode_id.to_le_bytes());
        b[4] = self.ftype;
        put(&mut b, 5, &self.name);
        b[DIRENT_CRC_OFFSET] = self.checksum;
        b
    }

    pub fn decode(b: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut name = [0u8; NAME_FIELD_LEN];
        name.copy_from_slice(&b[5..5 + NAME_FIELD_LEN]);
        Self {
            inode_id: read_u32(b, 0),
            ftype: b[4],
            name,
            checksum: b[DIRENT_CRC_OFFSET],
        }
    }

    pub fn finalize(&mut self) -> u8 {
        self.checksum = checksum::dirent_checksum(&self.encode());
        self.checksum
    }

    pub fn verify(&self) -> bool {
        self.checksum == checksum::dirent_checksum(&self.encode())
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::try_from(self.ftype).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_superblock() -> SuperBlock {
        SuperBlock {
            magic: MAGIC,
            version: VERSION,
            block_size: BLOCK_SIZE as u32,
            total_blocks: 1024,
            inode_count: 128,
            inode_bitmap_start: 1,
            inode_bitmap_blocks: 1,
            data_bitmap_start: 2,
            data_bitmap_blocks: 1,
            inode_table_start: 3,
            inode_table_blocks: 4,
            data_region_start: 7,
            data_region_blocks: 1017,
            root_inode: 1,
            mtime_epoch: 1_700_000_000,
            flags: 0,
            checksum: 0,
        }
    }

    #[test]
    fn test_superblock_field_offsets() {
        let sb = sample_superblock();
        let b = sb.encode();
        assert_eq!(&b[0..4], &MAGIC.to_le_bytes());
        assert_eq!(&b[12..20], &1024u64.to_le_bytes());
        assert_eq!(&b[76..84], &7u64.to_le_bytes());
        assert_eq!(&b[100..108], &1_700_000_000u64.to_le_bytes());
        assert!(b[SUPERBLOCK_SIZE..].iter().all(|&x| x == 0));
        assert_eq!(SuperBlock::decode(&b), sb);
    }

    #[test]
    fn test_superblock_finalize() {
        let mut sb = sample_superblock();
        assert!(!sb.verify());
        sb.finalize();
        assert!(sb.verify());
        assert!(checksum::verify_superblock_block(&sb.encode()));
        sb.mtime_epoch += 1;
        assert!(!sb.verify());
    }

    #[test]
    fn test_inode_layout() {
        let mut inode = Inode {
            mode: S_IFREG | FILE_PERM,
            links: 1,
            size: 5000,
            direct_ptrs: [2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            ..Default::default()
        };
        let crc = inode.finalize();
        let b = inode.encode();
        assert_eq!(&b[44..48], &2u32.to_le_bytes());
        assert_eq!(&b[48..52], &3u32.to_le_bytes());
        assert_eq!(&b[120..124], &crc.to_le_bytes());
        assert_eq!(&b[124..128], &[0, 0, 0, 0]);
        assert_eq!(Inode::decode(&b), inode);
        assert!(inode.verify());
    }

    #[test]
    fn test_dir_entry() {
        let entry = DirEntry::new(7, FileType::Regular, b"hello.txt");
        assert!(entry.verify());
        let b = entry.encode();
        assert_eq!(&b[0..4], &7u32.to_le_bytes());
        assert_eq!(b[4], 1);
        assert_eq!(&b[5..14], b"hello.txt");
        assert_eq!(DirEntry::decode(&b), entry);
        assert_eq!(entry.file_type(), Some(FileType::Regular));
        assert_eq!(DirEntry::NULL.file_type(), None);
    }
}
