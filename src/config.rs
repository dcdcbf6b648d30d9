pub const MAGIC: u32 = 0x4D565346; // "MVSF" in ASCII
pub const VERSION: u32 = 1;

pub const BLOCK_SIZE: usize = 4096;
pub const BITS_PER_BLOCK: u64 = BLOCK_SIZE as u64 * 8;
pub const SUPERBLOCK_ID: u64 = 0; // Block ID for the superblock
pub const SUPERBLOCK_SIZE: usize = 116;
pub const ROOT_INODE_ID: u32 = 1; // Inode ID for the root directory
pub const INODE_SIZE: usize = 128;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

pub const INODE_BITMAP_BLOCKS: u64 = 1;
pub const DATA_BITMAP_BLOCKS: u64 = 1;

pub const NUM_DIRECT_PTRS: usize = 12; // Number of direct pointers in an inode
pub const MAX_FILE_SIZE: u64 = (NUM_DIRECT_PTRS * BLOCK_SIZE) as u64;

pub const DIR_ENTRY_SIZE: usize = 64; // inode ID + type + name + checksum
pub const NAME_FIELD_LEN: usize = 58;
pub const MAX_FILE_NAME_LEN: usize = NAME_FIELD_LEN - 1; // Leaves room for the NUL terminator
pub const NUM_ENTRY_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const RESERVED_DIR_ENTRIES: usize = 2; // '.' and '..'
pub const DOT_NAME: &[u8; 1] = b".";
pub const DOTDOT_NAME: &[u8; 2] = b"..";

// Mode bits stored in the inode's type-and-permission word.
pub const S_IFMT: u16 = 0o170000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFREG: u16 = 0o100000;
pub const DIR_PERM: u16 = 0o755;
pub const FILE_PERM: u16 = 0o644;
