//! Integrity checksums for the three on-disk record kinds.
//!
//! - Superblock: CRC-32 over the whole superblock block except its last word,
//!   with the checksum field zeroed while computing.
//! - Inode: CRC-32 over the 120 bytes preceding the checksum field, kept in
//!   the low half of the 64-bit checksum field.
//! - Directory entry: XOR of the 63 bytes preceding the checksum byte.
//!
//! Whoever mutates a record must finalize it again before it is written out.

use crate::config::*;

const CRC32_POLY: u32 = 0xEDB88320;

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut j = 0;
        while j < 8 {
            c = if c & 1 != 0 { CRC32_POLY ^ (c >> 1) } else { c >> 1 };
            j += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

static CRC32_TABLE: [u32; 256] = build_crc32_table();

/// Standard reflected CRC-32 (IEEE 802.3).
pub fn crc32(data: &[u8]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for &byte in data {
        c = CRC32_TABLE[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}

pub const SUPERBLOCK_CRC_OFFSET: usize = SUPERBLOCK_SIZE - 4;
pub const INODE_CRC_OFFSET: usize = INODE_SIZE - 8;
pub const DIRENT_CRC_OFFSET: usize = DIR_ENTRY_SIZE - 1;

/// Checksum of an encoded superblock block.
pub fn superblock_checksum(block: &[u8; BLOCK_SIZE]) -> u32 {
    let mut tmp = *block;
    tmp[SUPERBLOCK_CRC_OFFSET..SUPERBLOCK_SIZE].fill(0);
    crc32(&tmp[..BLOCK_SIZE - 4])
}

/// Checksum of an encoded inode record.
pub fn inode_checksum(record: &[u8; INODE_SIZE]) -> u32 {
    crc32(&record[..INODE_CRC_OFFSET])
}

/// Checksum of an encoded directory entry.
pub fn dirent_checksum(record: &[u8; DIR_ENTRY_SIZE]) -> u8 {
    record[..DIRENT_CRC_OFFSET].iter().fold(0u8, |x, &b| x ^ b)
}

/// Recomputes the checksum stored in a raw superblock block.
pub fn verify_superblock_block(block: &[u8; BLOCK_SIZE]) -> bool {
    let stored = u32::from_le_bytes([
        block[SUPERBLOCK_CRC_OFFSET],
        block[SUPERBLOCK_CRC_OFFSET + 1],
        block[SUPERBLOCK_CRC_OFFSET + 2],
        block[SUPERBLOCK_CRC_OFFSET + 3],
    ]);
    stored == superblock_checksum(block)
}
