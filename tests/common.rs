//! Common utilities for tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

/// Formats a fresh image named `name` under `dir`.
pub fn fresh_image(dir: &Path, name: &str, size_kib: u64, inodes: u64) -> PathBuf {
    let path = dir.join(name);
    minivsfs::build(&path, size_kib, inodes).unwrap();
    path
}

/// Writes a host file under `dir` and returns its path.
pub fn host_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Deterministic, non-repeating-per-block content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 253) as u8).collect()
}

/// Number of set bits in block `block` of a raw image.
pub fn bits_set(image: &[u8], block: usize) -> u32 {
    let start = block * minivsfs::BLOCK_SIZE;
    image[start..start + minivsfs::BLOCK_SIZE]
        .iter()
        .map(|b| b.count_ones())
        .sum()
}
