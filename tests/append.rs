use std::fs;

mod common;

use common::{bits_set, fresh_image, host_file, pattern};
use minivsfs::{BLOCK_SIZE, Error, MAX_FILE_SIZE};

#[test]
fn test_append_5000_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 4096, 128);
    let content = pattern(5000);
    let file = host_file(dir.path(), "hello.bin", &content);
    let out = dir.path().join("out.img");

    let report = minivsfs::append(&image, &out, &file).unwrap();
    log!("{:?}", report);
    assert_eq!(report.name, "hello.bin");
    assert_eq!(report.inode, 2);
    assert_eq!(report.size, 5000);
    assert_eq!(report.blocks, vec![1, 2]);
    assert_eq!(report.slot, 2);

    let fs = minivsfs::load_image(&out).unwrap();
    assert!(fs.verify().is_clean());
    assert_eq!(fs.read_file("hello.bin").unwrap(), content);
    assert_eq!(fs.root_inode().unwrap().links, 3);
    let (id, inode) = fs.lookup("hello.bin").unwrap();
    assert_eq!(id, 2);
    assert_eq!(inode.direct_ptrs[..3], [2, 3, 0]);

    let names: Vec<String> = fs.read_dir().iter().map(|e| e.name_lossy()).collect();
    assert_eq!(names, [".", "..", "hello.bin"]);
}

#[test]
fn test_append_keeps_input_when_output_differs() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 256, 16);
    let before = fs::read(&image).unwrap();
    let file = host_file(dir.path(), "a.txt", b"some text");
    let out = dir.path().join("out.img");

    minivsfs::append(&image, &out, &file).unwrap();
    assert_eq!(fs::read(&image).unwrap(), before);
    assert_eq!(fs::metadata(&out).unwrap().len(), before.len() as u64);
}

#[test]
fn test_bitmap_delta() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 4096, 128);
    minivsfs::append(&image, &image, &host_file(dir.path(), "first", &pattern(100))).unwrap();
    let before = fs::read(&image).unwrap();

    let size = 2 * BLOCK_SIZE + 808;
    minivsfs::append(&image, &image, &host_file(dir.path(), "second", &pattern(size))).unwrap();
    let after = fs::read(&image).unwrap();

    assert_eq!(bits_set(&after, 1), bits_set(&before, 1) + 1);
    assert_eq!(bits_set(&after, 2), bits_set(&before, 2) + 3);
    for block in [1, 2] {
        let range = block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE;
        for (old, new) in before[range.clone()].iter().zip(&after[range]) {
            assert_eq!(old & new, *old, "a previously set bit was cleared");
        }
    }
}

#[test]
fn test_append_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 512, 32);
    let mut expected_block = 1;
    for (i, len) in [10usize, BLOCK_SIZE, BLOCK_SIZE + 1, 0, 3].into_iter().enumerate() {
        let name = format!("file{}", i);
        let file = host_file(dir.path(), &name, &pattern(len));
        let report = minivsfs::append(&image, &image, &file).unwrap();
        assert_eq!(report.inode, i as u32 + 2);
        assert_eq!(report.slot, i + 2);
        let blocks: Vec<u64> = (expected_block..expected_block + report.block_count()).collect();
        assert_eq!(report.blocks, blocks);
        expected_block += report.block_count();
    }

    let fs = minivsfs::load_image(&image).unwrap();
    assert!(fs.verify().is_clean());
    assert_eq!(fs.root_inode().unwrap().links, 7);
    assert_eq!(fs.read_file("file2").unwrap(), pattern(BLOCK_SIZE + 1));
    assert!(fs.read_file("file3").unwrap().is_empty());
    assert_eq!(fs.lookup("file3").unwrap().1.direct_ptrs, [0; 12]);
    assert_eq!(fs.inode_bitmap().count_used(), 6);
    assert_eq!(fs.data_bitmap().count_used(), expected_block);
    assert_eq!(fs.root_dir().find_free_slot(), Some(7));
}

#[test]
fn test_file_too_large_leaves_everything_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 4096, 128);
    let before = fs::read(&image).unwrap();
    let out = host_file(dir.path(), "out.img", b"untouched");
    let big = host_file(dir.path(), "big.bin", &vec![1u8; MAX_FILE_SIZE as usize + 1]);

    match minivsfs::append(&image, &out, &big) {
        Err(Error::FileTooLarge { size, max }) => {
            assert_eq!(size, 12 * 4096 + 1);
            assert_eq!(max, 12 * 4096);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(fs::read(&image).unwrap(), before);
    assert_eq!(fs::read(&out).unwrap(), b"untouched");

    // In place as well.
    assert!(minivsfs::append(&image, &image, &big).is_err());
    assert_eq!(fs::read(&image).unwrap(), before);
}

#[test]
fn test_largest_file_fits() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 4096, 128);
    let content = pattern(MAX_FILE_SIZE as usize);
    let file = host_file(dir.path(), "max.bin", &content);
    let report = minivsfs::append(&image, &image, &file).unwrap();
    assert_eq!(report.block_count(), 12);
    let fs = minivsfs::load_image(&image).unwrap();
    assert_eq!(fs.read_file("max.bin").unwrap(), content);
}

#[test]
fn test_directory_full() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 512, 64);
    for i in 0..62 {
        let file = host_file(dir.path(), &format!("f{:02}", i), b"x");
        minivsfs::append(&image, &image, &file).unwrap();
    }
    let before = fs::read(&image).unwrap();

    let file = host_file(dir.path(), "one-too-many", b"x");
    assert!(matches!(
        minivsfs::append(&image, &image, &file),
        Err(Error::DirectoryFull { capacity: 64 })
    ));
    assert_eq!(fs::read(&image).unwrap(), before);

    let fs = minivsfs::load_image(&image).unwrap();
    assert_eq!(fs.read_dir().len(), 64);
    assert_eq!(fs.root_inode().unwrap().links, 64);
    assert_eq!(fs.root_dir().find_free_slot(), None);
    assert_eq!(fs.inode_bitmap().count_used(), 63);
    assert!(fs.verify().is_clean());
}

#[test]
fn test_no_free_inode() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 64, 2);
    minivsfs::append(&image, &image, &host_file(dir.path(), "a", b"a")).unwrap();
    assert!(matches!(
        minivsfs::append(&image, &image, &host_file(dir.path(), "b", b"b")),
        Err(Error::NoFreeInode { inode_count: 2 })
    ));
}

#[test]
fn test_no_free_space() {
    let dir = tempfile::tempdir().unwrap();
    // 6 blocks: 4 of metadata, the root directory block and one free block.
    let image = fresh_image(dir.path(), "fs.img", 24, 32);
    let before = fs::read(&image).unwrap();
    let file = host_file(dir.path(), "two-blocks", &pattern(5000));
    assert!(matches!(
        minivsfs::append(&image, &image, &file),
        Err(Error::NoFreeSpace { needed: 2, available: 1 })
    ));
    assert_eq!(fs::read(&image).unwrap(), before);

    let file = host_file(dir.path(), "one-block", &pattern(4000));
    minivsfs::append(&image, &image, &file).unwrap();
}

#[test]
fn test_name_length_limit() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 256, 16);

    let long = host_file(dir.path(), &"n".repeat(58), b"x");
    assert!(matches!(
        minivsfs::append(&image, &image, &long),
        Err(Error::NameTooLong { len: 58, max: 57 })
    ));

    let longest = "m".repeat(57);
    let file = host_file(dir.path(), &longest, b"fits");
    minivsfs::append(&image, &image, &file).unwrap();
    let fs = minivsfs::load_image(&image).unwrap();
    assert_eq!(fs.read_file(&longest).unwrap(), b"fits");
}

#[test]
fn test_duplicate_name() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 256, 16);
    let file = host_file(dir.path(), "same", b"1");
    minivsfs::append(&image, &image, &file).unwrap();
    assert!(matches!(
        minivsfs::append(&image, &image, &file),
        Err(Error::AlreadyExists(_))
    ));
}

#[test]
fn test_source_not_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 256, 16);
    let out = dir.path().join("out.img");
    assert!(matches!(
        minivsfs::append(&image, &out, dir.path()),
        Err(Error::NotRegularFile(_))
    ));
    assert!(matches!(
        minivsfs::append(&image, &out, &dir.path().join("missing")),
        Err(Error::Io(_))
    ));
    assert!(!out.exists());
}

#[test]
fn test_invalid_images() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 256, 16);
    let good = fs::read(&image).unwrap();
    let file = host_file(dir.path(), "a", b"a");
    let out = dir.path().join("out.img");

    let mut bad_magic = good.clone();
    bad_magic[0] ^= 0xFF;
    let bad_magic = host_file(dir.path(), "magic.img", &bad_magic);

    let truncated = host_file(dir.path(), "short.img", &good[..good.len() - 1]);
    let tiny = host_file(dir.path(), "tiny.img", &good[..100]);

    // A superblock field changed without updating the checksum.
    let mut stale = good.clone();
    stale[100] ^= 0x01;
    let stale = host_file(dir.path(), "stale.img", &stale);

    // Root directory '.' entry wiped.
    let data_start = minivsfs::load_image(&image).unwrap().superblock().data_region_start as usize;
    let mut no_dot = good.clone();
    no_dot[data_start * BLOCK_SIZE..data_start * BLOCK_SIZE + 64].fill(0);
    let no_dot = host_file(dir.path(), "nodot.img", &no_dot);

    // Data bitmap with the root directory block unmarked.
    let mut unmarked = good.clone();
    unmarked[2 * BLOCK_SIZE] = 0;
    let unmarked = host_file(dir.path(), "unmarked.img", &unmarked);

    // Root inode atime changed without refreshing its CRC.
    let mut root_crc = good.clone();
    root_crc[3 * BLOCK_SIZE + 20] ^= 0x01;
    let root_crc = host_file(dir.path(), "rootcrc.img", &root_crc);

    // '.' entry checksum byte damaged.
    let mut dot_crc = good.clone();
    dot_crc[data_start * BLOCK_SIZE + 63] ^= 0xFF;
    let dot_crc = host_file(dir.path(), "dotcrc.img", &dot_crc);

    for input in [bad_magic, truncated, tiny, stale, no_dot, unmarked, root_crc, dot_crc] {
        let result = minivsfs::append(&input, &out, &file);
        assert!(
            matches!(result, Err(Error::InvalidImage(_))),
            "{}: {:?}",
            input.display(),
            result
        );
        assert!(!out.exists());
    }
}

#[test]
fn test_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let image = fresh_image(dir.path(), "fs.img", 256, 16);
    let err = minivsfs::append(&image, &image, dir.path()).unwrap_err();
    assert_eq!(err.exit_code(), 5);
    let big = host_file(dir.path(), "big", &vec![0u8; MAX_FILE_SIZE as usize + 1]);
    assert_eq!(minivsfs::append(&image, &image, &big).unwrap_err().exit_code(), 6);
}
