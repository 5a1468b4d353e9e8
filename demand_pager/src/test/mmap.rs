use std::{fs, sync::Arc};

use rand::{rngs::SmallRng, SeedableRng};

use super::{get_test_vm, rand_page, user_page, SEED};
use crate::{
    addressing::{Va, PAGE_SIZE},
    error::MmapError,
    modules::backing_file::{BackingFileModule, FileHandle, HostBackingFile, MemoryBackingFile},
    page::PageKind,
};

#[test]
fn test_mmap_ten_byte_file() {
    let vm = get_test_vm(2, 8);
    let mut space = vm.create_space();
    let file = MemoryBackingFile::new((1..=10).collect()).into_handle();

    let addr = vm
        .mmap(&mut space, user_page(0), 10, true, &file, 0)
        .unwrap();
    assert_eq!(addr, user_page(0));
    assert_eq!(space.page_count(), 1);
    assert_eq!(vm.page_kind(&space, addr), Some(PageKind::FileBacked));

    let mut buffer = vec![0xffu8; PAGE_SIZE];
    vm.read_user(&mut space, addr, &mut buffer).unwrap();
    assert_eq!(&buffer[..10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert!(buffer[10..].iter().all(|x| *x == 0));

    vm.teardown(&mut space);
}

#[test]
fn test_mmap_rejections() {
    let vm = get_test_vm(2, 8);
    let mut space = vm.create_space();
    let file = MemoryBackingFile::new(vec![1u8; 3 * PAGE_SIZE]).into_handle();
    let empty = MemoryBackingFile::new(Vec::new()).into_handle();
    let console: FileHandle = MemoryBackingFile::console().into_handle();
    let kernel = vm.config().kernel_base;

    vm.alloc_page(&mut space, user_page(10), true).unwrap();

    let cases: [(Va, usize, &FileHandle, usize, MmapError); 12] = [
        (user_page(0), 0, &file, 0, MmapError::ZeroLength),
        (user_page(0), 10, &console, 0, MmapError::ConsoleFile),
        (Va::ZERO, 10, &file, 0, MmapError::NullAddress),
        (user_page(0) + 1, 10, &file, 0, MmapError::UnalignedAddress),
        (kernel - PAGE_SIZE, 2 * PAGE_SIZE, &file, 0, MmapError::OutsideUserSpace),
        (kernel, 10, &file, 0, MmapError::OutsideUserSpace),
        (user_page(0), usize::MAX, &file, 0, MmapError::OutsideUserSpace),
        (user_page(0), usize::MAX - PAGE_SIZE, &file, 0, MmapError::OutsideUserSpace),
        (user_page(9), 2 * PAGE_SIZE, &file, 0, MmapError::Overlap(user_page(10))),
        (user_page(0), 10, &file, 1, MmapError::UnalignedOffset),
        (user_page(0), 10, &empty, 0, MmapError::EmptyFile),
        (user_page(0), 10, &file, 3 * PAGE_SIZE, MmapError::OffsetBeyondEnd),
    ];

    for (addr, length, handle, offset, expected) in cases {
        assert_eq!(
            vm.try_mmap(&mut space, addr, length, true, handle, offset),
            Err(expected)
        );
        assert_eq!(vm.mmap(&mut space, addr, length, true, handle, offset), None);
        assert_eq!(space.page_count(), 1);
    }

    vm.teardown(&mut space);
}

#[test]
fn test_mmap_page_layout() {
    let vm = get_test_vm(4, 8);
    let mut space = vm.create_space();
    let content: Vec<u8> = (0..3 * PAGE_SIZE).map(|i| (i / PAGE_SIZE) as u8 + 1).collect();
    let file = MemoryBackingFile::new(content).into_handle();

    // file has two pages left after the offset, the mapping wants four
    vm.mmap(&mut space, user_page(0), 3 * PAGE_SIZE + 1, true, &file, PAGE_SIZE)
        .unwrap();
    assert_eq!(space.page_count(), 4);

    let mut buffer = vec![0u8; PAGE_SIZE];
    for (i, expected) in [2u8, 3, 0, 0].into_iter().enumerate() {
        vm.read_user(&mut space, user_page(i), &mut buffer).unwrap();
        assert!(buffer.iter().all(|x| *x == expected), "page {}", i);
    }

    vm.teardown(&mut space);
}

#[test]
fn test_munmap_writes_back() {
    let vm = get_test_vm(4, 8);
    let mut space = vm.create_space();
    let file = MemoryBackingFile::new(vec![0u8; 2 * PAGE_SIZE]);
    let handle = file.clone().into_handle();

    vm.mmap(&mut space, user_page(0), 2 * PAGE_SIZE, true, &handle, 0)
        .unwrap();
    vm.alloc_page(&mut space, user_page(2), true).unwrap();

    vm.write_user(&mut space, user_page(0) + 5, &[1, 2, 3]).unwrap();
    // not written to the file before the unmap
    assert_eq!(&file.snapshot()[5..8], &[0, 0, 0]);

    assert_eq!(vm.munmap(&mut space, user_page(0)), 2);
    assert_eq!(&file.snapshot()[5..8], &[1, 2, 3]);
    assert_eq!(vm.stats().write_backs, 1);

    // walk stops at the end of the mapping
    assert_eq!(space.page_count(), 1);
    assert!(space.is_mapped(user_page(2)));
    assert_eq!(vm.munmap(&mut space, user_page(2)), 0);
    assert_eq!(vm.munmap(&mut space, user_page(0)), 0);
    vm.check_integrity();

    vm.teardown(&mut space);
}

#[test]
fn test_munmap_stops_at_other_mapping() {
    let vm = get_test_vm(4, 8);
    let mut space = vm.create_space();
    let file = MemoryBackingFile::new(vec![1u8; PAGE_SIZE]).into_handle();

    vm.mmap(&mut space, user_page(0), PAGE_SIZE, true, &file, 0).unwrap();
    vm.mmap(&mut space, user_page(1), PAGE_SIZE, true, &file, 0).unwrap();

    assert_eq!(vm.munmap(&mut space, user_page(0)), 1);
    assert!(space.is_mapped(user_page(1)));
    assert_eq!(vm.munmap(&mut space, user_page(1)), 1);
    assert_eq!(space.page_count(), 0);
}

#[test]
fn test_clean_eviction_keeps_file() {
    let vm = get_test_vm(1, 8);
    let mut space = vm.create_space();
    let file = MemoryBackingFile::new(vec![1u8; PAGE_SIZE]);

    vm.mmap(&mut space, user_page(0), PAGE_SIZE, false, &file.clone().into_handle(), 0)
        .unwrap();
    vm.alloc_page(&mut space, user_page(1), true).unwrap();

    let mut buffer = [0u8; 4];
    vm.read_user(&mut space, user_page(0), &mut buffer).unwrap();
    assert_eq!(buffer, [1; 4]);

    // somebody else changes the file while the page is resident
    file.write_at(&[7u8; 4], 0).unwrap();

    vm.write_user(&mut space, user_page(1), &[9]).unwrap();
    assert!(!vm.page_info(&space, user_page(0)).unwrap().resident);
    assert_eq!(vm.stats().write_backs, 0);
    assert_eq!(&file.snapshot()[..4], &[7; 4]);

    // page is read from the file again
    vm.read_user(&mut space, user_page(0), &mut buffer).unwrap();
    assert_eq!(buffer, [7; 4]);

    vm.teardown(&mut space);
}

#[test]
fn test_dirty_eviction_writes_back() {
    let vm = get_test_vm(1, 8);
    let mut space = vm.create_space();
    let file = MemoryBackingFile::new(vec![0u8; PAGE_SIZE]);

    vm.mmap(&mut space, user_page(0), PAGE_SIZE, true, &file.clone().into_handle(), 0)
        .unwrap();
    vm.alloc_page(&mut space, user_page(1), true).unwrap();

    vm.write_user(&mut space, user_page(0) + 100, &[5; 8]).unwrap();
    vm.write_user(&mut space, user_page(1), &[9]).unwrap();

    assert_eq!(vm.stats().write_backs, 1);
    assert_eq!(&file.snapshot()[100..108], &[5; 8]);

    // written back page is clean, unmapping does not write again
    let mut buffer = [0u8; 8];
    vm.read_user(&mut space, user_page(0) + 100, &mut buffer).unwrap();
    assert_eq!(buffer, [5; 8]);
    assert_eq!(vm.munmap(&mut space, user_page(0)), 1);
    assert_eq!(vm.stats().write_backs, 1);

    vm.teardown(&mut space);
}

#[test]
fn test_mmap_host_file() {
    let path = "/tmp/test_mmap_host_file.tmp";
    let mut rand = SmallRng::seed_from_u64(SEED);
    let mut content = rand_page(&mut rand);
    content.truncate(3000);
    fs::write(path, &content).unwrap();

    let vm = get_test_vm(2, 8);
    let mut space = vm.create_space();
    let file: FileHandle = Arc::new(HostBackingFile::open(path).unwrap());

    vm.mmap(&mut space, user_page(0), 3000, true, &file, 0).unwrap();
    drop(file);

    let mut buffer = vec![0u8; PAGE_SIZE];
    vm.read_user(&mut space, user_page(0), &mut buffer).unwrap();
    assert_eq!(&buffer[..3000], &content[..]);
    assert!(buffer[3000..].iter().all(|x| *x == 0));

    // writes past the end of the file are not persisted
    vm.write_user(&mut space, user_page(0) + 2990, &[0xee; 20]).unwrap();
    assert_eq!(vm.munmap(&mut space, user_page(0)), 1);

    let written = fs::read(path).unwrap();
    assert_eq!(written.len(), 3000);
    assert_eq!(&written[..2990], &content[..2990]);
    assert_eq!(&written[2990..], &[0xee; 10]);

    vm.teardown(&mut space);
    fs::remove_file(path).unwrap();
}

/// A file whose metadata cannot be read
struct UnreadableFile;

impl BackingFileModule for UnreadableFile {
    fn read_at(&self, _dest: &mut [u8], _offset: usize) -> Result<usize, ()> {
        Err(())
    }

    fn write_at(&self, _src: &[u8], _offset: usize) -> Result<usize, ()> {
        Err(())
    }

    fn length(&self) -> Result<usize, ()> {
        Err(())
    }

    fn reopen(&self) -> Result<FileHandle, ()> {
        Ok(Arc::new(UnreadableFile))
    }
}

#[test]
fn test_mmap_unknown_length() {
    let vm = get_test_vm(2, 8);
    let mut space = vm.create_space();
    let file: FileHandle = Arc::new(UnreadableFile);

    assert_eq!(
        vm.try_mmap(&mut space, user_page(0), PAGE_SIZE, true, &file, 0),
        Err(MmapError::LengthUnavailable)
    );
    assert_eq!(space.page_count(), 0);
}
