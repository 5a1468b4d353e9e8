use rand::{rngs::SmallRng, SeedableRng};

use super::{get_test_vm, rand_page, user_page, SEED};
use crate::{
    addressing::PAGE_SIZE,
    error::{ClaimError, ForkError},
    modules::backing_file::MemoryBackingFile,
};

#[test]
fn test_fork_isolation() {
    let vm = get_test_vm(4, 16);
    let mut parent = vm.create_space();
    let mut rand = SmallRng::seed_from_u64(SEED);

    vm.setup_stack(&mut parent).unwrap();
    let contents: Vec<Vec<u8>> = (0..3).map(|_| rand_page(&mut rand)).collect();
    for (i, data) in contents.iter().enumerate() {
        vm.alloc_page(&mut parent, user_page(i), true).unwrap();
        vm.write_user(&mut parent, user_page(i), data).unwrap();
    }

    let mut child = vm.create_space();
    vm.fork_copy(&mut child, &parent).unwrap();
    assert_eq!(child.page_count(), parent.page_count());
    assert_eq!(child.user_rsp(), parent.user_rsp());
    vm.check_integrity();

    vm.write_user(&mut child, user_page(0), &[0xbb; 16]).unwrap();
    vm.write_user(&mut parent, user_page(1), &[0xaa; 16]).unwrap();

    let mut buffer = vec![0u8; PAGE_SIZE];
    vm.read_user(&mut parent, user_page(0), &mut buffer).unwrap();
    assert_eq!(buffer, contents[0]);
    vm.read_user(&mut child, user_page(0), &mut buffer).unwrap();
    assert_eq!(&buffer[..16], &[0xbb; 16]);
    assert_eq!(&buffer[16..], &contents[0][16..]);

    vm.read_user(&mut child, user_page(1), &mut buffer).unwrap();
    assert_eq!(buffer, contents[1]);
    vm.read_user(&mut child, user_page(2), &mut buffer).unwrap();
    assert_eq!(buffer, contents[2]);

    let stack_top = vm.config().user_stack_top;
    assert!(vm.page_info(&child, stack_top - 1).unwrap().stack);
    vm.check_integrity();

    vm.teardown(&mut child);
    vm.teardown(&mut parent);
    assert_eq!(vm.swap_slots_in_use(), 0);
    vm.check_integrity();
}

#[test]
fn test_fork_keeps_pending_pages() {
    let vm = get_test_vm(2, 8);
    let mut parent = vm.create_space();
    let file = MemoryBackingFile::new(vec![3u8; 2 * PAGE_SIZE]);

    vm.load_segment(
        &mut parent,
        &file.clone().into_handle(),
        0,
        user_page(0),
        2 * PAGE_SIZE,
        0,
        true,
    )
    .unwrap();
    // segment pages share one handle
    assert_eq!(file.open_handles(), 2);

    let mut child = vm.create_space();
    vm.fork_copy(&mut child, &parent).unwrap();

    // child got one reopened handle for both pages
    assert_eq!(file.open_handles(), 3);
    for i in 0..2 {
        assert!(vm.page_info(&parent, user_page(i)).unwrap().pending);
        assert!(vm.page_info(&child, user_page(i)).unwrap().pending);
    }
    assert_eq!(vm.stats().lazy_loads, 0);

    let mut buffer = [0u8; 4];
    vm.read_user(&mut child, user_page(1), &mut buffer).unwrap();
    assert_eq!(buffer, [3; 4]);
    assert!(vm.page_info(&parent, user_page(1)).unwrap().pending);

    vm.teardown(&mut child);
    assert_eq!(file.open_handles(), 2);
    vm.teardown(&mut parent);
    assert_eq!(file.open_handles(), 1);
}

#[test]
fn test_fork_mapped_file() {
    let vm = get_test_vm(4, 8);
    let mut parent = vm.create_space();
    let file = MemoryBackingFile::new(vec![0u8; 2 * PAGE_SIZE]);

    vm.mmap(&mut parent, user_page(0), 2 * PAGE_SIZE, true, &file.clone().into_handle(), 0)
        .unwrap();
    vm.write_user(&mut parent, user_page(0), &[4; 4]).unwrap();

    let mut child = vm.create_space();
    vm.fork_copy(&mut child, &parent).unwrap();

    // dirty page was written back so the child sees the same content
    assert_eq!(&file.snapshot()[..4], &[4; 4]);
    let info = vm.page_info(&child, user_page(0)).unwrap();
    assert!(info.pending);
    assert!(info.mapped_file);

    let mut buffer = [0u8; 4];
    vm.read_user(&mut child, user_page(0), &mut buffer).unwrap();
    assert_eq!(buffer, [4; 4]);

    vm.write_user(&mut child, user_page(1) + 8, &[6; 4]).unwrap();
    assert_eq!(vm.munmap(&mut child, user_page(0)), 2);
    assert_eq!(&file.snapshot()[PAGE_SIZE + 8..PAGE_SIZE + 12], &[6; 4]);
    assert_eq!(child.page_count(), 0);

    // parent mapping is untouched
    assert_eq!(parent.page_count(), 2);
    assert_eq!(vm.munmap(&mut parent, user_page(0)), 2);
    vm.check_integrity();
}

#[test]
fn test_fork_failure_leaves_child_empty() {
    let vm = get_test_vm(1, 0);
    let mut parent = vm.create_space();

    vm.alloc_page(&mut parent, user_page(0), true).unwrap();
    vm.alloc_page(&mut parent, user_page(1), true).unwrap();
    vm.write_user(&mut parent, user_page(0), &[8; 8]).unwrap();

    let mut child = vm.create_space();
    assert_eq!(
        vm.fork_copy(&mut child, &parent),
        Err(ForkError::ClaimFailed(user_page(0), ClaimError::OutOfFrames))
    );
    assert_eq!(child.page_count(), 0);
    vm.check_integrity();

    let mut buffer = [0u8; 8];
    vm.read_user(&mut parent, user_page(0), &mut buffer).unwrap();
    assert_eq!(buffer, [8; 8]);
    assert_eq!(vm.free_frame_count(), 0);

    vm.teardown(&mut parent);
}
