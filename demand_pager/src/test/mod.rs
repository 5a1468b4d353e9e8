use rand::{rngs::SmallRng, RngCore};

use crate::{
    addressing::{Va, PAGE_SIZE},
    modules::{
        frame_allocator::BoundedFrameAllocator, page_table::SoftPageTable,
        swap_device::MemorySwapDevice,
    },
    Vm, VmConfig,
};

mod fork;
mod mmap;

pub(crate) type TestVm = Vm<BoundedFrameAllocator, MemorySwapDevice, SoftPageTable>;

pub(crate) const SEED: u64 = 7816352918823407423;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn get_test_vm(frame_count: usize, swap_slots: usize) -> TestVm {
    init_logging();

    Vm::new(
        BoundedFrameAllocator::new(frame_count),
        MemorySwapDevice::with_slots(swap_slots),
        SoftPageTable::new(),
        VmConfig::default(),
    )
}

/// Some page in the middle of the user address space
pub(crate) fn user_page(index: usize) -> Va {
    Va::new(0x1000_0000 + index * PAGE_SIZE)
}

pub(crate) fn rand_page(rand: &mut SmallRng) -> Vec<u8> {
    let mut data = vec![0u8; PAGE_SIZE];
    rand.fill_bytes(&mut data);
    data
}
