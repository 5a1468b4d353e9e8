/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */


use std::{fs, sync::Arc};

use demand_pager::{
    addressing::{Va, PAGE_SIZE},
    modules::{
        backing_file::{FileHandle, HostBackingFile, MemoryBackingFile},
        frame_allocator::BoundedFrameAllocator,
        page_table::SoftPageTable,
        swap_device::{FileSwapDevice, SECTORS_PER_PAGE},
    },
    AddressSpace, Vm, VmConfig,
};
use log::{info, LevelFilter};
use rand::{rngs::SmallRng, RngCore, SeedableRng};

type DesktopVm = Vm<BoundedFrameAllocator, FileSwapDevice, SoftPageTable>;

const FRAME_COUNT: usize = 16;
const SWAP_SLOTS: usize = 128;
const HEAP_PAGES: usize = 48;

const CODE_START: Va = Va::new(0x40_0000);
const HEAP_START: Va = Va::new(0x1000_0000);
const MAPPING_START: Va = Va::new(0x2000_0000);

const SWAP_PATH: &str = "/tmp/desktop_paging_swap.data";
const MAPPED_FILE_PATH: &str = "/tmp/desktop_paging_mapped.data";

fn main() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default())
        .filter_level(LevelFilter::Info)
        .format_module_path(false)
        .init();

    let vm: DesktopVm = Vm::new(
        BoundedFrameAllocator::new(FRAME_COUNT),
        FileSwapDevice::new(SWAP_PATH.into(), SWAP_SLOTS * SECTORS_PER_PAGE).unwrap(),
        SoftPageTable::new(),
        VmConfig::default(),
    );
    let mut rand = SmallRng::seed_from_u64(0x5eed);

    let mut parent = spawn_process(&vm);
    let heap = fill_heap(&vm, &mut parent, &mut rand);

    fs::write(MAPPED_FILE_PATH, vec![b'.'; 3 * PAGE_SIZE + 100]).unwrap();
    let mapped: FileHandle = Arc::new(HostBackingFile::open(MAPPED_FILE_PATH).unwrap());
    vm.mmap(&mut parent, MAPPING_START, 4 * PAGE_SIZE, true, &mapped, 0)
        .unwrap();
    vm.write_user(&mut parent, MAPPING_START + PAGE_SIZE, b"written by the parent")
        .unwrap();

    let mut child = vm.create_space();
    vm.fork_copy(&mut child, &parent).unwrap();
    info!("Forked {:?} into {:?}", parent.id(), child.id());

    // child scribbles over its copy of the heap, the parent must not notice
    for i in 0..HEAP_PAGES {
        vm.write_user(&mut child, HEAP_START + i * PAGE_SIZE, &[0u8; 64])
            .unwrap();
    }
    vm.write_user(&mut child, MAPPING_START + 3 * PAGE_SIZE, b"written by the child")
        .unwrap();
    vm.munmap(&mut child, MAPPING_START);
    vm.teardown(&mut child);

    verify_heap(&vm, &mut parent, &heap);
    vm.munmap(&mut parent, MAPPING_START);
    vm.teardown(&mut parent);
    vm.check_integrity();

    let content = fs::read(MAPPED_FILE_PATH).unwrap();
    info!(
        "Second page of the mapped file reads {:?}",
        String::from_utf8_lossy(&content[PAGE_SIZE..PAGE_SIZE + 21])
    );
    fs::remove_file(MAPPED_FILE_PATH).unwrap();

    println!("{}", serde_json::to_string_pretty(&vm.stats()).unwrap());
}

/// Creates a process with a small code segment and its initial stack.
fn spawn_process(vm: &DesktopVm) -> AddressSpace {
    let code: Vec<u8> = (0..2 * PAGE_SIZE + 512).map(|i| (i % 256) as u8).collect();
    let executable = MemoryBackingFile::new(code).into_handle();

    let mut space = vm.create_space();
    vm.load_segment(
        &mut space,
        &executable,
        0,
        CODE_START,
        2 * PAGE_SIZE + 512,
        PAGE_SIZE - 512,
        false,
    )
    .unwrap();
    vm.setup_stack(&mut space).unwrap();

    // a few pushes below the initial stack pointer
    let mut rsp = space.user_rsp();
    for frame in 0..3 {
        rsp = rsp - PAGE_SIZE;
        space.set_user_rsp(rsp);
        vm.write_user(&mut space, rsp - 8, &(frame as u64).to_le_bytes())
            .unwrap();
    }

    let mut instruction = [0u8; 16];
    vm.read_user(&mut space, CODE_START + 2 * PAGE_SIZE, &mut instruction)
        .unwrap();

    space
}

fn fill_heap(vm: &DesktopVm, space: &mut AddressSpace, rand: &mut SmallRng) -> Vec<Vec<u8>> {
    (0..HEAP_PAGES)
        .map(|i| {
            let va = HEAP_START + i * PAGE_SIZE;
            let mut data = vec![0u8; PAGE_SIZE];
            rand.fill_bytes(&mut data);

            vm.alloc_page(space, va, true).unwrap();
            vm.write_user(space, va, &data).unwrap();
            data
        })
        .collect()
}

fn verify_heap(vm: &DesktopVm, space: &mut AddressSpace, heap: &[Vec<u8>]) {
    let mut buffer = vec![0u8; PAGE_SIZE];
    for (i, expected) in heap.iter().enumerate() {
        vm.read_user(space, HEAP_START + i * PAGE_SIZE, &mut buffer)
            .unwrap();
        assert_eq!(&buffer, expected, "heap page {} changed", i);
    }

    info!("All {} heap pages of {:?} are intact", heap.len(), space.id());
}
