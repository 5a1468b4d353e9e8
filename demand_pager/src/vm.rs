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

use core::{
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::{debug, error, info, trace, warn};
use slab::Slab;

use crate::{
    address_space::{AddressSpace, SpaceId},
    addressing::Va,
    error::{ClaimError, FaultError},
    frame_table::{FrameId, FrameTable},
    modules::{
        frame_allocator::FrameAllocatorModule, page_table::PageTableModule,
        swap_device::SwapDeviceModule,
    },
    page::{
        Materializer, MappingId, PageDescriptor, PageId, PageInfo, PageKind, PageVariant,
    },
    swap_table::SwapTable,
    vm_lock::VmLock,
    VmConfig, VmStats,
};

/// The shared paging state, only accessed while holding the [`VmLock`].
pub(crate) struct VmInner<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> {
    pub(crate) frame_allocator: F,
    pub(crate) swap_device: S,
    pub(crate) page_table: T,

    pub(crate) frames: FrameTable,
    pub(crate) swap: SwapTable,
    pub(crate) pages: Slab<PageDescriptor>,
    pub(crate) stats: VmStats,

    next_mapping: MappingId,
}

/// The virtual memory subsystem.
///
/// Owns the user frame pool, the swap device and the page table and pages
/// the memory of all [`AddressSpace`]s created by it in and out on demand.
pub struct Vm<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> {
    pub(crate) inner: VmLock<VmInner<F, S, T>>,
    pub(crate) config: VmConfig,
    next_space: AtomicUsize,
}

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> Vm<F, S, T> {
    pub fn new(frame_allocator: F, swap_device: S, page_table: T, config: VmConfig) -> Self {
        let slot_count = swap_device.slot_count();
        info!(
            "Initialized virtual memory with {} swap slots (stack top: {}, stack limit: {} bytes)",
            slot_count, config.user_stack_top, config.stack_limit
        );

        Self {
            inner: VmLock::new(VmInner {
                frame_allocator,
                swap_device,
                page_table,
                frames: FrameTable::new(),
                swap: SwapTable::new(slot_count),
                pages: Slab::new(),
                stats: VmStats::default(),
                next_mapping: 0,
            }),
            config,
            next_space: AtomicUsize::new(1),
        }
    }

    #[inline]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Creates a new, empty address space.
    pub fn create_space(&self) -> AddressSpace {
        let id = SpaceId::new(self.next_space.fetch_add(1, Ordering::Relaxed));
        trace!("Create address space {:?}", id);

        AddressSpace::new(id, self.config.user_stack_top)
    }

    /// Registers a pending page at `va` which gets its content from
    /// `materializer` on the first access.
    ///
    /// Fails if `va` is not a page aligned user address or if there
    /// already is a page.
    pub fn alloc_page_with_initializer(
        &self,
        space: &mut AddressSpace,
        va: Va,
        writable: bool,
        materializer: Materializer,
    ) -> Result<(), ()> {
        if !va.is_page_aligned() || !self.config.is_user_address(va) {
            return Err(());
        }

        let desc = PageDescriptor::new(
            space.id(),
            va,
            writable,
            PageVariant::Uninitialized(materializer),
        );

        let mut guard = self.inner.lock();
        guard.register(space, desc).map(|_| ()).map_err(|_| ())
    }

    /// Registers a pending zero filled page at `va`.
    pub fn alloc_page(&self, space: &mut AddressSpace, va: Va, writable: bool) -> Result<(), ()> {
        self.alloc_page_with_initializer(space, va, writable, Materializer::Zero)
    }

    /// Makes the page containing `va` resident right away.
    pub fn claim_page(&self, space: &AddressSpace, va: Va) -> Result<(), FaultError> {
        let page = space.directory.find(va).ok_or(FaultError::WildAccess(va))?;

        let mut guard = self.inner.lock();
        guard
            .claim(page)
            .map_err(|err| FaultError::ClaimFailed(va, err))
    }

    /// Removes the page containing `va` and releases its frame and swap slot.
    ///
    /// Dirty file backed pages are written back first.
    pub fn remove_page(&self, space: &mut AddressSpace, va: Va) -> bool {
        let mut guard = self.inner.lock();
        guard.unregister(space, va)
    }

    pub fn page_info(&self, space: &AddressSpace, va: Va) -> Option<PageInfo> {
        let page = space.directory.find(va)?;
        let guard = self.inner.lock();
        Some(guard.pages[page].info())
    }

    /// Type of the page containing `va`, as it is (or will be) after initialization
    pub fn page_kind(&self, space: &AddressSpace, va: Va) -> Option<PageKind> {
        self.page_info(space, va).map(|info| info.kind)
    }

    /// Releases all pages of `space`.
    ///
    /// Has to be called once the owning process exits.
    pub fn teardown(&self, space: &mut AddressSpace) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let pages = space.directory.take_all();
        debug!("Tear down {:?} with {} pages", space.id(), pages.len());
        for (_, page) in pages {
            inner.destroy(page);
        }
    }

    pub fn stats(&self) -> VmStats {
        self.inner.lock().stats
    }

    /// Number of frames that were ever taken from the frame allocator
    pub fn frame_count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// Number of frames that are currently not used by any page
    pub fn free_frame_count(&self) -> usize {
        self.inner.lock().frames.recycled_count()
    }

    pub fn swap_slot_count(&self) -> usize {
        self.inner.lock().swap.slot_count()
    }

    pub fn swap_slots_in_use(&self) -> usize {
        self.inner.lock().swap.used_count()
    }

    /// Checks that frames and pages reference each other consistently and
    /// that the swap table matches the swapped out pages.
    ///
    /// Panics if this is not the case.
    pub fn check_integrity(&self) {
        self.inner.lock().check_integrity();
    }

    /// Gives all frames back to the frame allocator and returns the modules.
    ///
    /// Pages of address spaces that still exist are lost.
    pub fn into_modules(self) -> (F, S, T) {
        let mut inner = self.inner.into_inner();
        for (_, frame) in inner.frames.iter() {
            inner.frame_allocator.deallocate(frame.kva);
        }

        (inner.frame_allocator, inner.swap_device, inner.page_table)
    }
}

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> VmInner<F, S, T> {
    /// Adds `desc` to the descriptor storage and to the directory of `space`.
    ///
    /// Returns the existing page if the address is already taken.
    pub(crate) fn register(
        &mut self,
        space: &mut AddressSpace,
        desc: PageDescriptor,
    ) -> Result<PageId, PageId> {
        debug_assert_eq!(desc.space, space.id());

        let entry = self.pages.vacant_entry();
        let page = entry.key();
        space.directory.insert(desc.address, page)?;

        trace!("Register page {} of {:?}", desc.address, desc.space);
        entry.insert(desc);
        Ok(page)
    }

    /// Removes the page at `va` from `space` and destroys it.
    pub(crate) fn unregister(&mut self, space: &mut AddressSpace, va: Va) -> bool {
        match space.directory.remove(va) {
            Some(page) => {
                self.destroy(page);
                true
            }
            None => false,
        }
    }

    pub(crate) fn next_mapping_id(&mut self) -> MappingId {
        let id = self.next_mapping;
        self.next_mapping += 1;
        id
    }

    /// Makes `page` resident: acquires a frame, maps it and fills it with
    /// the content of the page.
    ///
    /// On failure, no frame stays linked to the page.
    pub(crate) fn claim(&mut self, page: PageId) -> Result<(), ClaimError> {
        if self.pages[page].resident_frame.is_some() {
            return Ok(());
        }

        let frame = self.acquire_frame()?;
        let kva = self.frames.get(frame).kva;
        let (space, va, writable) = {
            let desc = &self.pages[page];
            (desc.space, desc.address, desc.writable)
        };

        self.link(page, frame);

        if self.page_table.install(space, va, kva, writable).is_err() {
            warn!("Could not map page {} of {:?}", va, space);
            self.unlink(page, frame);
            self.frames.recycle(frame);
            return Err(ClaimError::MapFailed);
        }

        if let Err(err) = self.swap_in(page, frame) {
            warn!("Could not load page {} of {:?}: {:?}", va, space, err);
            self.page_table.clear(space, va);
            self.unlink(page, frame);
            self.frames.recycle(frame);
            return Err(err);
        }

        trace!("Claimed page {} of {:?} (frame: {})", va, space, kva);
        Ok(())
    }

    /// Returns an unused frame, evicting a page if there is no free frame left.
    fn acquire_frame(&mut self) -> Result<FrameId, ClaimError> {
        if let Some(frame) = self.frames.take_recycled() {
            return Ok(frame);
        }

        if let Some(kva) = self.frame_allocator.allocate() {
            self.stats.frames_allocated += 1;
            return Ok(self.frames.register(kva));
        }

        self.evict()
    }

    /// Frees a frame by swapping out its occupant.
    ///
    /// Victims whose swap out fails because the swap is full are skipped.
    fn evict(&mut self) -> Result<FrameId, ClaimError> {
        let mut rejected = Vec::new();

        loop {
            let pages = &self.pages;
            let page_table = &mut self.page_table;
            let victim = self.frames.select_victim(
                |page| {
                    let desc = &pages[page];
                    if page_table.is_accessed(desc.space, desc.address) {
                        page_table.clear_accessed(desc.space, desc.address);
                        true
                    } else {
                        false
                    }
                },
                &rejected,
            );

            let (frame, page) = match victim {
                Some(victim) => victim,
                None if rejected.is_empty() => {
                    warn!("No frame left to evict");
                    return Err(ClaimError::OutOfFrames);
                }
                None => {
                    warn!("Swap is full, no page can be evicted");
                    return Err(ClaimError::SwapFull);
                }
            };

            match self.swap_out(page) {
                Ok(()) => {
                    debug!(
                        "Evicted page {} of {:?} from frame {}",
                        self.pages[page].address,
                        self.pages[page].space,
                        self.frames.get(frame).kva
                    );
                    self.stats.evictions += 1;
                    return Ok(frame);
                }
                Err(ClaimError::SwapFull) => {
                    debug!("No swap slot for the page in frame {}, choosing another victim", frame);
                    rejected.push(frame);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Moves the content of the resident `page` out of its frame and unmaps it.
    ///
    /// The frame stays allocated but has no occupant afterwards.
    pub(crate) fn swap_out(&mut self, page: PageId) -> Result<(), ClaimError> {
        let frame = self.resident_frame(page);
        let kva = self.frames.get(frame).kva;
        let desc = &mut self.pages[page];
        let (space, va) = (desc.space, desc.address);

        match &mut desc.variant {
            PageVariant::Uninitialized(_) => {
                error!("Resident page {} of {:?} is uninitialized", va, space);
                panic!("resident page {} is uninitialized", va);
            }
            PageVariant::Anonymous { swap_slot } => {
                let slot = self.swap.allocate().ok_or(ClaimError::SwapFull)?;
                if self
                    .swap_device
                    .write_page(slot, self.frame_allocator.frame(kva))
                    .is_err()
                {
                    self.swap.free(slot);
                    return Err(ClaimError::Io);
                }

                trace!("Swapped out page {} of {:?} to slot {}", va, space, slot);
                *swap_slot = Some(slot);
                self.stats.swap_outs += 1;
            }
            PageVariant::FileBacked(window) => {
                if self.page_table.is_dirty(space, va) {
                    window
                        .write_back(self.frame_allocator.frame(kva))
                        .map_err(|_| ClaimError::Io)?;
                    self.page_table.clear_dirty(space, va);

                    trace!("Wrote back page {} of {:?}", va, space);
                    self.stats.write_backs += 1;
                }
            }
        }

        self.page_table.clear(space, va);
        self.unlink(page, frame);
        Ok(())
    }

    /// Fills `frame` with the content of `page`.
    pub(crate) fn swap_in(&mut self, page: PageId, frame: FrameId) -> Result<(), ClaimError> {
        let kva = self.frames.get(frame).kva;
        let desc = &mut self.pages[page];
        let va = desc.address;
        let variant = mem::replace(&mut desc.variant, PageVariant::Anonymous { swap_slot: None });
        let data = self.frame_allocator.frame_mut(kva);

        let (variant, result) = match variant {
            PageVariant::Uninitialized(materializer) => match materializer.materialize(data) {
                Ok(variant) => {
                    self.stats.lazy_loads += 1;
                    (variant, Ok(()))
                }
                Err(materializer) => (PageVariant::Uninitialized(materializer), Err(ClaimError::Io)),
            },
            PageVariant::Anonymous {
                swap_slot: Some(slot),
            } => {
                if !self.swap.is_used(slot) {
                    error!("Page {} refers to swap slot {} which is not in use", va, slot);
                    panic!("swap in of unused slot {}", slot);
                }

                match self.swap_device.read_page(slot, data) {
                    Ok(()) => {
                        trace!("Swapped in page {} from slot {}", va, slot);
                        self.swap.free(slot);
                        self.stats.swap_ins += 1;
                        (PageVariant::Anonymous { swap_slot: None }, Ok(()))
                    }
                    Err(()) => (
                        PageVariant::Anonymous {
                            swap_slot: Some(slot),
                        },
                        Err(ClaimError::Io),
                    ),
                }
            }
            PageVariant::Anonymous { swap_slot: None } => {
                // fresh page
                data.fill(0);
                (PageVariant::Anonymous { swap_slot: None }, Ok(()))
            }
            PageVariant::FileBacked(window) => {
                let result = window.load(data).map_err(|_| ClaimError::Io);
                (PageVariant::FileBacked(window), result)
            }
        };

        self.pages[page].variant = variant;
        result
    }

    /// Releases everything `page` holds and drops the descriptor.
    ///
    /// The page has to be removed from its directory already.
    pub(crate) fn destroy(&mut self, page: PageId) {
        let desc = self.pages.remove(page);

        match &desc.variant {
            PageVariant::Uninitialized(_) => {}
            PageVariant::Anonymous { swap_slot } => {
                if let Some(slot) = swap_slot {
                    self.swap.free(*slot);
                }
            }
            PageVariant::FileBacked(window) => {
                if let Some(frame) = desc.resident_frame {
                    if self.page_table.is_dirty(desc.space, desc.address) {
                        let kva = self.frames.get(frame).kva;
                        match window.write_back(self.frame_allocator.frame(kva)) {
                            Ok(()) => self.stats.write_backs += 1,
                            Err(()) => warn!(
                                "Write back of page {} of {:?} failed",
                                desc.address, desc.space
                            ),
                        }
                    }
                }
            }
        }

        if let Some(frame) = desc.resident_frame {
            self.page_table.clear(desc.space, desc.address);
            self.frames.get_mut(frame).occupant = None;
            self.frames.recycle(frame);
        }

        trace!("Destroyed page {} of {:?}", desc.address, desc.space);
    }

    pub(crate) fn resident_frame(&self, page: PageId) -> FrameId {
        match self.pages[page].resident_frame {
            Some(frame) => frame,
            None => {
                error!("Page {} is expected to be resident", self.pages[page].address);
                panic!("page {} is not resident", page);
            }
        }
    }

    fn link(&mut self, page: PageId, frame: FrameId) {
        debug_assert!(self.frames.get(frame).occupant.is_none());
        debug_assert!(self.pages[page].resident_frame.is_none());

        self.frames.get_mut(frame).occupant = Some(page);
        self.pages[page].resident_frame = Some(frame);
    }

    fn unlink(&mut self, page: PageId, frame: FrameId) {
        debug_assert_eq!(self.frames.get(frame).occupant, Some(page));
        debug_assert_eq!(self.pages[page].resident_frame, Some(frame));

        self.frames.get_mut(frame).occupant = None;
        self.pages[page].resident_frame = None;
    }

    pub(crate) fn check_integrity(&self) {
        for (id, frame) in self.frames.iter() {
            if let Some(page) = frame.occupant {
                let desc = self
                    .pages
                    .get(page)
                    .unwrap_or_else(|| panic!("frame {} holds removed page {}", id, page));
                assert_eq!(desc.resident_frame, Some(id), "frame {} is not linked back", id);

                let mapping = self.page_table.lookup(desc.space, desc.address);
                assert_eq!(
                    mapping.map(|mapping| mapping.kva),
                    Some(frame.kva),
                    "page {} is not mapped to its frame",
                    desc.address
                );
                assert!(!matches!(desc.variant, PageVariant::Uninitialized(_)));
            }
        }

        let mut swapped_out = 0;
        for (page, desc) in self.pages.iter() {
            if let Some(frame) = desc.resident_frame {
                assert_eq!(self.frames.get(frame).occupant, Some(page));
            } else {
                assert!(self.page_table.lookup(desc.space, desc.address).is_none());
            }

            if let PageVariant::Anonymous {
                swap_slot: Some(slot),
            } = desc.variant
            {
                assert!(desc.resident_frame.is_none());
                assert!(self.swap.is_used(slot));
                swapped_out += 1;
            }
        }

        assert_eq!(swapped_out, self.swap.used_count());
    }
}
