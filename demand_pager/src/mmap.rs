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

use log::{debug, trace};

use crate::{
    address_space::AddressSpace,
    addressing::{Va, PAGE_MASK, PAGE_SIZE},
    error::MmapError,
    modules::{
        backing_file::FileHandle, frame_allocator::FrameAllocatorModule,
        page_table::PageTableModule, swap_device::SwapDeviceModule,
    },
    page::{FileWindow, Materializer, PageDescriptor, PageVariant},
    vm::Vm,
};

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> Vm<F, S, T> {
    /// Maps `length` bytes of `file`, starting at `offset`, to `addr`.
    ///
    /// Returns the start of the mapping or `None` if the request is invalid.
    /// See [`Vm::try_mmap`] for the reason of a rejection.
    pub fn mmap(
        &self,
        space: &mut AddressSpace,
        addr: Va,
        length: usize,
        writable: bool,
        file: &FileHandle,
        offset: usize,
    ) -> Option<Va> {
        self.try_mmap(space, addr, length, writable, file, offset)
            .ok()
    }

    pub fn try_mmap(
        &self,
        space: &mut AddressSpace,
        addr: Va,
        length: usize,
        writable: bool,
        file: &FileHandle,
        offset: usize,
    ) -> Result<Va, MmapError> {
        if length == 0 {
            return Err(MmapError::ZeroLength);
        }
        if file.is_console() {
            return Err(MmapError::ConsoleFile);
        }
        if addr == Va::ZERO {
            return Err(MmapError::NullAddress);
        }
        if !addr.is_page_aligned() {
            return Err(MmapError::UnalignedAddress);
        }

        let page_count = length
            .checked_add(PAGE_MASK)
            .map(|size| size / PAGE_SIZE)
            .ok_or(MmapError::OutsideUserSpace)?;
        let end = page_count
            .checked_mul(PAGE_SIZE)
            .and_then(|size| addr.checked_add(size))
            .ok_or(MmapError::OutsideUserSpace)?;
        if end > self.config.kernel_base {
            return Err(MmapError::OutsideUserSpace);
        }
        if let Some(existing) = space.directory.first_in_range(addr, end) {
            return Err(MmapError::Overlap(existing));
        }

        if offset % PAGE_SIZE != 0 {
            return Err(MmapError::UnalignedOffset);
        }
        let file_length = file.length().map_err(|_| MmapError::LengthUnavailable)?;
        if file_length == 0 {
            return Err(MmapError::EmptyFile);
        }
        if offset >= file_length {
            return Err(MmapError::OffsetBeyondEnd);
        }

        let file = file.reopen().map_err(|_| MmapError::ReopenFailed)?;

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let mapping = inner.next_mapping_id();

        let mut remaining = length.min(file_length - offset);
        for i in 0..page_count {
            let va = addr + i * PAGE_SIZE;
            let read_length = remaining.min(PAGE_SIZE);
            remaining -= read_length;

            let window = FileWindow::new(file.clone(), offset + i * PAGE_SIZE, read_length);
            let mut desc = PageDescriptor::new(
                space.id(),
                va,
                writable,
                PageVariant::Uninitialized(Materializer::MappedFile(window)),
            );
            desc.mapping = Some(mapping);

            if let Err(existing) = inner.register(space, desc) {
                // roll back what was created so far
                for j in 0..i {
                    inner.unregister(space, addr + j * PAGE_SIZE);
                }
                return Err(MmapError::Overlap(inner.pages[existing].address));
            }
        }

        debug!(
            "Mapped {} bytes of file at offset {} to {}..{} in {:?}",
            length,
            offset,
            addr,
            end,
            space.id()
        );
        Ok(addr)
    }

    /// Unmaps the mapping that starts at `addr`.
    ///
    /// Dirty pages are written back to the file. Returns how many pages were
    /// unmapped, which is `0` if `addr` is not inside of a file mapping.
    pub fn munmap(&self, space: &mut AddressSpace, addr: Va) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mapping = match space
            .directory
            .find(addr)
            .and_then(|page| inner.pages[page].mapping)
        {
            Some(mapping) => mapping,
            None => return 0,
        };

        let mut va = addr.page_down();
        let mut count = 0;
        while let Some(page) = space.directory.find(va) {
            if inner.pages[page].mapping != Some(mapping) {
                break;
            }

            trace!("Unmap page {} of {:?}", va, space.id());
            inner.unregister(space, va);
            count += 1;

            va = match va.checked_add(PAGE_SIZE) {
                Some(next) => next,
                None => break,
            };
        }

        debug!("Unmapped {} pages at {} in {:?}", count, addr, space.id());
        count
    }
}
