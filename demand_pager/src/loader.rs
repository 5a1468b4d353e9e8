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

use log::debug;

use crate::{
    address_space::AddressSpace,
    addressing::{Va, PAGE_SIZE},
    error::FaultError,
    modules::{
        backing_file::FileHandle, frame_allocator::FrameAllocatorModule,
        page_table::PageTableModule, swap_device::SwapDeviceModule,
    },
    page::{FileWindow, Materializer, PageDescriptor, PageVariant},
    vm::Vm,
};

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> Vm<F, S, T> {
    /// Registers the pages of an executable segment.
    ///
    /// Starting at `upage`, `read_bytes` bytes are read from `file` at
    /// `offset` and followed by `zero_bytes` zeroes. Nothing is read until the
    /// pages are accessed.
    ///
    /// Fails if one of the pages is already registered, in that case no page
    /// of this segment stays registered.
    pub fn load_segment(
        &self,
        space: &mut AddressSpace,
        file: &FileHandle,
        offset: usize,
        upage: Va,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> Result<(), ()> {
        assert_eq!((read_bytes + zero_bytes) % PAGE_SIZE, 0);
        assert!(upage.is_page_aligned());
        assert_eq!(offset % PAGE_SIZE, 0);

        let page_count = (read_bytes + zero_bytes) / PAGE_SIZE;
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mut remaining = read_bytes;
        for i in 0..page_count {
            let va = upage + i * PAGE_SIZE;
            let read_length = remaining.min(PAGE_SIZE);
            remaining -= read_length;

            let window = FileWindow::new(file.clone(), offset + i * PAGE_SIZE, read_length);
            let desc = PageDescriptor::new(
                space.id(),
                va,
                writable,
                PageVariant::Uninitialized(Materializer::Segment(window)),
            );

            if inner.register(space, desc).is_err() {
                for j in 0..i {
                    inner.unregister(space, upage + j * PAGE_SIZE);
                }
                return Err(());
            }
        }

        debug!(
            "Registered segment of {} pages at {} in {:?}",
            page_count,
            upage,
            space.id()
        );
        Ok(())
    }

    /// Creates the first page of the stack right below the stack top and
    /// points the recorded stack pointer at the top.
    pub fn setup_stack(&self, space: &mut AddressSpace) -> Result<(), FaultError> {
        let top = self.config.user_stack_top;
        let va = top - PAGE_SIZE;

        let mut desc = PageDescriptor::new(
            space.id(),
            va,
            true,
            PageVariant::Anonymous { swap_slot: None },
        );
        desc.stack = true;

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let page = inner
            .register(space, desc)
            .map_err(|_| FaultError::WildAccess(va))?;
        if let Err(err) = inner.claim(page) {
            inner.unregister(space, va);
            return Err(FaultError::ClaimFailed(va, err));
        }

        space.set_user_rsp(top);
        Ok(())
    }
}
