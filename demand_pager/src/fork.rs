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

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    address_space::AddressSpace,
    addressing::Va,
    error::{ClaimError, ForkError},
    modules::{
        backing_file::FileHandle, frame_allocator::FrameAllocatorModule,
        page_table::PageTableModule, swap_device::SwapDeviceModule,
    },
    page::{FileWindow, Materializer, PageDescriptor, PageId, PageVariant},
    vm::{Vm, VmInner},
};

/// Handles reopened for the child, keyed by the parent's handle.
///
/// Pages that share a handle in the parent share the reopened one in the child.
struct ReopenedFiles {
    handles: HashMap<usize, FileHandle>,
}

impl ReopenedFiles {
    fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    fn get(&mut self, window: &FileWindow) -> Result<FileHandle, ()> {
        let key = window.handle_key();
        if let Some(handle) = self.handles.get(&key) {
            return Ok(handle.clone());
        }

        let handle = window.file.reopen()?;
        self.handles.insert(key, handle.clone());
        Ok(handle)
    }
}

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> Vm<F, S, T> {
    /// Copies all pages of `src` into `dst`, which is the address space of a
    /// freshly forked child.
    ///
    /// Anonymous pages are copied right away, pending pages stay pending.
    /// If copying fails, `dst` is left empty.
    pub fn fork_copy(&self, dst: &mut AddressSpace, src: &AddressSpace) -> Result<(), ForkError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let mut files = ReopenedFiles::new();

        dst.set_user_rsp(src.user_rsp());

        for (va, page) in src.directory.iter() {
            if let Err(err) = inner.fork_page(dst, va, page, &mut files) {
                warn!("Fork of {:?} failed at {}: {:?}", src.id(), va, err);
                for (_, page) in dst.directory.take_all() {
                    inner.destroy(page);
                }
                return Err(err);
            }
        }

        debug!(
            "Copied {} pages from {:?} to {:?}",
            src.page_count(),
            src.id(),
            dst.id()
        );
        Ok(())
    }
}

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> VmInner<F, S, T> {
    fn fork_page(
        &mut self,
        dst: &mut AddressSpace,
        va: Va,
        page: PageId,
        files: &mut ReopenedFiles,
    ) -> Result<(), ForkError> {
        let (writable, stack, mapping) = {
            let desc = &self.pages[page];
            (desc.writable, desc.stack, desc.mapping)
        };

        let variant = match &self.pages[page].variant {
            PageVariant::Uninitialized(materializer) => {
                let copy = materializer
                    .deep_copy(|window| files.get(window))
                    .map_err(|_| ForkError::ReopenFailed(va))?;
                PageVariant::Uninitialized(copy)
            }
            PageVariant::Anonymous { .. } => {
                return self.fork_anonymous_page(dst, va, page);
            }
            PageVariant::FileBacked(window) => {
                let window = window.clone();
                self.write_back_if_dirty(page, &window)
                    .map_err(|err| ForkError::ClaimFailed(va, err))?;

                let file = files.get(&window).map_err(|_| ForkError::ReopenFailed(va))?;
                PageVariant::Uninitialized(Materializer::MappedFile(window.with_file(file)))
            }
        };

        let mut desc = PageDescriptor::new(dst.id(), va, writable, variant);
        desc.stack = stack;
        desc.mapping = mapping;
        self.register(dst, desc)
            .map_err(|_| ForkError::AlreadyMapped(va))?;

        Ok(())
    }

    /// Gives the child its own frame with a copy of the content of `page`.
    fn fork_anonymous_page(
        &mut self,
        dst: &mut AddressSpace,
        va: Va,
        page: PageId,
    ) -> Result<(), ForkError> {
        // parent's content has to be in a frame to copy it
        self.claim(page)
            .map_err(|err| ForkError::ClaimFailed(va, err))?;
        let src_frame = self.resident_frame(page);

        let (writable, stack) = {
            let desc = &self.pages[page];
            (desc.writable, desc.stack)
        };
        let mut desc = PageDescriptor::new(
            dst.id(),
            va,
            writable,
            PageVariant::Anonymous { swap_slot: None },
        );
        desc.stack = stack;
        let child = self
            .register(dst, desc)
            .map_err(|_| ForkError::AlreadyMapped(va))?;

        self.frames.get_mut(src_frame).pinned = true;
        let result = self.claim(child);
        self.frames.get_mut(src_frame).pinned = false;
        result.map_err(|err| ForkError::ClaimFailed(va, err))?;

        let dst_frame = self.resident_frame(child);
        let (src_kva, dst_kva) = (self.frames.get(src_frame).kva, self.frames.get(dst_frame).kva);
        self.frame_allocator.copy_frame(src_kva, dst_kva);

        Ok(())
    }

    fn write_back_if_dirty(&mut self, page: PageId, window: &FileWindow) -> Result<(), ClaimError> {
        let frame = match self.pages[page].resident_frame {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let (space, va) = (self.pages[page].space, self.pages[page].address);

        if self.page_table.is_dirty(space, va) {
            let kva = self.frames.get(frame).kva;
            window
                .write_back(self.frame_allocator.frame(kva))
                .map_err(|_| ClaimError::Io)?;
            self.page_table.clear_dirty(space, va);
            self.stats.write_backs += 1;
        }

        Ok(())
    }
}
