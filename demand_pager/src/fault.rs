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
    addressing::Va,
    error::FaultError,
    modules::{
        frame_allocator::FrameAllocatorModule, page_table::PageTableModule,
        swap_device::SwapDeviceModule,
    },
    page::{PageDescriptor, PageVariant},
    vm::{Vm, VmInner},
};

/// What the CPU reports about a page fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageFault {
    /// The accessed address
    pub address: Va,

    /// Access happened in user mode
    pub is_user: bool,

    pub is_write: bool,

    /// `false` if the page was present, but the access was not allowed
    pub not_present: bool,
}

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> Vm<F, S, T> {
    /// Resolves a page fault of `space`.
    ///
    /// On success, the faulting access can be retried. On failure the
    /// process owning `space` has to be terminated.
    pub fn handle_fault(&self, space: &mut AddressSpace, fault: PageFault) -> Result<(), FaultError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.stats.faults += 1;

        trace!("Page fault in {:?}: {:?}", space.id(), fault);
        let result = self.resolve_fault(inner, space, &fault);
        if let Err(err) = &result {
            debug!("Unresolvable page fault in {:?}: {:?}", space.id(), err);
            inner.stats.fatal_faults += 1;
        }

        result
    }

    fn resolve_fault(
        &self,
        inner: &mut VmInner<F, S, T>,
        space: &mut AddressSpace,
        fault: &PageFault,
    ) -> Result<(), FaultError> {
        let addr = fault.address;

        if fault.is_user && !self.config.is_user_address(addr) {
            return Err(FaultError::KernelAddress(addr));
        }

        if !fault.not_present {
            return Err(FaultError::ProtectionViolation(addr));
        }

        match space.directory.find(addr) {
            Some(page) => {
                if fault.is_write && !inner.pages[page].writable {
                    return Err(FaultError::WriteToReadOnly(addr));
                }

                inner
                    .claim(page)
                    .map_err(|err| FaultError::ClaimFailed(addr, err))
            }
            None if self.is_stack_access(space, addr) => self.grow_stack(inner, space, addr),
            None => Err(FaultError::WildAccess(addr)),
        }
    }

    /// Is `addr` inside of the stack region and not too far below the stack pointer?
    pub(crate) fn is_stack_access(&self, space: &AddressSpace, addr: Va) -> bool {
        let lowest_allowed = space
            .user_rsp()
            .into_usize()
            .saturating_sub(self.config.stack_margin);

        addr < self.config.user_stack_top
            && addr >= self.config.stack_bottom()
            && addr.into_usize() >= lowest_allowed
    }

    fn grow_stack(
        &self,
        inner: &mut VmInner<F, S, T>,
        space: &mut AddressSpace,
        addr: Va,
    ) -> Result<(), FaultError> {
        let va = addr.page_down();
        let mut desc = PageDescriptor::new(
            space.id(),
            va,
            true,
            PageVariant::Anonymous { swap_slot: None },
        );
        desc.stack = true;

        let page = inner
            .register(space, desc)
            .map_err(|_| FaultError::WildAccess(addr))?;

        if let Err(err) = inner.claim(page) {
            inner.unregister(space, va);
            return Err(FaultError::ClaimFailed(addr, err));
        }

        debug!("Grew stack of {:?} to {}", space.id(), va);
        inner.stats.stack_growths += 1;
        Ok(())
    }
}
