//! Loads and stores to user memory, performed like the CPU would do them.
//!
//! An access goes through the page table. If it misses (or is not allowed)
//! a page fault is raised and the access is retried once the fault is
//! resolved. Successful accesses set the accessed (and dirty) bits.

use crate::{
    address_space::AddressSpace,
    addressing::{Va, PAGE_SIZE},
    error::FaultError,
    fault::PageFault,
    modules::{
        frame_allocator::FrameAllocatorModule, page_table::PageTableModule,
        swap_device::SwapDeviceModule,
    },
    vm::Vm,
};

impl<F: FrameAllocatorModule, S: SwapDeviceModule, T: PageTableModule> Vm<F, S, T> {
    /// Reads `dest.len()` bytes of user memory starting at `addr`.
    pub fn read_user(
        &self,
        space: &mut AddressSpace,
        addr: Va,
        dest: &mut [u8],
    ) -> Result<(), FaultError> {
        let mut done = 0;
        while done < dest.len() {
            let va = addr
                .checked_add(done)
                .ok_or(FaultError::KernelAddress(addr))?;
            let count = (PAGE_SIZE - va.page_offset()).min(dest.len() - done);

            let chunk = &mut dest[done..done + count];
            self.with_user_page(space, va, false, |data| {
                chunk.copy_from_slice(&data[..count]);
            })?;

            done += count;
        }

        Ok(())
    }

    /// Writes `src` to user memory starting at `addr`.
    pub fn write_user(&self, space: &mut AddressSpace, addr: Va, src: &[u8]) -> Result<(), FaultError> {
        let mut done = 0;
        while done < src.len() {
            let va = addr
                .checked_add(done)
                .ok_or(FaultError::KernelAddress(addr))?;
            let count = (PAGE_SIZE - va.page_offset()).min(src.len() - done);

            let chunk = &src[done..done + count];
            self.with_user_page(space, va, true, |data| {
                data[..count].copy_from_slice(chunk);
            })?;

            done += count;
        }

        Ok(())
    }

    /// Checks if `[addr, addr + len)` may be accessed without materializing it.
    ///
    /// Every page of the range has to be registered (and writable for
    /// writes) or be a valid stack growth.
    pub fn access_ok(&self, space: &AddressSpace, addr: Va, len: usize, is_write: bool) -> bool {
        if len == 0 {
            return true;
        }

        let end = match addr.checked_add(len) {
            Some(end) if end <= self.config.kernel_base => end,
            _ => return false,
        };

        let guard = self.inner.lock();
        let mut va = addr.page_down();
        while va < end {
            match space.directory.find(va) {
                Some(page) => {
                    if is_write && !guard.pages[page].writable {
                        return false;
                    }
                }
                None => {
                    // the first byte of the range counts for a page that is partially covered
                    let probe = if va < addr { addr } else { va };
                    if !self.is_stack_access(space, probe) {
                        return false;
                    }
                }
            }

            va = va + PAGE_SIZE;
        }

        true
    }

    /// Runs `f` on the bytes of the page containing `va`, starting at `va`.
    ///
    /// Faults in the page first if needed.
    fn with_user_page<R, C: FnOnce(&mut [u8]) -> R>(
        &self,
        space: &mut AddressSpace,
        va: Va,
        is_write: bool,
        f: C,
    ) -> Result<R, FaultError> {
        loop {
            let not_present = {
                let mut guard = self.inner.lock();
                let inner = &mut *guard;

                match inner.page_table.lookup(space.id(), va) {
                    Some(mapping) if mapping.writable || !is_write => {
                        inner.page_table.touch(space.id(), va, is_write);
                        let data = inner.frame_allocator.frame_mut(mapping.kva);
                        return Ok(f(&mut data[va.page_offset()..]));
                    }
                    mapping => mapping.is_none(),
                }
            };

            self.handle_fault(
                space,
                PageFault {
                    address: va,
                    is_user: true,
                    is_write,
                    not_present,
                },
            )?;
        }
    }
}
