use log::warn;

use crate::{addressing::Va, page_directory::PageDirectory};

/// Identifies a process towards the shared page table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SpaceId(usize);

impl SpaceId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    pub const fn into_usize(self) -> usize {
        self.0
    }
}

/// The virtual memory state owned by a single process.
///
/// Use [`crate::Vm::create_space`] to create one and
/// [`crate::Vm::teardown`] once the process exits.
pub struct AddressSpace {
    id: SpaceId,
    pub(crate) directory: PageDirectory,

    /// user stack pointer at the last user to kernel transition
    user_rsp: Va,
}

impl AddressSpace {
    pub(crate) fn new(id: SpaceId, user_rsp: Va) -> Self {
        Self {
            id,
            directory: PageDirectory::new(),
            user_rsp,
        }
    }

    #[inline]
    pub fn id(&self) -> SpaceId {
        self.id
    }

    #[inline]
    pub fn user_rsp(&self) -> Va {
        self.user_rsp
    }

    /// Records the user stack pointer.
    ///
    /// Has to be called on every transition from user to kernel mode, as
    /// stack growth is decided relative to this value.
    #[inline]
    pub fn set_user_rsp(&mut self, rsp: Va) {
        self.user_rsp = rsp;
    }

    /// Number of pages registered in this address space
    pub fn page_count(&self) -> usize {
        self.directory.len()
    }

    /// Is there a page registered that contains `va`?
    pub fn is_mapped(&self, va: Va) -> bool {
        self.directory.find(va).is_some()
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        if !self.directory.is_empty() {
            warn!(
                "Address space {:?} dropped without teardown, leaking {} pages",
                self.id,
                self.directory.len()
            );
        }
    }
}
