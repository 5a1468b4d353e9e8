mod soft_page_table;

use crate::{
    addressing::{Kva, Va},
    SpaceId,
};

pub use soft_page_table::SoftPageTable;

/// A present translation of a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// frame the page is mapped to
    pub kva: Kva,
    pub writable: bool,
}

/// The hardware page tables of all address spaces.
///
/// Every address space is identified by its [`SpaceId`], so that a frame can
/// be unmapped from a process that is not the one currently running (which
/// happens during eviction).
///
/// Apart from `install`, which expects a page aligned `va`, all operations
/// act on the page containing `va`.
pub trait PageTableModule {
    /// Maps the page `va` of `space` to the frame `kva`.
    ///
    /// Fails if `va` is already mapped or if the page table cannot be extended.
    fn install(&mut self, space: SpaceId, va: Va, kva: Kva, writable: bool) -> Result<(), ()>;

    /// Removes the mapping of `va`. Does nothing if `va` is not mapped.
    fn clear(&mut self, space: SpaceId, va: Va);

    /// Returns the current translation of `va`
    fn lookup(&self, space: SpaceId, va: Va) -> Option<Mapping>;

    /// Was the page accessed since its accessed bit was cleared the last time?
    ///
    /// Returns `false` if `va` is not mapped.
    fn is_accessed(&self, space: SpaceId, va: Va) -> bool;

    fn clear_accessed(&mut self, space: SpaceId, va: Va);

    /// Was the page written since its dirty bit was cleared the last time?
    ///
    /// Returns `false` if `va` is not mapped.
    fn is_dirty(&self, space: SpaceId, va: Va) -> bool;

    fn clear_dirty(&mut self, space: SpaceId, va: Va);

    /// Updates the accessed (and for writes the dirty) bit of a present
    /// mapping, the way the MMU does on every successful translation.
    fn touch(&mut self, space: SpaceId, va: Va, is_write: bool);
}
