use log::error;

use crate::util::bit_array::BitArray;

/// Keeps track of which swap slots hold the content of a swapped out page.
pub(crate) struct SwapTable {
    used: BitArray,
}

impl SwapTable {
    pub(crate) fn new(slot_count: usize) -> Self {
        Self {
            used: BitArray::new(slot_count),
        }
    }

    /// Reserves a free slot, returns `None` if all slots are in use.
    pub(crate) fn allocate(&mut self) -> Option<usize> {
        self.used.scan_and_set()
    }

    /// Gives `slot` back.
    ///
    /// Panics if the slot is not in use.
    pub(crate) fn free(&mut self, slot: usize) {
        if !self.is_used(slot) {
            error!("Swap slot {} is freed but was not in use", slot);
            panic!("swap slot {} is not in use", slot);
        }

        self.used.set(false, slot);
    }

    pub(crate) fn is_used(&self, slot: usize) -> bool {
        slot < self.used.len() && self.used.is_set(slot)
    }

    pub(crate) fn used_count(&self) -> usize {
        self.used.count_set()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.used.len()
    }
}
