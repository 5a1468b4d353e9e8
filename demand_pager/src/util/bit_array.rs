use crate::util::div_ceil;

/// Fixed size list of bits.
pub(crate) struct BitArray {
    arr: Box<[u8]>,
    bit_count: usize,
}

impl BitArray {
    /// Creates a new array with `bit_count` bits that are all unset.
    pub(crate) fn new(bit_count: usize) -> Self {
        BitArray {
            arr: vec![0u8; div_ceil(bit_count, 8)].into_boxed_slice(),
            bit_count,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bit_count
    }

    pub(crate) fn set(&mut self, value: bool, index: usize) {
        debug_assert!(index < self.bit_count, "index {} out of bounds", index);

        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = &mut self.arr[arr_index];
        if value {
            // set bit
            *item |= 1u8 << internal_index;
        } else {
            // unset bit
            *item &= !(1u8 << internal_index);
        }
    }

    pub(crate) fn is_set(&self, index: usize) -> bool {
        debug_assert!(index < self.bit_count, "index {} out of bounds", index);

        let arr_index = index / 8;
        let internal_index = index % 8;

        let item = self.arr[arr_index];
        (item & (1u8 << internal_index)) != 0
    }

    /// Finds the first unset bit, sets it and returns its index.
    pub(crate) fn scan_and_set(&mut self) -> Option<usize> {
        for (arr_index, item) in self.arr.iter_mut().enumerate() {
            if *item == u8::MAX {
                // fast path: all bits of this byte are in use
                continue;
            }

            let internal_index = item.trailing_ones() as usize;
            let index = arr_index * 8 + internal_index;
            if index >= self.bit_count {
                return None;
            }

            *item |= 1u8 << internal_index;
            return Some(index);
        }

        None
    }

    /// How many bits are set right now?
    pub(crate) fn count_set(&self) -> usize {
        self.arr.iter().map(|item| item.count_ones() as usize).sum()
    }
}
