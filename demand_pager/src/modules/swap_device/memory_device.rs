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

use super::{SwapDeviceModule, SECTOR_SIZE};

/// Swap device that keeps its blocks in RAM.
pub struct MemorySwapDevice {
    blocks: Vec<u8>,

    /// if set, every access fails
    failing: bool,
}

impl MemorySwapDevice {
    pub fn new(block_count: usize) -> Self {
        Self {
            blocks: vec![0u8; block_count * SECTOR_SIZE],
            failing: false,
        }
    }

    /// Creates a device with room for `slot_count` pages.
    pub fn with_slots(slot_count: usize) -> Self {
        Self::new(slot_count * super::SECTORS_PER_PAGE)
    }

    /// Makes every following read and write fail, like a broken disk would.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    fn block_range(&self, index: usize) -> core::ops::Range<usize> {
        debug_assert!(
            index < self.block_count(),
            "illegal access, block: {}, block_count: {}",
            index,
            self.block_count()
        );
        index * SECTOR_SIZE..(index + 1) * SECTOR_SIZE
    }
}

impl SwapDeviceModule for MemorySwapDevice {
    fn read_block(&mut self, index: usize, dest: &mut [u8]) -> Result<(), ()> {
        if self.failing {
            return Err(());
        }

        let range = self.block_range(index);
        dest.copy_from_slice(&self.blocks[range]);
        Ok(())
    }

    fn write_block(&mut self, index: usize, src: &[u8]) -> Result<(), ()> {
        if self.failing {
            return Err(());
        }

        let range = self.block_range(index);
        self.blocks[range].copy_from_slice(src);
        Ok(())
    }

    fn block_count(&self) -> usize {
        self.blocks.len() / SECTOR_SIZE
    }
}
