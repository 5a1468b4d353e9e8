mod file_device;
mod memory_device;

use static_assertions::const_assert;

use crate::addressing::PAGE_SIZE;

pub use file_device::FileSwapDevice;
pub use memory_device::MemorySwapDevice;

/// Size of a single block of the swap device in bytes
pub const SECTOR_SIZE: usize = 512;

/// How many contiguous blocks hold one page
pub const SECTORS_PER_PAGE: usize = PAGE_SIZE / SECTOR_SIZE;

const_assert!(PAGE_SIZE % SECTOR_SIZE == 0);
const_assert!(SECTORS_PER_PAGE == 8);

/// Block device dedicated to swapping.
///
/// Slot `i` of the swap table lives in the blocks
/// `[i * SECTORS_PER_PAGE, (i + 1) * SECTORS_PER_PAGE)`.
pub trait SwapDeviceModule {
    /// Reads block `index` into `dest`, which is exactly [`SECTOR_SIZE`] bytes big.
    ///
    /// If this call fails, it could be that already some data was written to `dest`.
    fn read_block(&mut self, index: usize, dest: &mut [u8]) -> Result<(), ()>;

    /// Writes `src` (exactly [`SECTOR_SIZE`] bytes) to block `index`.
    fn write_block(&mut self, index: usize, src: &[u8]) -> Result<(), ()>;

    /// Returns the number of blocks of this device
    ///
    /// **It is illegal to read/write blocks at or above this index!**
    fn block_count(&self) -> usize;

    /// How many pages fit onto this device
    fn slot_count(&self) -> usize {
        self.block_count() / SECTORS_PER_PAGE
    }

    /// Reads the page stored in `slot` into `dest`.
    fn read_page(&mut self, slot: usize, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert_eq!(dest.len(), PAGE_SIZE);

        for (i, block) in dest.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            self.read_block(slot * SECTORS_PER_PAGE + i, block)?;
        }

        Ok(())
    }

    /// Writes the page `src` to `slot`.
    fn write_page(&mut self, slot: usize, src: &[u8]) -> Result<(), ()> {
        debug_assert_eq!(src.len(), PAGE_SIZE);

        for (i, block) in src.chunks_exact(SECTOR_SIZE).enumerate() {
            self.write_block(slot * SECTORS_PER_PAGE + i, block)?;
        }

        Ok(())
    }
}
