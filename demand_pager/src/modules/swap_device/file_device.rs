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

use std::{
    fs::{remove_file, File},
    io::{Read, Seek, SeekFrom, Write},
    mem::ManuallyDrop,
    path::Path,
};

use super::{SwapDeviceModule, SECTOR_SIZE};

/// Swap device that stores its blocks inside of a file of the host.
///
/// The file is created (or truncated) on construction and removed again on drop.
pub struct FileSwapDevice {
    /// underlying file which holds all blocks
    file: ManuallyDrop<File>,

    /// path of file, save for deleting file later
    file_path: String,

    /// cached block count, so no `metadata` call necessary
    block_count: usize,
}

impl FileSwapDevice {
    pub fn new(filepath: String, block_count: usize) -> std::io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .truncate(true)
            .create(true)
            .open(filepath.clone())?;

        file.set_len((block_count * SECTOR_SIZE) as u64)?;

        Ok(Self {
            file: ManuallyDrop::new(file),
            file_path: filepath,
            block_count,
        })
    }

    fn seek_to(&mut self, index: usize) -> Result<(), ()> {
        debug_assert!(
            index < self.block_count,
            "illegal access, block: {}, block_count: {}",
            index,
            self.block_count
        );

        self.file
            .seek(SeekFrom::Start((index * SECTOR_SIZE) as u64))
            .map_err(|_| ())?;
        Ok(())
    }
}

impl SwapDeviceModule for FileSwapDevice {
    fn read_block(&mut self, index: usize, dest: &mut [u8]) -> Result<(), ()> {
        debug_assert_eq!(dest.len(), SECTOR_SIZE);

        self.seek_to(index)?;
        self.file.read_exact(dest).map_err(|_| ())?;

        Ok(())
    }

    fn write_block(&mut self, index: usize, src: &[u8]) -> Result<(), ()> {
        debug_assert_eq!(src.len(), SECTOR_SIZE);

        self.seek_to(index)?;
        self.file.write_all(src).map_err(|_| ())?;

        Ok(())
    }

    fn block_count(&self) -> usize {
        self.block_count
    }
}

impl Drop for FileSwapDevice {
    fn drop(&mut self) {
        // drop and close file before removing
        // note that after this call, file should never be accessed again...
        unsafe {
            ManuallyDrop::drop(&mut self.file);
        }

        if Path::new(self.file_path.as_str()).exists() {
            let _ = remove_file(self.file_path.as_str());
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::super::test::{test_swap_device_blocks, test_swap_device_pages};
    use super::FileSwapDevice;

    #[test]
    fn test_file_swap_device_blocks() {
        let device =
            FileSwapDevice::new("/tmp/test_file_swap_device_blocks.tmp".into(), 16).unwrap();
        test_swap_device_blocks(device);
    }

    #[test]
    fn test_file_swap_device_pages() {
        let device =
            FileSwapDevice::new("/tmp/test_file_swap_device_pages.tmp".into(), 16).unwrap();
        test_swap_device_pages(device);
    }

    #[test]
    fn test_file_swap_device_removes_file() {
        let path = "/tmp/test_file_swap_device_removes_file.tmp";
        let device = FileSwapDevice::new(path.into(), 8).unwrap();
        assert!(Path::new(path).exists());

        drop(device);
        assert!(!Path::new(path).exists());
    }
}
