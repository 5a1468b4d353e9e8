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

use std::sync::{Arc, Mutex};

use super::{BackingFileModule, FileHandle};

/// A file whose content lives in RAM.
///
/// Clones and reopened handles share the same content.
#[derive(Clone)]
pub struct MemoryBackingFile {
    content: Arc<Mutex<Vec<u8>>>,
    console: bool,
}

impl MemoryBackingFile {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content: Arc::new(Mutex::new(content)),
            console: false,
        }
    }

    /// A handle that behaves like the console
    pub fn console() -> Self {
        Self {
            content: Arc::new(Mutex::new(Vec::new())),
            console: true,
        }
    }

    /// Returns a copy of the current content
    pub fn snapshot(&self) -> Vec<u8> {
        match self.content.lock() {
            Ok(content) => content.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of handles that are still open on this file (including this one)
    pub fn open_handles(&self) -> usize {
        Arc::strong_count(&self.content)
    }

    /// Wraps this handle so it can be used for mappings
    pub fn into_handle(self) -> FileHandle {
        Arc::new(self)
    }
}

impl BackingFileModule for MemoryBackingFile {
    fn read_at(&self, dest: &mut [u8], offset: usize) -> Result<usize, ()> {
        let content = self.content.lock().map_err(|_| ())?;
        if offset >= content.len() {
            return Ok(0);
        }

        let count = dest.len().min(content.len() - offset);
        dest[..count].copy_from_slice(&content[offset..offset + count]);
        Ok(count)
    }

    fn write_at(&self, src: &[u8], offset: usize) -> Result<usize, ()> {
        let mut content = self.content.lock().map_err(|_| ())?;
        if offset >= content.len() {
            return Ok(0);
        }

        let count = src.len().min(content.len() - offset);
        content[offset..offset + count].copy_from_slice(&src[..count]);
        Ok(count)
    }

    fn length(&self) -> Result<usize, ()> {
        self.content.lock().map(|content| content.len()).map_err(|_| ())
    }

    fn reopen(&self) -> Result<FileHandle, ()> {
        Ok(Arc::new(self.clone()))
    }

    fn is_console(&self) -> bool {
        self.console
    }
}

#[cfg(test)]
mod test {
    use super::super::test::{test_backing_file_read_write, test_backing_file_reopen};
    use super::MemoryBackingFile;
    use crate::modules::backing_file::BackingFileModule;

    #[test]
    fn test_memory_file_read_write() {
        test_backing_file_read_write(&MemoryBackingFile::new(vec![0u8; 100]));
    }

    #[test]
    fn test_memory_file_reopen() {
        let file = MemoryBackingFile::new(vec![0u8; 10]);
        test_backing_file_reopen(&file);

        // the reopened handle was dropped again
        assert_eq!(file.open_handles(), 1);

        let reopened = file.reopen().unwrap();
        assert_eq!(file.open_handles(), 2);
        drop(reopened);
        assert_eq!(file.open_handles(), 1);
    }

    #[test]
    fn test_memory_file_console() {
        assert!(MemoryBackingFile::console().is_console());
        assert!(!MemoryBackingFile::new(vec![1]).is_console());
    }
}
