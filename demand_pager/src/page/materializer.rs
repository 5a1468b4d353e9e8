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

use std::sync::Arc;

use log::trace;

use super::{PageKind, PageVariant};
use crate::{addressing::PAGE_SIZE, modules::backing_file::FileHandle};

/// A page sized window into a file.
///
/// The first `read_length` bytes of the page come from the file at `offset`,
/// the remaining `zero_length` bytes are zero.
#[derive(Clone)]
pub struct FileWindow {
    pub file: FileHandle,
    pub offset: usize,
    pub read_length: usize,
    pub zero_length: usize,
}

impl FileWindow {
    pub fn new(file: FileHandle, offset: usize, read_length: usize) -> Self {
        debug_assert!(read_length <= PAGE_SIZE);

        Self {
            file,
            offset,
            read_length,
            zero_length: PAGE_SIZE - read_length,
        }
    }

    /// Same window, but on another handle of the file
    pub(crate) fn with_file(&self, file: FileHandle) -> Self {
        Self {
            file,
            offset: self.offset,
            read_length: self.read_length,
            zero_length: self.zero_length,
        }
    }

    /// Fills `frame` with the content of this window.
    pub(crate) fn load(&self, frame: &mut [u8]) -> Result<(), ()> {
        debug_assert_eq!(self.read_length + self.zero_length, PAGE_SIZE);

        let (data, zeroes) = frame.split_at_mut(self.read_length);
        let read = self.file.read_at(data, self.offset)?;
        if read != self.read_length {
            // file got shorter than it was when the page was registered
            return Err(());
        }
        zeroes.fill(0);

        Ok(())
    }

    /// Writes the part of `frame` that belongs to the file back to it.
    pub(crate) fn write_back(&self, frame: &[u8]) -> Result<(), ()> {
        let written = self.file.write_at(&frame[..self.read_length], self.offset)?;
        if written != self.read_length {
            return Err(());
        }

        Ok(())
    }

    /// Identifies the handle of this window, so that windows sharing a
    /// handle can be told apart from windows that do not.
    pub(crate) fn handle_key(&self) -> usize {
        Arc::as_ptr(&self.file) as *const () as usize
    }
}

/// Describes how a pending page gets its initial content.
///
/// This is plain data on purpose: copying a pending page (on fork) only has
/// to copy this description.
#[derive(Clone)]
pub enum Materializer {
    /// Page is filled with zeroes, becomes anonymous memory
    Zero,

    /// Page of a loaded executable segment, becomes anonymous memory once loaded
    Segment(FileWindow),

    /// Page of a memory mapped file, stays backed by that file
    MappedFile(FileWindow),
}

impl Materializer {
    /// The kind the page will have once it is initialized
    pub fn kind(&self) -> PageKind {
        match self {
            Materializer::Zero | Materializer::Segment(_) => PageKind::Anonymous,
            Materializer::MappedFile(_) => PageKind::FileBacked,
        }
    }

    #[cfg(test)]
    pub(crate) fn window(&self) -> Option<&FileWindow> {
        match self {
            Materializer::Zero => None,
            Materializer::Segment(window) | Materializer::MappedFile(window) => Some(window),
        }
    }

    /// Same materializer, but every file handle is replaced by `reopen(handle)`
    pub(crate) fn deep_copy<F: FnMut(&FileWindow) -> Result<FileHandle, ()>>(
        &self,
        mut reopen: F,
    ) -> Result<Self, ()> {
        Ok(match self {
            Materializer::Zero => Materializer::Zero,
            Materializer::Segment(window) => Materializer::Segment(window.with_file(reopen(window)?)),
            Materializer::MappedFile(window) => {
                Materializer::MappedFile(window.with_file(reopen(window)?))
            }
        })
    }

    /// Fills `frame` and returns the final variant of the page.
    ///
    /// On failure, the materializer is handed back so the page stays pending.
    pub(crate) fn materialize(self, frame: &mut [u8]) -> Result<PageVariant, Self> {
        match self {
            Materializer::Zero => {
                trace!("Materialize zero page");
                frame.fill(0);
                Ok(PageVariant::Anonymous { swap_slot: None })
            }
            Materializer::Segment(window) => {
                trace!(
                    "Materialize segment page (offset: {}, read: {})",
                    window.offset,
                    window.read_length
                );
                match window.load(frame) {
                    Ok(()) => Ok(PageVariant::Anonymous { swap_slot: None }),
                    Err(()) => Err(Materializer::Segment(window)),
                }
            }
            Materializer::MappedFile(window) => {
                trace!(
                    "Materialize mapped file page (offset: {}, read: {})",
                    window.offset,
                    window.read_length
                );
                match window.load(frame) {
                    Ok(()) => Ok(PageVariant::FileBacked(window)),
                    Err(()) => Err(Materializer::MappedFile(window)),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{FileWindow, Materializer};
    use crate::{
        addressing::PAGE_SIZE,
        modules::backing_file::{BackingFileModule, MemoryBackingFile},
        page::{PageKind, PageVariant},
    };

    #[test]
    fn test_window_partial_page() {
        let file = MemoryBackingFile::new((1..=10).collect());
        let window = FileWindow::new(file.into_handle(), 0, 10);
        assert_eq!(window.zero_length, PAGE_SIZE - 10);

        let mut frame = vec![0xffu8; PAGE_SIZE];
        window.load(&mut frame).unwrap();

        assert_eq!(&frame[..10], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert!(frame[10..].iter().all(|x| *x == 0));
    }

    #[test]
    fn test_window_short_file() {
        let file = MemoryBackingFile::new(vec![1u8; 10]);
        // window claims more bytes than the file has
        let window = FileWindow::new(file.into_handle(), 4, 10);

        let mut frame = vec![0u8; PAGE_SIZE];
        assert!(window.load(&mut frame).is_err());
    }

    #[test]
    fn test_window_write_back() {
        let file = MemoryBackingFile::new(vec![0u8; PAGE_SIZE + 20]);
        let window = FileWindow::new(file.clone().into_handle(), PAGE_SIZE, 20);

        let frame = vec![7u8; PAGE_SIZE];
        window.write_back(&frame).unwrap();

        let content = file.snapshot();
        assert!(content[..PAGE_SIZE].iter().all(|x| *x == 0));
        assert!(content[PAGE_SIZE..].iter().all(|x| *x == 7));
    }

    #[test]
    fn test_materialize_variants() {
        let file = MemoryBackingFile::new(vec![3u8; PAGE_SIZE]).into_handle();
        let mut frame = vec![0xffu8; PAGE_SIZE];

        let zero = Materializer::Zero;
        assert_eq!(zero.kind(), PageKind::Anonymous);
        assert!(matches!(
            zero.materialize(&mut frame),
            Ok(PageVariant::Anonymous { swap_slot: None })
        ));
        assert!(frame.iter().all(|x| *x == 0));

        let segment = Materializer::Segment(FileWindow::new(file.clone(), 0, PAGE_SIZE));
        assert_eq!(segment.kind(), PageKind::Anonymous);
        assert!(matches!(
            segment.materialize(&mut frame),
            Ok(PageVariant::Anonymous { swap_slot: None })
        ));
        assert!(frame.iter().all(|x| *x == 3));

        let mapped = Materializer::MappedFile(FileWindow::new(file.clone(), 0, 100));
        assert_eq!(mapped.kind(), PageKind::FileBacked);
        match mapped.materialize(&mut frame) {
            Ok(PageVariant::FileBacked(window)) => assert_eq!(window.read_length, 100),
            _ => panic!("expected file backed page"),
        }
        assert!(frame[100..].iter().all(|x| *x == 0));
    }

    #[test]
    fn test_deep_copy_reopens() {
        let file = MemoryBackingFile::new(vec![3u8; 64]);
        let mapped = Materializer::MappedFile(FileWindow::new(file.clone().into_handle(), 0, 64));
        assert_eq!(file.open_handles(), 2);

        let copy = mapped
            .deep_copy(|window| window.file.reopen())
            .unwrap();
        assert_eq!(file.open_handles(), 3);
        assert_ne!(
            copy.window().unwrap().handle_key(),
            mapped.window().unwrap().handle_key()
        );

        drop(mapped);
        assert_eq!(file.open_handles(), 2);
        assert_eq!(copy.window().unwrap().offset, 0);
    }
}
