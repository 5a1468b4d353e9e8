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

use super::FrameAllocatorModule;
use crate::addressing::{Kva, PAGE_SIZE};

/// Base of the kernel addresses handed out for user frames
const USER_POOL_BASE: usize = 0x8004_0000_0000;

/// A user pool with a fixed number of frames.
///
/// Memory for a frame is only reserved once it is allocated for the first time.
pub struct BoundedFrameAllocator {
    frames: Vec<Option<Box<[u8]>>>,
    free: Vec<usize>,
}

impl BoundedFrameAllocator {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frames: (0..frame_count).map(|_| None).collect(),
            // reversed, so the lowest frames get used first
            free: (0..frame_count).rev().collect(),
        }
    }

    /// Total number of frames of this pool
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames that are not allocated right now
    pub fn available(&self) -> usize {
        self.free.len()
    }

    fn index_of(&self, kva: Kva) -> usize {
        assert!(
            kva.is_page_aligned() && kva.into_usize() >= USER_POOL_BASE,
            "{:?} is not a user frame",
            kva
        );
        let index = (kva.into_usize() - USER_POOL_BASE) / PAGE_SIZE;
        assert!(index < self.frames.len(), "{:?} is not a user frame", kva);
        index
    }
}

impl FrameAllocatorModule for BoundedFrameAllocator {
    fn allocate(&mut self) -> Option<Kva> {
        let index = self.free.pop()?;
        if self.frames[index].is_none() {
            self.frames[index] = Some(vec![0u8; PAGE_SIZE].into_boxed_slice());
        }

        Some(Kva::new(USER_POOL_BASE + index * PAGE_SIZE))
    }

    fn deallocate(&mut self, kva: Kva) {
        let index = self.index_of(kva);
        debug_assert!(!self.free.contains(&index), "double free of {:?}", kva);
        self.free.push(index);
    }

    fn frame(&self, kva: Kva) -> &[u8] {
        let index = self.index_of(kva);
        self.frames[index]
            .as_deref()
            .expect("frame was never allocated")
    }

    fn frame_mut(&mut self, kva: Kva) -> &mut [u8] {
        let index = self.index_of(kva);
        self.frames[index]
            .as_deref_mut()
            .expect("frame was never allocated")
    }
}
