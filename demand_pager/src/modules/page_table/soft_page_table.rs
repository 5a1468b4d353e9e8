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

use std::collections::HashMap;

use super::{Mapping, PageTableModule};
use crate::{
    addressing::{Kva, Va},
    SpaceId,
};

struct Entry {
    mapping: Mapping,
    accessed: bool,
    dirty: bool,
}

/// Page table implemented in software.
///
/// Keeps one entry per mapped page of every address space, including the
/// accessed and dirty bits the hardware would maintain.
pub struct SoftPageTable {
    entries: HashMap<(SpaceId, Va), Entry>,

    /// maximum number of entries, simulates running out of page table memory
    entry_limit: Option<usize>,
}

impl SoftPageTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            entry_limit: None,
        }
    }

    /// Creates a page table that cannot hold more than `limit` mappings
    pub fn with_entry_limit(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            entry_limit: Some(limit),
        }
    }

    /// Number of present mappings of `space`
    pub fn mapped_pages(&self, space: SpaceId) -> usize {
        self.entries.keys().filter(|(id, _)| *id == space).count()
    }
}

impl Default for SoftPageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTableModule for SoftPageTable {
    fn install(&mut self, space: SpaceId, va: Va, kva: Kva, writable: bool) -> Result<(), ()> {
        debug_assert!(va.is_page_aligned() && kva.is_page_aligned());

        if self.entries.contains_key(&(space, va)) {
            return Err(());
        }
        if let Some(limit) = self.entry_limit {
            if self.entries.len() >= limit {
                return Err(());
            }
        }

        self.entries.insert(
            (space, va),
            Entry {
                mapping: Mapping { kva, writable },
                accessed: false,
                dirty: false,
            },
        );
        Ok(())
    }

    fn clear(&mut self, space: SpaceId, va: Va) {
        self.entries.remove(&(space, va.page_down()));
    }

    fn lookup(&self, space: SpaceId, va: Va) -> Option<Mapping> {
        self.entries.get(&(space, va.page_down())).map(|entry| entry.mapping)
    }

    fn is_accessed(&self, space: SpaceId, va: Va) -> bool {
        self.entries
            .get(&(space, va.page_down()))
            .map(|entry| entry.accessed)
            .unwrap_or(false)
    }

    fn clear_accessed(&mut self, space: SpaceId, va: Va) {
        if let Some(entry) = self.entries.get_mut(&(space, va.page_down())) {
            entry.accessed = false;
        }
    }

    fn is_dirty(&self, space: SpaceId, va: Va) -> bool {
        self.entries
            .get(&(space, va.page_down()))
            .map(|entry| entry.dirty)
            .unwrap_or(false)
    }

    fn clear_dirty(&mut self, space: SpaceId, va: Va) {
        if let Some(entry) = self.entries.get_mut(&(space, va.page_down())) {
            entry.dirty = false;
        }
    }

    fn touch(&mut self, space: SpaceId, va: Va, is_write: bool) {
        if let Some(entry) = self.entries.get_mut(&(space, va.page_down())) {
            entry.accessed = true;
            entry.dirty |= is_write;
        }
    }
}
