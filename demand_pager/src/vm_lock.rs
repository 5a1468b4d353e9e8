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

use core::{
    hint::spin_loop,
    ops::{Deref, DerefMut},
};
use try_lock::{Locked, TryLock};

/// The lock that serializes all accesses to the shared paging state.
///
/// Frame table, swap table and page descriptors are guarded together, as
/// eviction inspects and modifies all of them in one go.
pub(crate) struct VmLock<T> {
    inner: TryLock<T>,
}

impl<T> VmLock<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self {
            inner: TryLock::new(inner),
        }
    }

    /// Blocks until the lock is available.
    pub(crate) fn lock(&self) -> VmGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }

            spin_loop();
        }
    }

    pub(crate) fn try_lock(&self) -> Option<VmGuard<'_, T>> {
        self.inner.try_lock().map(|guard| VmGuard { guard })
    }

    pub(crate) fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

pub(crate) struct VmGuard<'a, T> {
    guard: Locked<'a, T>,
}

impl<T> Deref for VmGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for VmGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
