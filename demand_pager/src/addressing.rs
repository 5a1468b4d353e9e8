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

//! User virtual addresses ([`Va`]) and kernel addresses of frames ([`Kva`]).

use core::{
    fmt,
    ops::{Add, Sub},
};
use static_assertions::const_assert;

/// Size of a page (and of a frame) in bytes.
pub const PAGE_SIZE: usize = 0x1000;

/// log2 of [`PAGE_SIZE`]
pub const PAGE_SHIFT: usize = 12;

/// Mask to get the offset of an address inside of its page
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

const_assert!(PAGE_SIZE.is_power_of_two());
const_assert!(1 << PAGE_SHIFT == PAGE_SIZE);

macro_rules! address_type {
    ($name:ident) => {
        impl $name {
            /// The address `0`.
            pub const ZERO: Self = Self(0);

            #[inline]
            pub const fn new(addr: usize) -> Self {
                Self(addr)
            }

            #[inline]
            pub const fn into_usize(self) -> usize {
                self.0
            }

            /// Rounds this address down to the start of its page.
            #[inline]
            pub const fn page_down(self) -> Self {
                Self(self.0 & !PAGE_MASK)
            }

            /// Rounds this address up to the next page boundary.
            ///
            /// Returns `None` on overflow.
            #[inline]
            pub const fn page_up(self) -> Option<Self> {
                match self.0.checked_add(PAGE_MASK) {
                    Some(addr) => Some(Self(addr & !PAGE_MASK)),
                    None => None,
                }
            }

            /// Offset of this address inside of its page
            #[inline]
            pub const fn page_offset(self) -> usize {
                self.0 & PAGE_MASK
            }

            #[inline]
            pub const fn is_page_aligned(self) -> bool {
                self.page_offset() == 0
            }

            #[inline]
            pub const fn checked_add(self, rhs: usize) -> Option<Self> {
                match self.0.checked_add(rhs) {
                    Some(addr) => Some(Self(addr)),
                    None => None,
                }
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: usize) -> Self::Output {
                Self(self.0 + rhs)
            }
        }

        impl Sub<usize> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: usize) -> Self::Output {
                Self(self.0 - rhs)
            }
        }

        impl Sub<$name> for $name {
            type Output = usize;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

/// A virtual address inside of some process' address space.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Va(usize);

/// The kernel address of a physical frame.
///
/// Frames are always accessible through this address, independent of
/// which process (if any) has the frame mapped.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Kva(usize);

address_type!(Va);
address_type!(Kva);
