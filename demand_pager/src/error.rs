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

//! Errors of the paging subsystem.
//!
//! Collaborator modules report plain `Result<_, ()>` failures; the errors in
//! here are what the subsystem itself hands upwards. Broken internal
//! invariants are not represented: those panic.

use crate::addressing::Va;

/// Why a page could not be brought into a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// No free frame left and no frame could be evicted
    OutOfFrames,

    /// Eviction needed a swap slot but the swap device is full
    SwapFull,

    /// Installing the mapping inside of the page table failed
    MapFailed,

    /// Reading or writing the swap device or a backing file failed
    Io,
}

/// A page fault that cannot be resolved.
///
/// The owner of the faulting address space has to be terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultError {
    /// User code accessed an address inside of the kernel address space
    KernelAddress(Va),

    /// The page is present, but the access violated its protection
    ProtectionViolation(Va),

    /// Write to a page that is mapped read only
    WriteToReadOnly(Va),

    /// Address is neither registered nor a valid stack growth
    WildAccess(Va),

    /// The page exists but could not be made resident
    ClaimFailed(Va, ClaimError),
}

impl FaultError {
    /// The address that caused the fault
    pub fn address(&self) -> Va {
        match *self {
            FaultError::KernelAddress(va)
            | FaultError::ProtectionViolation(va)
            | FaultError::WriteToReadOnly(va)
            | FaultError::WildAccess(va)
            | FaultError::ClaimFailed(va, _) => va,
        }
    }
}

/// Rejected `mmap` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapError {
    ZeroLength,
    ConsoleFile,
    NullAddress,
    UnalignedAddress,
    OutsideUserSpace,
    Overlap(Va),
    UnalignedOffset,
    EmptyFile,
    OffsetBeyondEnd,

    /// The length of the file could not be determined
    LengthUnavailable,

    ReopenFailed,
}

/// Copying the address space of a forking process failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkError {
    /// Child already contains a page at this address
    AlreadyMapped(Va),

    /// The backing file of a pending page could not be reopened
    ReopenFailed(Va),

    /// Making the child's (or the parent's) copy of a page resident failed
    ClaimFailed(Va, ClaimError),
}
