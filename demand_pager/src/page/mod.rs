mod materializer;

pub use materializer::{FileWindow, Materializer};

use crate::{addressing::Va, frame_table::FrameId, SpaceId};

/// Key of a page descriptor inside of the descriptor slab
pub(crate) type PageId = usize;

/// Identifies the pages created by one `mmap` call
pub(crate) type MappingId = usize;

/// The type of a page after it got initialized
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PageKind {
    Anonymous,
    FileBacked,
}

pub(crate) enum PageVariant {
    /// Not yet given any content
    Uninitialized(Materializer),

    /// Pure memory. If `swap_slot` is set, the content lives in that swap slot.
    Anonymous { swap_slot: Option<usize> },

    /// Content is a window into a file
    FileBacked(FileWindow),
}

pub(crate) struct PageDescriptor {
    pub(crate) space: SpaceId,
    pub(crate) address: Va,
    pub(crate) writable: bool,

    /// Page was created by stack growth (or stack setup)
    pub(crate) stack: bool,

    /// Set for pages created by `mmap`, used to find the end of the mapping again
    pub(crate) mapping: Option<MappingId>,

    pub(crate) resident_frame: Option<FrameId>,
    pub(crate) variant: PageVariant,
}

impl PageDescriptor {
    pub(crate) fn new(space: SpaceId, address: Va, writable: bool, variant: PageVariant) -> Self {
        debug_assert!(address.is_page_aligned());

        Self {
            space,
            address,
            writable,
            stack: false,
            mapping: None,
            resident_frame: None,
            variant,
        }
    }

    pub(crate) fn kind(&self) -> PageKind {
        match &self.variant {
            PageVariant::Uninitialized(materializer) => materializer.kind(),
            PageVariant::Anonymous { .. } => PageKind::Anonymous,
            PageVariant::FileBacked(_) => PageKind::FileBacked,
        }
    }

    pub(crate) fn info(&self) -> PageInfo {
        PageInfo {
            address: self.address,
            writable: self.writable,
            kind: self.kind(),
            pending: matches!(self.variant, PageVariant::Uninitialized(_)),
            resident: self.resident_frame.is_some(),
            swap_slot: match self.variant {
                PageVariant::Anonymous { swap_slot } => swap_slot,
                _ => None,
            },
            stack: self.stack,
            mapped_file: self.mapping.is_some(),
        }
    }
}

/// A snapshot of the state of a single page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageInfo {
    pub address: Va,
    pub writable: bool,

    /// Type of the page once initialized
    pub kind: PageKind,

    /// Page was not initialized yet
    pub pending: bool,

    pub resident: bool,
    pub swap_slot: Option<usize>,
    pub stack: bool,

    /// Page belongs to a `mmap` region
    pub mapped_file: bool,
}
