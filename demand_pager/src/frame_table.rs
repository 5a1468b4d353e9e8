use crate::{addressing::Kva, page::PageId};

/// Index of a frame inside of the frame table
pub(crate) type FrameId = usize;

pub(crate) struct Frame {
    pub(crate) kva: Kva,

    /// The page currently resident in this frame
    pub(crate) occupant: Option<PageId>,

    /// Pinned frames are never chosen for eviction
    pub(crate) pinned: bool,
}

/// All frames that were ever handed out by the frame allocator.
///
/// Frames are kept in a ring (the order of this list) which is scanned by
/// the second chance eviction.
/// Frames that are freed go to a recycle list and are handed out again
/// before new frames are allocated.
pub(crate) struct FrameTable {
    frames: Vec<Frame>,
    recycled: Vec<FrameId>,

    /// clock hand of the eviction
    hand: usize,
}

impl FrameTable {
    pub(crate) fn new() -> Self {
        Self {
            frames: Vec::new(),
            recycled: Vec::new(),
            hand: 0,
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: FrameId) -> &Frame {
        &self.frames[id]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id]
    }

    /// Adds a frame that was just returned by the frame allocator.
    pub(crate) fn register(&mut self, kva: Kva) -> FrameId {
        self.frames.push(Frame {
            kva,
            occupant: None,
            pinned: false,
        });

        self.frames.len() - 1
    }

    pub(crate) fn take_recycled(&mut self) -> Option<FrameId> {
        self.recycled.pop()
    }

    /// Puts an unoccupied frame on the recycle list.
    pub(crate) fn recycle(&mut self, id: FrameId) {
        let frame = &mut self.frames[id];
        debug_assert!(frame.occupant.is_none());
        debug_assert!(!self.recycled.contains(&id));

        frame.pinned = false;
        self.recycled.push(id);
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn recycled_count(&self) -> usize {
        self.recycled.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().enumerate()
    }

    /// Selects an eviction victim using the second chance algorithm.
    ///
    /// `test_and_clear_accessed` is called with the occupant of each visited
    /// frame and returns if the accessed bit was set (and clears it).
    /// Frames without occupant, pinned frames and the frames in `excluded`
    /// are skipped.
    ///
    /// Scans at most two revolutions, returns `None` if no frame can be evicted.
    pub(crate) fn select_victim<F: FnMut(PageId) -> bool>(
        &mut self,
        mut test_and_clear_accessed: F,
        excluded: &[FrameId],
    ) -> Option<(FrameId, PageId)> {
        let len = self.frames.len();

        for _ in 0..(2 * len) {
            let id = self.hand;
            self.hand = (self.hand + 1) % len;

            let frame = &self.frames[id];
            if frame.pinned || excluded.contains(&id) {
                continue;
            }

            let occupant = match frame.occupant {
                Some(occupant) => occupant,
                None => continue,
            };

            if test_and_clear_accessed(occupant) {
                // second chance
                continue;
            }

            return Some((id, occupant));
        }

        None
    }
}
