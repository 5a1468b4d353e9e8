mod bounded;

use crate::addressing::{Kva, PAGE_SIZE};

pub use bounded::BoundedFrameAllocator;

/// The allocator for physical frames of the user pool.
pub trait FrameAllocatorModule {
    /// Returns a new frame or `None` if the pool is exhausted.
    ///
    /// The content of a new frame is undefined.
    fn allocate(&mut self) -> Option<Kva>;

    /// Gives the frame `kva` back to the pool.
    fn deallocate(&mut self, kva: Kva);

    /// The [`PAGE_SIZE`] bytes of the frame `kva`
    fn frame(&self, kva: Kva) -> &[u8];

    fn frame_mut(&mut self, kva: Kva) -> &mut [u8];

    /// Copies the content of frame `src` into frame `dest`.
    fn copy_frame(&mut self, src: Kva, dest: Kva) {
        let mut buffer = [0u8; PAGE_SIZE];
        buffer.copy_from_slice(self.frame(src));
        self.frame_mut(dest).copy_from_slice(&buffer);
    }
}
