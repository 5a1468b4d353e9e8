mod host_file;
mod memory_file;

use std::sync::Arc;

pub use host_file::HostBackingFile;
pub use memory_file::MemoryBackingFile;

/// Shared handle to an open file.
///
/// All pages of one mapping share the same (reopened) handle.
pub type FileHandle = Arc<dyn BackingFileModule>;

/// An open file of the file system that pages can be loaded from and written back to.
///
/// Every handle has its own lifetime: closing the handle the user opened does
/// not affect handles created with [`BackingFileModule::reopen`].
pub trait BackingFileModule: Send + Sync {
    /// Reads up to `dest.len()` bytes starting at `offset` into `dest`.
    ///
    /// Returns how many bytes were read, which is less than `dest.len()`
    /// if the end of the file was reached.
    fn read_at(&self, dest: &mut [u8], offset: usize) -> Result<usize, ()>;

    /// Writes `src` to the file starting at `offset`.
    ///
    /// Files do not grow: returns how many bytes were written before the end of the file.
    fn write_at(&self, src: &[u8], offset: usize) -> Result<usize, ()>;

    /// Length of the file in bytes
    fn length(&self) -> Result<usize, ()>;

    /// Opens the same file again, returning an independent handle.
    fn reopen(&self) -> Result<FileHandle, ()>;

    /// Is this the console (keyboard/screen) instead of a regular file?
    fn is_console(&self) -> bool {
        false
    }
}
