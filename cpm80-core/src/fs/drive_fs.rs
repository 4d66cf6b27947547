//! DriveFS trait: one CP/M drive backed by host storage.

use crate::error::CpmResult;

/// Handle to a file opened on a drive. Zero is reserved for "not open" so a
/// handle can live inside a zeroed FCB.
pub type FileHandle = u16;

/// A single mounted drive.
///
/// All I/O is positioned: BDOS derives an absolute record number from the
/// FCB on every call, so there is no per-handle cursor. Filenames are the
/// literal host names; CP/M's upper-case 8.3 convention is whatever the
/// guest put in the FCB.
pub trait DriveFS: Send {
    /// Open an existing file for record I/O, read+write where the host
    /// allows it and read-only as a fallback. `Ok(None)` means no such file.
    fn open(&mut self, name: &str) -> CpmResult<Option<FileHandle>>;

    /// Create a file that must not already exist. `Ok(None)` means the name
    /// is taken.
    fn create(&mut self, name: &str) -> CpmResult<Option<FileHandle>>;

    /// Release an open handle.
    fn close(&mut self, handle: FileHandle) -> CpmResult<()>;

    /// Read up to `buf.len()` bytes at `offset`. A short count is end of
    /// file, never an error.
    fn read_at(&mut self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> CpmResult<usize>;

    /// Write `buf` at `offset`, extending the file as needed. Returns the
    /// bytes written.
    fn write_at(&mut self, handle: FileHandle, offset: u64, buf: &[u8]) -> CpmResult<usize>;

    /// Size in bytes, or `None` if the file does not exist.
    fn file_size(&self, name: &str) -> Option<u64>;

    /// Remove a file. False if it did not exist.
    fn delete(&mut self, name: &str) -> bool;

    /// Rename a file. False if the source does not exist or the host
    /// refuses.
    fn rename(&mut self, old: &str, new: &str) -> bool;

    /// Names of the regular files on this drive, in no particular order.
    fn list_files(&self) -> Vec<String>;

    /// True if the file exists.
    fn exists(&self, name: &str) -> bool;
}
