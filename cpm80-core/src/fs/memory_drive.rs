//! In-memory drive for tests.

use std::collections::HashMap;

use super::drive_fs::{DriveFS, FileHandle};
use crate::error::{CpmError, CpmResult};

/// Drive whose files are byte vectors. Random writes past the end zero-fill
/// the gap, the way a seek-past-EOF write behaves on a host file.
#[derive(Default)]
pub struct MemoryDriveFS {
    files: HashMap<String, Vec<u8>>,
    open: HashMap<FileHandle, String>,
    next_handle: FileHandle,
}

impl MemoryDriveFS {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            open: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Seed a file.
    pub fn add_file(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(name.to_string(), data.into());
    }

    /// Contents for assertions.
    pub fn file_contents(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    fn stash(&mut self, name: &str) -> FileHandle {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.open.insert(handle, name.to_string());
        handle
    }

    fn name_of(&self, handle: FileHandle) -> CpmResult<&str> {
        self.open
            .get(&handle)
            .map(String::as_str)
            .ok_or(CpmError::UnknownHandle(handle))
    }
}

impl DriveFS for MemoryDriveFS {
    fn open(&mut self, name: &str) -> CpmResult<Option<FileHandle>> {
        if self.files.contains_key(name) {
            Ok(Some(self.stash(name)))
        } else {
            Ok(None)
        }
    }

    fn create(&mut self, name: &str) -> CpmResult<Option<FileHandle>> {
        if self.files.contains_key(name) {
            return Ok(None);
        }
        self.files.insert(name.to_string(), Vec::new());
        Ok(Some(self.stash(name)))
    }

    fn close(&mut self, handle: FileHandle) -> CpmResult<()> {
        match self.open.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(CpmError::UnknownHandle(handle)),
        }
    }

    fn read_at(&mut self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> CpmResult<usize> {
        let name = self.name_of(handle)?.to_string();
        let Some(data) = self.files.get(&name) else {
            return Ok(0);
        };

        let start = (offset as usize).min(data.len());
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        Ok(len)
    }

    fn write_at(&mut self, handle: FileHandle, offset: u64, buf: &[u8]) -> CpmResult<usize> {
        let name = self.name_of(handle)?.to_string();
        let data = self.files.entry(name).or_default();

        let end = offset as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn file_size(&self, name: &str) -> Option<u64> {
        self.files.get(name).map(|data| data.len() as u64)
    }

    fn delete(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    fn rename(&mut self, old: &str, new: &str) -> bool {
        match self.files.remove(old) {
            Some(data) => {
                self.files.insert(new.to_string(), data);
                true
            }
            None => false,
        }
    }

    fn list_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}
