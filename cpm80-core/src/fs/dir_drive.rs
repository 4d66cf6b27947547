//! Host-directory drive: files live as ordinary files in one directory.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::drive_fs::{DriveFS, FileHandle};
use crate::error::{CpmError, CpmResult};

/// A drive mapped onto a host directory. Open files are kept in a handle
/// table so the handle can ride inside the guest's FCB.
pub struct DirDriveFS {
    root: PathBuf,
    open: HashMap<FileHandle, File>,
    next_handle: FileHandle,
}

impl DirDriveFS {
    /// Mount `root`. Fails if the directory cannot be enumerated.
    pub fn new(root: impl Into<PathBuf>) -> CpmResult<Self> {
        let root = root.into();
        fs::read_dir(&root)?;
        Ok(Self {
            root,
            open: HashMap::new(),
            next_handle: 1,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn stash(&mut self, file: File) -> FileHandle {
        let handle = loop {
            let candidate = self.next_handle;
            self.next_handle = self.next_handle.checked_add(1).unwrap_or(1);
            if candidate != 0 && !self.open.contains_key(&candidate) {
                break candidate;
            }
        };
        self.open.insert(handle, file);
        handle
    }

    fn file(&mut self, handle: FileHandle) -> CpmResult<&mut File> {
        self.open
            .get_mut(&handle)
            .ok_or(CpmError::UnknownHandle(handle))
    }
}

impl DriveFS for DirDriveFS {
    fn open(&mut self, name: &str) -> CpmResult<Option<FileHandle>> {
        let path = self.path_of(name);
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                // Read-only host files still open for record reads.
                debug!("{}: read+write refused, retrying read-only", path.display());
                match File::open(&path) {
                    Ok(file) => file,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(self.stash(file)))
    }

    fn create(&mut self, name: &str) -> CpmResult<Option<FileHandle>> {
        let path = self.path_of(name);
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => Ok(Some(self.stash(file))),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self, handle: FileHandle) -> CpmResult<()> {
        match self.open.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(CpmError::UnknownHandle(handle)),
        }
    }

    fn read_at(&mut self, handle: FileHandle, offset: u64, buf: &mut [u8]) -> CpmResult<usize> {
        let file = self.file(handle)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn write_at(&mut self, handle: FileHandle, offset: u64, buf: &[u8]) -> CpmResult<usize> {
        let file = self.file(handle)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn file_size(&self, name: &str) -> Option<u64> {
        let meta = fs::metadata(self.path_of(name)).ok()?;
        meta.is_file().then(|| meta.len())
    }

    fn delete(&mut self, name: &str) -> bool {
        fs::remove_file(self.path_of(name)).is_ok()
    }

    fn rename(&mut self, old: &str, new: &str) -> bool {
        let from = self.path_of(old);
        from.is_file() && fs::rename(from, self.path_of(new)).is_ok()
    }

    fn list_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }
}
