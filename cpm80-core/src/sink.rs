//! Write-only byte sinks for the printer and log outputs.
//!
//! BDOS 5 (LIST) and the emulator's diagnostic log both write to a sink.
//! When the corresponding output is disabled the sink is a [`NullSink`],
//! so the dispatch code never branches on configuration.

use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A write-only byte stream. Write errors are swallowed: a lost printer or
/// log byte must never take the guest down.
pub trait ByteSink: Send {
    fn write(&mut self, bytes: &[u8]);

    fn flush(&mut self) {}
}

/// Discards everything.
#[derive(Default)]
pub struct NullSink;

impl ByteSink for NullSink {
    fn write(&mut self, _bytes: &[u8]) {}
}

/// Writes to a host file, truncated on construction.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            file: File::create(path)?,
        })
    }
}

impl ByteSink for FileSink {
    fn write(&mut self, bytes: &[u8]) {
        let _ = self.file.write_all(bytes);
    }

    fn flush(&mut self) {
        let _ = self.file.flush();
    }
}
