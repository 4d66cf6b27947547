//! CP/M 2.2 personality for a POSIX-like host.
//!
//! Unmodified 8080/Z80 binaries built for CP/M run against a modern
//! filesystem and terminal: the crate owns the 64 KiB guest address space,
//! intercepts the BDOS and CBIOS trampolines, maps File Control Blocks onto
//! host files, and interleaves CPU stepping with blocking console input.
//!
//! # Architecture
//!
//! - [`DriveFS`]: one drive letter of record-addressed file storage
//! - [`CpmConsole`]: character I/O seam to the terminal
//! - [`ByteSink`]: printer and log outputs, null when disabled
//! - [`CpmEmulator`]: ties the Z80 CPU to all of the above

pub mod bdos;
pub mod cbios;
pub mod console;
pub mod emulator;
pub mod error;
pub mod fs;
pub mod sink;

pub use console::{CpmConsole, HeadlessConsole};
pub use emulator::CpmEmulator;
pub use error::{CpmError, CpmResult};
pub use fs::{DirDriveFS, DriveFS, FileHandle, MemoryDriveFS};
pub use sink::{ByteSink, FileSink, NullSink};

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The guest jumped to 0 or asked BDOS for a system reset.
    WarmBoot,
    /// The CPU executed HALT.
    Halt,
    /// A host write failed mid-run.
    Error(String),
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct ExitInfo {
    pub reason: ExitReason,
    pub t_states: u64,
    pub pc: u16,
}
