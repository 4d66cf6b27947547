//! Error types for the CP/M shim.
//!
//! Only programming errors in the shim or the guest surface here. Conditions
//! a CP/M program is expected to handle (file not found, end of file, disk
//! full) are reported through register A and never become an `Err`.

use thiserror::Error;

/// Fatal emulation errors.
#[derive(Error, Debug)]
pub enum CpmError {
    #[error("invalid current-record encoding: cr={cr:#04x} ex={ex:#04x} s2={s2:#04x}")]
    InvalidRecordEncoding { cr: u8, ex: u8, s2: u8 },

    #[error("FCB holds a corrupt file handle (signature mismatch)")]
    InvalidFd,

    #[error("file operation on an unopened FCB")]
    UnopenedFcb,

    #[error("unknown file handle: {0}")]
    UnknownHandle(u16),

    #[error("CBIOS entry at {0:#06x} is not on a jump-table boundary")]
    MisalignedBiosCall(u16),

    #[error("drive {0} is not mounted")]
    DriveNotMounted(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CP/M operations.
pub type CpmResult<T> = Result<T, CpmError>;
