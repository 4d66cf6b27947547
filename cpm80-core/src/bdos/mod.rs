//! BDOS (Basic Disk Operating System) call numbering and system layout.
//!
//! The dispatch itself lives in [`crate::emulator`]; this module names the
//! CP/M 2.2 function codes and the fixed addresses of the guest image.

pub mod fcb;

pub use fcb::Fcb;

/// CP/M 2.2 BDOS function codes. Every code a guest might pass in register C
/// gets a name so unhandled calls can be reported legibly; only a subset is
/// actually dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BdosFunction {
    SystemReset = 0,
    ConsoleInput = 1,
    ConsoleOutput = 2,
    ReaderInput = 3,
    PunchOutput = 4,
    ListOutput = 5,
    DirectConsoleIO = 6,
    GetIOByte = 7,
    SetIOByte = 8,
    PrintString = 9,
    ReadConsoleBuffer = 10,
    ConsoleStatus = 11,
    ReturnVersion = 12,
    ResetDiskSystem = 13,
    SelectDisk = 14,
    OpenFile = 15,
    CloseFile = 16,
    SearchFirst = 17,
    SearchNext = 18,
    DeleteFile = 19,
    ReadSequential = 20,
    WriteSequential = 21,
    MakeFile = 22,
    RenameFile = 23,
    ReturnLoginVector = 24,
    ReturnCurrentDisk = 25,
    SetDmaAddress = 26,
    GetAllocationVector = 27,
    WriteProtectDisk = 28,
    GetReadOnlyVector = 29,
    SetFileAttributes = 30,
    GetDiskParameters = 31,
    UserCode = 32,
    ReadRandom = 33,
    WriteRandom = 34,
    ComputeFileSize = 35,
    SetRandomRecord = 36,
    ResetDrive = 37,
    WriteRandomZeroFill = 40,
}

impl TryFrom<u8> for BdosFunction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use BdosFunction::*;
        Ok(match value {
            0 => SystemReset,
            1 => ConsoleInput,
            2 => ConsoleOutput,
            3 => ReaderInput,
            4 => PunchOutput,
            5 => ListOutput,
            6 => DirectConsoleIO,
            7 => GetIOByte,
            8 => SetIOByte,
            9 => PrintString,
            10 => ReadConsoleBuffer,
            11 => ConsoleStatus,
            12 => ReturnVersion,
            13 => ResetDiskSystem,
            14 => SelectDisk,
            15 => OpenFile,
            16 => CloseFile,
            17 => SearchFirst,
            18 => SearchNext,
            19 => DeleteFile,
            20 => ReadSequential,
            21 => WriteSequential,
            22 => MakeFile,
            23 => RenameFile,
            24 => ReturnLoginVector,
            25 => ReturnCurrentDisk,
            26 => SetDmaAddress,
            27 => GetAllocationVector,
            28 => WriteProtectDisk,
            29 => GetReadOnlyVector,
            30 => SetFileAttributes,
            31 => GetDiskParameters,
            32 => UserCode,
            33 => ReadRandom,
            34 => WriteRandom,
            35 => ComputeFileSize,
            36 => SetRandomRecord,
            37 => ResetDrive,
            40 => WriteRandomZeroFill,
            other => return Err(other),
        })
    }
}

/// CP/M record size in bytes. Every file transfer moves exactly one record.
pub const RECORD_SIZE: usize = 128;

/// Fixed addresses of the guest image.
pub mod addr {
    /// Transient Program Area, where .COM images load.
    pub const TPA: u16 = 0x0100;
    /// `JP BDOS` lives here; `CALL 0x0005` is the system-call gate.
    pub const BDOS_VECTOR: u16 = 0x0005;
    /// BDOS trampoline (a single RET; the emulator intercepts the PC).
    pub const BDOS: u16 = 0xFE00;
    /// First of the 17 three-byte CBIOS jump-table entries.
    pub const CBIOS: u16 = 0xFF00;
    /// Default DMA buffer.
    pub const DEFAULT_DMA: u16 = 0x0080;
    /// Command-line FCB 1.
    pub const FCB1: u16 = 0x005C;
    /// Command-line FCB 2 (overlaps FCB1's rename-destination slot).
    pub const FCB2: u16 = 0x006C;
    /// Command tail: length byte then upper-cased text.
    pub const CMD_TAIL: u16 = 0x0080;
}
