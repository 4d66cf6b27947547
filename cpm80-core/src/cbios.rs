//! CBIOS jump-table decode.
//!
//! The CBIOS is 17 three-byte entries starting at [`crate::bdos::addr::CBIOS`],
//! each holding a lone RET. A guest transfers control into the table and the
//! scheduler maps the landing PC back to the entry it names.

use crate::bdos::addr;
use crate::error::{CpmError, CpmResult};

/// The 17 CBIOS entry points, in jump-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiosFunction {
    Boot,
    WBoot,
    Const,
    ConIn,
    ConOut,
    List,
    Punch,
    Reader,
    Home,
    SelDsk,
    SetTrk,
    SetSec,
    SetDma,
    Read,
    Write,
    ListSt,
    SecTran,
}

impl BiosFunction {
    pub const TABLE: [BiosFunction; 17] = [
        BiosFunction::Boot,
        BiosFunction::WBoot,
        BiosFunction::Const,
        BiosFunction::ConIn,
        BiosFunction::ConOut,
        BiosFunction::List,
        BiosFunction::Punch,
        BiosFunction::Reader,
        BiosFunction::Home,
        BiosFunction::SelDsk,
        BiosFunction::SetTrk,
        BiosFunction::SetSec,
        BiosFunction::SetDma,
        BiosFunction::Read,
        BiosFunction::Write,
        BiosFunction::ListSt,
        BiosFunction::SecTran,
    ];

    /// Decode a PC at or beyond the table base. Landing between entry points
    /// is a wild jump and fatal; landing past the table is merely unknown.
    pub fn from_pc(pc: u16) -> CpmResult<Option<Self>> {
        let offset = pc - addr::CBIOS;
        if offset % 3 != 0 {
            return Err(CpmError::MisalignedBiosCall(pc));
        }
        Ok(Self::TABLE.get((offset / 3) as usize).copied())
    }
}
