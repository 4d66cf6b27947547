//! The CP/M personality: guest memory, trampolines, BDOS/CBIOS dispatch and
//! the instruction-stepping loop.

use std::num::NonZeroU16;

use log::{debug, trace};
use z80emu::host::TsCounter;
use z80emu::{Clock, Cpu, CpuDebug, Io, Memory, Reg8, StkReg16, Z80NMOS};

use crate::bdos::{addr, BdosFunction, Fcb, RECORD_SIZE};
use crate::cbios::BiosFunction;
use crate::console::CpmConsole;
use crate::error::{CpmError, CpmResult};
use crate::fs::{DriveFS, FileHandle};
use crate::sink::{ByteSink, NullSink};
use crate::{ExitInfo, ExitReason};

/// Instructions executed between yields to the host scheduler, so the
/// keyboard producer is never starved by a compute-bound guest.
const BATCH_SIZE: u32 = 100_000;

type TsClock = TsCounter<i32>;

/// What the CPU steps against: a flat 64 KiB array and dead ports. The
/// supported software set reaches the system only through the memory-mapped
/// trampolines, so ports read as zero and writes vanish.
struct Bus<'a> {
    memory: &'a mut [u8; 65536],
}

impl Memory for Bus<'_> {
    type Timestamp = i32;

    fn read_debug(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn read_mem(&self, address: u16, _ts: Self::Timestamp) -> u8 {
        self.memory[address as usize]
    }

    fn write_mem(&mut self, address: u16, value: u8, _ts: Self::Timestamp) {
        self.memory[address as usize] = value;
    }
}

impl Io for Bus<'_> {
    type Timestamp = i32;
    type WrIoBreak = ();
    type RetiBreak = ();

    fn read_io(&mut self, _port: u16, _ts: Self::Timestamp) -> (u8, Option<NonZeroU16>) {
        (0x00, None)
    }

    fn write_io(
        &mut self,
        _port: u16,
        _value: u8,
        _ts: Self::Timestamp,
    ) -> (Option<Self::WrIoBreak>, Option<NonZeroU16>) {
        (None, None)
    }
}

/// Snapshot of a drive's directory, consumed by search-first/search-next.
#[derive(Default)]
struct DirScan {
    entries: Vec<String>,
    next: usize,
}

impl DirScan {
    /// Replace the snapshot; entries come back in ascending order.
    fn restart(&mut self, mut entries: Vec<String>) {
        entries.sort();
        self.entries = entries;
        self.next = 0;
    }

    fn pop(&mut self) -> Option<String> {
        let name = self.entries.get(self.next)?.clone();
        self.next += 1;
        Some(name)
    }
}

/// The emulator: CPU, guest memory, mounted drives, console and sinks.
pub struct CpmEmulator<C: CpmConsole, D: DriveFS> {
    cpu: Z80NMOS,
    clock: TsClock,
    memory: [u8; 65536],
    console: C,
    /// Drives A-P.
    drives: [Option<D>; 16],
    /// Current drive (0 = A).
    current_drive: u8,
    /// DMA address for record transfers.
    dma: u16,
    scan: DirScan,
    /// BDOS 5 (LIST) output.
    printer: Box<dyn ByteSink>,
    /// Diagnostics: unhandled calls and, when enabled, disassembly.
    log: Box<dyn ByteSink>,
    dump_asm: bool,
}

impl<C: CpmConsole, D: DriveFS> CpmEmulator<C, D> {
    pub fn new(console: C) -> Self {
        let mut emu = Self {
            cpu: Z80NMOS::default(),
            clock: TsClock::default(),
            memory: [0; 65536],
            console,
            drives: std::array::from_fn(|_| None),
            current_drive: 0,
            dma: addr::DEFAULT_DMA,
            scan: DirScan::default(),
            printer: Box::new(NullSink),
            log: Box::new(NullSink),
            dump_asm: false,
        };
        emu.install_boot_image();
        emu
    }

    /// Lay down the fixed boot image: the warm-boot and BDOS vectors, the
    /// RET trampolines the scheduler intercepts, and the two blanked
    /// command-line FCBs.
    fn install_boot_image(&mut self) {
        let wboot = addr::CBIOS + 3;
        self.memory[0x0000] = 0xC3; // JP WBOOT
        self.memory[0x0001] = (wboot & 0xFF) as u8;
        self.memory[0x0002] = (wboot >> 8) as u8;

        let gate = addr::BDOS_VECTOR as usize;
        self.memory[gate] = 0xC3; // JP BDOS
        self.memory[gate + 1] = (addr::BDOS & 0xFF) as u8;
        self.memory[gate + 2] = (addr::BDOS >> 8) as u8;

        // The dispatcher runs when the PC lands on an entry point; the RET
        // then pops the guest's return address.
        self.memory[addr::BDOS as usize] = 0xC9;
        for entry in 0..BiosFunction::TABLE.len() {
            self.memory[addr::CBIOS as usize + entry * 3] = 0xC9;
        }

        Fcb::view(&mut self.memory, addr::FCB1).blank();
        Fcb::view(&mut self.memory, addr::FCB2).blank();
    }

    /// Mount a drive (0 = A).
    pub fn mount(&mut self, drive: u8, fs: D) {
        if (drive as usize) < self.drives.len() {
            self.drives[drive as usize] = Some(fs);
        }
    }

    pub fn unmount(&mut self, drive: u8) {
        if (drive as usize) < self.drives.len() {
            self.drives[drive as usize] = None;
        }
    }

    pub fn drive(&self, drive: u8) -> Option<&D> {
        self.drives.get(drive as usize).and_then(|d| d.as_ref())
    }

    pub fn drive_mut(&mut self, drive: u8) -> Option<&mut D> {
        self.drives.get_mut(drive as usize).and_then(|d| d.as_mut())
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn memory(&self) -> &[u8; 65536] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8; 65536] {
        &mut self.memory
    }

    pub fn set_printer(&mut self, sink: Box<dyn ByteSink>) {
        self.printer = sink;
    }

    pub fn set_log(&mut self, sink: Box<dyn ByteSink>) {
        self.log = sink;
    }

    /// Stream per-instruction disassembly into the log sink.
    pub fn set_disassembly(&mut self, enabled: bool) {
        self.dump_asm = enabled;
    }

    /// Load a .COM image at the TPA.
    pub fn load_com(&mut self, image: &[u8]) {
        self.load_at(addr::TPA, image);
    }

    pub fn load_at(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        let end = (start + data.len()).min(self.memory.len());
        self.memory[start..end].copy_from_slice(&data[..end - start]);
    }

    /// Install the upper-cased command tail at 0x0080 (length byte, then
    /// text) and parse its first two tokens into the command-line FCBs, the
    /// way the CCP primes a transient program.
    pub fn set_command_tail(&mut self, tail: &str) {
        let upper = tail.to_uppercase();
        let bytes = upper.as_bytes();
        let len = bytes.len().min(127);

        let base = addr::CMD_TAIL as usize;
        self.memory[base] = len as u8;
        self.memory[base + 1..base + 1 + len].copy_from_slice(&bytes[..len]);

        let mut tokens = upper.split_ascii_whitespace();
        if let Some(token) = tokens.next() {
            Fcb::view(&mut self.memory, addr::FCB1).set_filename(token);
        }
        if let Some(token) = tokens.next() {
            Fcb::view(&mut self.memory, addr::FCB2).set_filename(token);
        }
    }

    /// Run from the TPA until the guest exits.
    pub fn run(&mut self) -> CpmResult<ExitInfo> {
        self.run_from(addr::TPA)
    }

    /// Run from `start` until the guest jumps to 0, requests a warm boot, or
    /// halts. Each iteration inspects the PC left by the previous step:
    /// landing on a trampoline dispatches before the RET there executes.
    pub fn run_from(&mut self, start: u16) -> CpmResult<ExitInfo> {
        self.cpu.reset();
        self.cpu.set_pc(start);
        // Guest stack grows down from just under the BDOS trampoline.
        self.cpu.set_sp(addr::BDOS - 2);

        loop {
            for _ in 0..BATCH_SIZE {
                let pc = self.cpu.get_pc();
                if pc == 0x0000 {
                    // Warm-boot vector; single-shot, so this is the exit.
                    return Ok(self.finish(ExitReason::WarmBoot));
                } else if pc == addr::BDOS {
                    if let Some(reason) = self.dispatch_bdos()? {
                        return Ok(self.finish(reason));
                    }
                } else if pc >= addr::CBIOS {
                    self.dispatch_cbios(pc)?;
                } else if pc < addr::TPA && pc != addr::BDOS_VECTOR {
                    self.log_line(&format!("Error: Unhandled PC {:#06x}", pc));
                }

                self.step();

                if self.cpu.is_halt() {
                    return Ok(self.finish(ExitReason::Halt));
                }
            }
            // Let the keyboard producer and the rest of the host run.
            std::thread::yield_now();
        }
    }

    fn step(&mut self) {
        let mut bus = Bus {
            memory: &mut self.memory,
        };
        if self.dump_asm {
            let sink = &mut self.log;
            let _ = self.cpu.execute_next(
                &mut bus,
                &mut self.clock,
                Some(move |deb: CpuDebug| {
                    sink.write(format!("{}\n", deb).as_bytes());
                }),
            );
        } else {
            let _ = self
                .cpu
                .execute_next(&mut bus, &mut self.clock, None::<fn(CpuDebug)>);
        }
    }

    fn finish(&mut self, reason: ExitReason) -> ExitInfo {
        self.printer.flush();
        self.log.flush();
        ExitInfo {
            reason,
            t_states: self.clock.as_timestamp() as u64,
            pc: self.cpu.get_pc(),
        }
    }

    fn log_line(&mut self, line: &str) {
        debug!("{line}");
        self.log.write(line.as_bytes());
        self.log.write(b"\n");
    }

    // ==================== Registers ====================

    fn set_a(&mut self, v: u8) {
        self.cpu.set_reg(Reg8::A, None, v);
    }

    /// A with its L mirror, for the calls that answer in both.
    fn set_status(&mut self, v: u8) {
        self.set_a(v);
        self.cpu.set_reg(Reg8::L, None, v);
    }

    /// Record-I/O result: A and L carry the code, H and B are cleared.
    fn set_record_status(&mut self, v: u8) {
        self.set_status(v);
        self.cpu.set_reg(Reg8::H, None, 0);
        self.cpu.set_reg(Reg8::B, None, 0);
    }

    // ==================== Guest memory ====================

    fn read_guest(&self, address: u16, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.memory[address.wrapping_add(i as u16) as usize];
        }
    }

    fn write_guest(&mut self, address: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.memory[address.wrapping_add(i as u16) as usize] = b;
        }
    }

    fn fill_guest(&mut self, address: u16, len: usize, value: u8) {
        for i in 0..len {
            self.memory[address.wrapping_add(i as u16) as usize] = value;
        }
    }

    // ==================== Dispatch ====================

    /// Handle the guest landing on the BDOS trampoline. `Some(reason)` ends
    /// the run.
    fn dispatch_bdos(&mut self) -> CpmResult<Option<ExitReason>> {
        let code = self.cpu.get_reg(Reg8::C, None);
        let e = self.cpu.get_reg(Reg8::E, None);
        let de = self.cpu.get_reg16(StkReg16::DE);
        trace!("bdos call {code} (E={e:#04x} DE={de:#06x})");

        let func = match BdosFunction::try_from(code) {
            Ok(func) => func,
            Err(_) => {
                self.log_line(&format!("Error: Unhandled BDOS call {code}"));
                return Ok(None);
            }
        };

        use BdosFunction::*;
        match func {
            SystemReset => return Ok(Some(ExitReason::WarmBoot)),

            ConsoleInput => {
                // May park the scheduler until the keyboard task delivers.
                let key = self.console.read_key();
                self.console.write(key);
                self.set_status(key);
            }

            ConsoleOutput => self.console.write(e),

            ListOutput => self.printer.write(&[e]),

            DirectConsoleIO => {
                if e == 0xFF {
                    let key = self.console.poll_key().unwrap_or(0);
                    self.set_a(key);
                } else {
                    self.console.write(e);
                }
            }

            ConsoleStatus => {
                let ready = if self.console.key_ready() { 1 } else { 0 };
                self.set_status(ready);
            }

            ResetDiskSystem => {}

            SelectDisk => {
                let exists = (e as usize) < self.drives.len() && self.drives[e as usize].is_some();
                if exists {
                    self.current_drive = e;
                    self.set_status(0x00);
                } else {
                    self.set_status(0xFF);
                }
            }

            OpenFile => self.bdos_open(de)?,
            CloseFile => self.bdos_close(de)?,
            SearchFirst => self.bdos_search_first(de)?,
            SearchNext => self.yield_dir_entry(),
            DeleteFile => self.bdos_delete(de)?,
            ReadSequential => self.bdos_read_sequential(de)?,
            WriteSequential => {
                if let Some(reason) = self.bdos_write_sequential(de)? {
                    return Ok(Some(reason));
                }
            }
            MakeFile => self.bdos_make(de)?,
            RenameFile => self.bdos_rename(de)?,

            ReturnCurrentDisk => self.set_a(self.current_drive),

            SetDmaAddress => self.dma = de,

            ReadRandom => self.bdos_read_random(de)?,
            WriteRandom => self.bdos_write_random(de)?,
            ComputeFileSize => self.bdos_file_size(de)?,

            other => self.log_line(&format!("Error: Unhandled BDOS call {code} ({other:?})")),
        }

        Ok(None)
    }

    /// Handle the guest landing in the CBIOS jump table.
    fn dispatch_cbios(&mut self, pc: u16) -> CpmResult<()> {
        let func = match BiosFunction::from_pc(pc)? {
            Some(func) => func,
            None => {
                self.log_line(&format!("Error: Unhandled CBIOS entry at {pc:#06x}"));
                return Ok(());
            }
        };
        trace!("cbios call {func:?}");

        match func {
            BiosFunction::Const => {
                let ready = if self.console.key_ready() { 0xFF } else { 0x00 };
                self.set_a(ready);
            }
            BiosFunction::ConIn => {
                let key = self.console.read_key();
                self.set_a(key);
            }
            BiosFunction::ConOut => {
                let ch = self.cpu.get_reg(Reg8::C, None);
                self.console.write(ch);
            }
            other => self.log_line(&format!("Error: Unhandled CBIOS call {other:?}")),
        }

        Ok(())
    }

    // ==================== File operations ====================

    /// The drive an FCB names: 0 and 0x3F mean the current drive, anything
    /// else is `drive - 1`. The resolved drive must be mounted.
    fn drive_for(&mut self, fcb_drive: u8) -> CpmResult<&mut D> {
        let index = match fcb_drive {
            0 | 0x3F => self.current_drive as usize,
            d => (d - 1) as usize,
        };
        match self.drives.get_mut(index) {
            Some(Some(fs)) => Ok(fs),
            _ => Err(CpmError::DriveNotMounted(index as u8)),
        }
    }

    /// BDOS 15: open an existing file and stash its handle in the FCB.
    fn bdos_open(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, filename) = {
            let mut fcb = Fcb::view(&mut self.memory, fcb_addr);
            fcb.clear();
            (fcb.drive(), fcb.filename())
        };

        let opened = match self.drive_for(drive)?.open(&filename) {
            Ok(opened) => opened,
            Err(CpmError::Io(e)) => {
                self.log_line(&format!("Error: open {filename}: {e}"));
                None
            }
            Err(e) => return Err(e),
        };

        match opened {
            Some(handle) => {
                Fcb::view(&mut self.memory, fcb_addr).set_handle(handle);
                self.set_a(0x00);
            }
            None => self.set_a(0xFF),
        }
        Ok(())
    }

    /// BDOS 16: close the file embedded in the FCB.
    fn bdos_close(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, handle) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.handle()?)
        };
        if handle == 0 {
            return Err(CpmError::UnopenedFcb);
        }

        self.drive_for(drive)?.close(handle)?;
        Fcb::view(&mut self.memory, fcb_addr).clear_handle();
        self.set_a(0x00);
        Ok(())
    }

    /// BDOS 17: snapshot the drive's directory and yield the first entry.
    /// The FCB's wildcard bytes are not consulted.
    fn bdos_search_first(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let drive = Fcb::view(&mut self.memory, fcb_addr).drive();
        let entries = self.drive_for(drive)?.list_files();
        self.scan.restart(entries);
        self.yield_dir_entry();
        Ok(())
    }

    /// BDOS 18, and the yield half of 17: pop the next snapshot entry into a
    /// directory record at the DMA address. The entry occupies the first 32
    /// bytes; the rest of the record is marked unused with 0xE5.
    fn yield_dir_entry(&mut self) {
        let Some(name) = self.scan.pop() else {
            self.set_a(0xFF);
            return;
        };
        let (base, ext) = match name.rsplit_once('.') {
            Some((base, ext)) => (base.to_string(), ext.to_string()),
            None => (name.clone(), String::new()),
        };

        let dma = self.dma;
        self.fill_guest(dma, 32, 0x00);
        self.fill_guest(dma.wrapping_add(32), RECORD_SIZE - 32, 0xE5);
        self.fill_guest(dma.wrapping_add(1), 11, b' ');
        self.write_guest(dma.wrapping_add(1), &base.as_bytes()[..base.len().min(8)]);
        self.write_guest(dma.wrapping_add(9), &ext.as_bytes()[..ext.len().min(3)]);

        // Entry index 0 of the directory record at the DMA address.
        self.set_a(0x00);
    }

    /// BDOS 19: delete by literal name; wildcards are not expanded.
    fn bdos_delete(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, filename) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.filename())
        };
        let deleted = self.drive_for(drive)?.delete(&filename);
        self.set_a(if deleted { 0x00 } else { 0xFF });
        Ok(())
    }

    /// BDOS 20: read the record at the FCB's sequential position into the
    /// DMA buffer and advance.
    fn bdos_read_sequential(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, handle, record) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.handle()?, fcb.current_record()?)
        };
        if handle == 0 {
            return Err(CpmError::UnopenedFcb);
        }

        let n = self.read_record(drive, handle, record)?;
        if n == 0 {
            self.set_record_status(0x01);
        } else {
            Fcb::view(&mut self.memory, fcb_addr).set_current_record(record + 1);
            self.set_record_status(0x00);
        }
        Ok(())
    }

    /// BDOS 21: write the DMA buffer at the FCB's sequential position and
    /// advance. A host failure here ends the run; data is already lost.
    fn bdos_write_sequential(&mut self, fcb_addr: u16) -> CpmResult<Option<ExitReason>> {
        let (drive, handle, record) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.handle()?, fcb.current_record()?)
        };
        if handle == 0 {
            return Err(CpmError::UnopenedFcb);
        }

        let mut buf = [0u8; RECORD_SIZE];
        self.read_guest(self.dma, &mut buf);

        let offset = record as u64 * RECORD_SIZE as u64;
        match self.drive_for(drive)?.write_at(handle, offset, &buf) {
            Ok(n) if n == RECORD_SIZE => {
                Fcb::view(&mut self.memory, fcb_addr).set_current_record(record + 1);
                self.set_record_status(0x00);
                Ok(None)
            }
            Ok(n) => {
                let message = format!("Error: short write ({n} of {RECORD_SIZE} bytes)");
                self.log_line(&message);
                Ok(Some(ExitReason::Error(message)))
            }
            Err(CpmError::Io(e)) => {
                let message = format!("Error: write failed: {e}");
                self.log_line(&message);
                Ok(Some(ExitReason::Error(message)))
            }
            Err(e) => Err(e),
        }
    }

    /// BDOS 22: create a file that must not already exist.
    fn bdos_make(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, filename) = {
            let mut fcb = Fcb::view(&mut self.memory, fcb_addr);
            fcb.clear();
            (fcb.drive(), fcb.filename())
        };

        let created = match self.drive_for(drive)?.create(&filename) {
            Ok(created) => created,
            Err(CpmError::Io(e)) => {
                self.log_line(&format!("Error: create {filename}: {e}"));
                None
            }
            Err(e) => return Err(e),
        };

        match created {
            Some(handle) => {
                Fcb::view(&mut self.memory, fcb_addr).set_handle(handle);
                self.set_a(0x00);
            }
            None => self.set_a(0xFF),
        }
        Ok(())
    }

    /// BDOS 23: rename. The destination name sits in the second half of the
    /// FCB, 16 bytes in.
    fn bdos_rename(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, old_name) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.filename())
        };
        let new_name = Fcb::view(&mut self.memory, fcb_addr.wrapping_add(16)).filename();

        let renamed = self.drive_for(drive)?.rename(&old_name, &new_name);
        self.set_a(if renamed { 0x00 } else { 0xFF });
        Ok(())
    }

    /// BDOS 33: read the record named by the random-record field and leave
    /// the sequential position there.
    fn bdos_read_random(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, handle, record) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.handle()?, fcb.random_record())
        };
        if handle == 0 {
            return Err(CpmError::UnopenedFcb);
        }

        Fcb::view(&mut self.memory, fcb_addr).set_current_record(record);
        let n = self.read_record(drive, handle, record)?;
        self.set_record_status(if n == 0 { 0x01 } else { 0x00 });
        Ok(())
    }

    /// BDOS 34: write the DMA buffer at the random-record position, leaving
    /// the sequential position there. A refused write is "disk full".
    fn bdos_write_random(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, handle, record) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.handle()?, fcb.random_record())
        };
        if handle == 0 {
            return Err(CpmError::UnopenedFcb);
        }

        Fcb::view(&mut self.memory, fcb_addr).set_current_record(record);

        let mut buf = [0u8; RECORD_SIZE];
        self.read_guest(self.dma, &mut buf);

        let offset = record as u64 * RECORD_SIZE as u64;
        let written = match self.drive_for(drive)?.write_at(handle, offset, &buf) {
            Ok(n) => n,
            Err(CpmError::Io(e)) => {
                self.log_line(&format!("Error: random write failed: {e}"));
                0
            }
            Err(e) => return Err(e),
        };
        self.set_record_status(if written == 0 { 0x05 } else { 0x00 });
        Ok(())
    }

    /// BDOS 35: put the file's size, in records rounded up, into the
    /// random-record field.
    fn bdos_file_size(&mut self, fcb_addr: u16) -> CpmResult<()> {
        let (drive, filename) = {
            let fcb = Fcb::view(&mut self.memory, fcb_addr);
            (fcb.drive(), fcb.filename())
        };

        match self.drive_for(drive)?.file_size(&filename) {
            Some(size) => {
                let records = (size + RECORD_SIZE as u64 - 1) / RECORD_SIZE as u64;
                Fcb::view(&mut self.memory, fcb_addr).set_random_record(records as u32);
                self.set_a(0x00);
            }
            None => self.set_a(0xFF),
        }
        Ok(())
    }

    /// Transfer one record from the host into the DMA buffer, padding a
    /// short tail with ^Z. Returns the host byte count; zero bytes leave the
    /// DMA buffer untouched.
    fn read_record(&mut self, drive: u8, handle: FileHandle, record: u32) -> CpmResult<usize> {
        let mut buf = [0u8; RECORD_SIZE];
        let offset = record as u64 * RECORD_SIZE as u64;
        let n = self.drive_for(drive)?.read_at(handle, offset, &mut buf)?;
        if n > 0 {
            buf[n..].fill(0x1A);
            self.write_guest(self.dma, &buf);
        }
        Ok(n)
    }
}
