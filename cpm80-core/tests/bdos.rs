//! End-to-end BDOS behavior, driven by hand-assembled guest programs
//! against an in-memory drive.

mod common;

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::Asm;
use cpm80_core::bdos::{addr, Fcb};
use cpm80_core::{
    ByteSink, CpmConsole, CpmEmulator, DriveFS, ExitReason, HeadlessConsole, MemoryDriveFS,
};

const FCB1: u16 = addr::FCB1;

fn emulator_with_drive(drive: MemoryDriveFS) -> CpmEmulator<HeadlessConsole, MemoryDriveFS> {
    let mut emu = CpmEmulator::new(HeadlessConsole::new());
    emu.mount(0, drive);
    emu
}

fn set_fcb1_name(emu: &mut CpmEmulator<HeadlessConsole, MemoryDriveFS>, name: &str) {
    Fcb::view(emu.memory_mut(), FCB1).set_filename(name);
}

#[test]
fn sequential_read_pads_the_tail_and_reports_eof() {
    let file: Vec<u8> = (0..200).map(|i| i as u8).collect();
    let mut drive = MemoryDriveFS::new();
    drive.add_file("A.DAT", file.clone());

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "A.DAT");

    let program = Asm::new()
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3000) // OPEN
        .ld_c(20).ld_de(FCB1).call_bdos().store_a(0x3001) // READ SEQ
        .copy(0x0080, 0x3100, 128)
        .ld_c(20).ld_de(FCB1).call_bdos().store_a(0x3002)
        .copy(0x0080, 0x3180, 128)
        .ld_c(20).ld_de(FCB1).call_bdos().store_a(0x3003) // at EOF
        .exit()
        .build();
    emu.load_com(&program);

    let info = emu.run().unwrap();
    assert_eq!(info.reason, ExitReason::WarmBoot);

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0x00, "open");
    assert_eq!(mem[0x3001], 0x00, "first read");
    assert_eq!(mem[0x3002], 0x00, "second read");
    assert_eq!(mem[0x3003], 0x01, "read at EOF");

    // First record is the first 128 file bytes verbatim.
    assert_eq!(&mem[0x3100..0x3180], &file[..128]);

    // Second record: the 72-byte tail then ^Z padding.
    assert_eq!(&mem[0x3180..0x3180 + 72], &file[128..]);
    assert!(mem[0x3180 + 72..0x3200].iter().all(|&b| b == 0x1A));

    // The EOF read left the DMA buffer untouched.
    assert_eq!(&mem[0x0080..0x0100], &mem[0x3180..0x3200]);
}

#[test]
fn random_write_past_eof_zero_fills_the_gap() {
    let mut drive = MemoryDriveFS::new();
    drive.add_file("B.DAT", Vec::new());

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "B.DAT");
    Fcb::view(emu.memory_mut(), FCB1).set_random_record(3);
    emu.memory_mut()[0x0080..0x0100].fill(0xAA);

    let program = Asm::new()
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3000) // OPEN
        .ld_c(34).ld_de(FCB1).call_bdos().store_a(0x3001) // WRITE RND
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0x00);
    assert_eq!(mem[0x3001], 0x00);

    // Random I/O repositions the sequential cursor.
    assert_eq!(Fcb::view(emu.memory_mut(), FCB1).current_record().unwrap(), 3);

    let data = emu.drive(0).unwrap().file_contents("B.DAT").unwrap();
    assert_eq!(data.len(), 512);
    assert!(data[..384].iter().all(|&b| b == 0x00));
    assert!(data[384..].iter().all(|&b| b == 0xAA));
}

#[test]
fn directory_scan_yields_sorted_entries_then_stops() {
    let mut drive = MemoryDriveFS::new();
    drive.add_file("BETA.TXT", b"b".to_vec());
    drive.add_file("ALPHA.DAT", b"a".to_vec());

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "????????.???");

    let program = Asm::new()
        .ld_c(17).ld_de(FCB1).call_bdos().store_a(0x3000) // SEARCH FIRST
        .copy(0x0080, 0x3100, 128)
        .ld_c(18).ld_de(FCB1).call_bdos().store_a(0x3001) // SEARCH NEXT
        .copy(0x0080, 0x3180, 128)
        .ld_c(18).ld_de(FCB1).call_bdos().store_a(0x3002) // exhausted
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0x00);
    assert_eq!(mem[0x3100], 0x00);
    assert_eq!(&mem[0x3101..0x310C], b"ALPHA   DAT");
    assert!(mem[0x3120..0x3180].iter().all(|&b| b == 0xE5));

    assert_eq!(mem[0x3001], 0x00);
    assert_eq!(&mem[0x3181..0x318C], b"BETA    TXT");

    // Exhausted scan answers 0xFF and leaves the DMA buffer alone.
    assert_eq!(mem[0x3002], 0xFF);
    assert_eq!(&mem[0x0080..0x0100], &mem[0x3180..0x3200]);
}

#[test]
fn make_close_open_round_trip_yields_an_empty_file() {
    let mut emu = emulator_with_drive(MemoryDriveFS::new());
    set_fcb1_name(&mut emu, "C.DAT");

    let program = Asm::new()
        .ld_c(22).ld_de(FCB1).call_bdos().store_a(0x3000) // MAKE
        .ld_c(16).ld_de(FCB1).call_bdos().store_a(0x3001) // CLOSE
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3002) // OPEN
        .ld_c(16).ld_de(FCB1).call_bdos().store_a(0x3003) // CLOSE
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(&mem[0x3000..0x3004], &[0, 0, 0, 0]);
    assert_eq!(emu.drive(0).unwrap().file_contents("C.DAT").unwrap(), b"");

    // The close dropped the embedded handle.
    assert_eq!(Fcb::view(emu.memory_mut(), FCB1).handle().unwrap(), 0);
}

#[test]
fn sequential_write_survives_reopen_and_read_back() {
    let mut emu = emulator_with_drive(MemoryDriveFS::new());
    set_fcb1_name(&mut emu, "D.DAT");
    emu.memory_mut()[0x0080..0x0100].fill(0x5A);

    let cr = FCB1 + 32;
    let program = Asm::new()
        .ld_c(22).ld_de(FCB1).call_bdos().store_a(0x3000) // MAKE
        .ld_c(21).ld_de(FCB1).call_bdos().store_a(0x3001) // WRITE SEQ
        .ld_c(16).ld_de(FCB1).call_bdos() // CLOSE
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3002) // OPEN again
        .ld_a(0).store_a(cr) // rewind to record 0
        .ld_c(20).ld_de(FCB1).call_bdos().store_a(0x3003) // READ SEQ
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(&mem[0x3000..0x3004], &[0, 0, 0, 0]);
    assert!(mem[0x0080..0x0100].iter().all(|&b| b == 0x5A));
    assert_eq!(
        emu.drive(0).unwrap().file_contents("D.DAT").unwrap(),
        &[0x5A; 128][..]
    );
}

#[test]
fn rename_then_open_by_both_names() {
    let mut drive = MemoryDriveFS::new();
    drive.add_file("OLD.TXT", b"payload".to_vec());

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "OLD.TXT");
    // The rename destination is the second half of the FCB, which is
    // exactly where FCB2 sits.
    Fcb::view(emu.memory_mut(), addr::FCB2).set_filename("NEW.TXT");
    // Opening FCB1 scribbles its embedded handle over FCB2's name bytes,
    // so the new name gets its own FCB clear of the overlap.
    Fcb::view(emu.memory_mut(), 0x2000).set_filename("NEW.TXT");

    let program = Asm::new()
        .ld_c(23).ld_de(FCB1).call_bdos().store_a(0x3000) // RENAME
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3001) // OPEN old name
        .ld_c(15).ld_de(0x2000).call_bdos().store_a(0x3002) // OPEN new name
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0x00);
    assert_eq!(mem[0x3001], 0xFF, "old name is gone");
    assert_eq!(mem[0x3002], 0x00, "new name opens");

    let fs = emu.drive(0).unwrap();
    assert!(!fs.exists("OLD.TXT"));
    assert_eq!(fs.file_contents("NEW.TXT").unwrap(), b"payload");
}

#[test]
fn delete_reports_missing_files() {
    let mut drive = MemoryDriveFS::new();
    drive.add_file("E.TXT", b"x".to_vec());

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "E.TXT");

    let program = Asm::new()
        .ld_c(19).ld_de(FCB1).call_bdos().store_a(0x3000) // DELETE
        .ld_c(19).ld_de(FCB1).call_bdos().store_a(0x3001) // already gone
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0x00);
    assert_eq!(mem[0x3001], 0xFF);
    assert!(!emu.drive(0).unwrap().exists("E.TXT"));
}

#[test]
fn compute_file_size_rounds_up_to_records() {
    let mut drive = MemoryDriveFS::new();
    drive.add_file("F.DAT", vec![0u8; 300]);

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "F.DAT");

    let program = Asm::new()
        .ld_c(35).ld_de(FCB1).call_bdos().store_a(0x3000)
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    assert_eq!(emu.memory()[0x3000], 0x00);
    assert_eq!(Fcb::view(emu.memory_mut(), FCB1).random_record(), 3);
}

#[test]
fn random_read_repositions_the_sequential_cursor() {
    let mut file = vec![0u8; 256];
    file[128..].fill(0x42);
    let mut drive = MemoryDriveFS::new();
    drive.add_file("G.DAT", file);

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "G.DAT");
    Fcb::view(emu.memory_mut(), FCB1).set_random_record(1);

    let program = Asm::new()
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3000) // OPEN
        .ld_c(33).ld_de(FCB1).call_bdos().store_a(0x3001) // READ RND
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0x00);
    assert_eq!(mem[0x3001], 0x00);
    assert!(mem[0x0080..0x0100].iter().all(|&b| b == 0x42));
    assert_eq!(Fcb::view(emu.memory_mut(), FCB1).current_record().unwrap(), 1);
}

#[test]
fn console_input_echoes_and_returns_the_key() {
    let mut emu = CpmEmulator::new(HeadlessConsole::with_keys(b"A"));
    emu.mount(0, MemoryDriveFS::new());

    let program = Asm::new()
        .ld_c(1).call_bdos().store_a(0x3000) // CONIN
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    assert_eq!(emu.memory()[0x3000], 0x41);
    assert_eq!(emu.console().output_string(), "A");
}

#[test]
fn direct_io_and_status_track_the_key_queue() {
    let mut emu = CpmEmulator::new(HeadlessConsole::with_keys(b"Z"));
    emu.mount(0, MemoryDriveFS::new());

    let program = Asm::new()
        .ld_c(11).call_bdos().store_a(0x3000) // CONST: key pending
        .ld_c(6).ld_e(0xFF).call_bdos().store_a(0x3001) // direct read
        .ld_c(11).call_bdos().store_a(0x3002) // CONST: drained
        .ld_c(6).ld_e(0xFF).call_bdos().store_a(0x3003) // nothing left
        .ld_c(6).ld_e(b'!').call_bdos() // direct write
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 1);
    assert_eq!(mem[0x3001], b'Z');
    assert_eq!(mem[0x3002], 0);
    assert_eq!(mem[0x3003], 0);
    assert_eq!(emu.console().output_string(), "!");
}

#[test]
fn selecting_a_missing_drive_keeps_the_current_one() {
    let mut emu = emulator_with_drive(MemoryDriveFS::new());
    emu.mount(1, MemoryDriveFS::new());

    let program = Asm::new()
        .ld_c(14).ld_e(7).call_bdos().store_a(0x3000) // SELDSK E: nothing there
        .ld_c(25).call_bdos().store_a(0x3001) // still on A
        .ld_c(14).ld_e(1).call_bdos().store_a(0x3002) // SELDSK B
        .ld_c(25).call_bdos().store_a(0x3003)
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0xFF);
    assert_eq!(mem[0x3001], 0);
    assert_eq!(mem[0x3002], 0x00);
    assert_eq!(mem[0x3003], 1);
}

/// Sink that keeps its bytes reachable from the test after the emulator
/// takes ownership.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl ByteSink for SharedSink {
    fn write(&mut self, bytes: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(bytes);
    }
}

#[test]
fn list_output_goes_to_the_printer_sink() {
    let printer = SharedSink::default();

    let mut emu = emulator_with_drive(MemoryDriveFS::new());
    emu.set_printer(Box::new(printer.clone()));

    let program = Asm::new()
        .ld_c(5).ld_e(b'P').call_bdos()
        .ld_c(5).ld_e(b'!').call_bdos()
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    assert_eq!(printer.contents(), b"P!");
    assert_eq!(emu.console().output_string(), "", "printer is not the console");
}

#[test]
fn unhandled_calls_are_logged_and_leave_registers_alone() {
    let log = SharedSink::default();

    let mut emu = emulator_with_drive(MemoryDriveFS::new());
    emu.set_log(Box::new(log.clone()));

    let program = Asm::new()
        .ld_a(0x77)
        .ld_c(12).call_bdos() // ReturnVersion: not dispatched here
        .store_a(0x3000)
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    assert_eq!(emu.memory()[0x3000], 0x77, "A survives an unhandled call");
    let logged = String::from_utf8(log.contents()).unwrap();
    assert!(logged.contains("Unhandled BDOS call 12"), "log was: {logged}");
}

#[test]
fn setdma_retargets_record_transfers() {
    let mut drive = MemoryDriveFS::new();
    drive.add_file("H.DAT", vec![0x99; 128]);

    let mut emu = emulator_with_drive(drive);
    set_fcb1_name(&mut emu, "H.DAT");

    let program = Asm::new()
        .ld_c(26).ld_de(0x3800).call_bdos() // SETDMA
        .ld_c(15).ld_de(FCB1).call_bdos().store_a(0x3000) // OPEN
        .ld_c(20).ld_de(FCB1).call_bdos().store_a(0x3001) // READ SEQ
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(&mem[0x3000..0x3002], &[0, 0]);
    assert!(mem[0x3800..0x3880].iter().all(|&b| b == 0x99));
    // The default DMA buffer stayed out of it.
    assert!(mem[0x0080..0x0100].iter().all(|&b| b == 0x00));
}

#[test]
fn cbios_console_entries_are_live() {
    let cbios = 0xFF00u16;
    let mut emu = CpmEmulator::new(HeadlessConsole::with_keys(b"k"));
    emu.mount(0, MemoryDriveFS::new());

    let program = Asm::new()
        .call(cbios + 6).store_a(0x3000) // CONST: key pending -> 0xFF
        .call(cbios + 9).store_a(0x3001) // CONIN -> 'k', no echo
        .call(cbios + 6).store_a(0x3002) // CONST: drained -> 0x00
        .ld_c(b'X').call(cbios + 12) // CONOUT writes C
        .exit()
        .build();
    emu.load_com(&program);

    emu.run().unwrap();

    let mem = emu.memory();
    assert_eq!(mem[0x3000], 0xFF);
    assert_eq!(mem[0x3001], b'k');
    assert_eq!(mem[0x3002], 0x00);
    assert_eq!(emu.console().output_string(), "X");
}

/// Console whose `read_key` genuinely blocks on a channel, like the CLI's.
struct BlockingConsole {
    keys: mpsc::Receiver<u8>,
    pending: VecDeque<u8>,
    output: Vec<u8>,
}

impl BlockingConsole {
    fn new(keys: mpsc::Receiver<u8>) -> Self {
        Self {
            keys,
            pending: VecDeque::new(),
            output: Vec::new(),
        }
    }

    fn drain(&mut self) {
        while let Ok(ch) = self.keys.try_recv() {
            self.pending.push_back(ch);
        }
    }
}

impl CpmConsole for BlockingConsole {
    fn write(&mut self, ch: u8) {
        self.output.push(ch);
    }

    fn key_ready(&mut self) -> bool {
        self.drain();
        !self.pending.is_empty()
    }

    fn poll_key(&mut self) -> Option<u8> {
        self.drain();
        self.pending.pop_front()
    }

    fn read_key(&mut self) -> u8 {
        if let Some(ch) = self.poll_key() {
            return ch;
        }
        self.keys.recv().unwrap_or(0)
    }
}

#[test]
fn console_input_suspends_until_a_key_arrives() {
    let (tx, rx) = mpsc::channel();
    let mut emu = CpmEmulator::new(BlockingConsole::new(rx));
    emu.mount(0, MemoryDriveFS::new());

    let program = Asm::new()
        .ld_c(1).call_bdos().store_a(0x3000) // parks until the key lands
        .exit()
        .build();
    emu.load_com(&program);

    let sender = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        tx.send(0x41).unwrap();
    });

    let info = emu.run().unwrap();
    sender.join().unwrap();

    assert_eq!(info.reason, ExitReason::WarmBoot);
    assert_eq!(emu.memory()[0x3000], 0x41);
    assert_eq!(emu.console().output, b"A");
}
