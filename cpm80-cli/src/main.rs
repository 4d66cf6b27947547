//! cpm80 - run CP/M 2.2 programs against a host directory.
//!
//! Usage:
//!   cpm80 --drive <host-dir> PROGRAM.COM [args...]
//!
//! The directory is mounted as drive A and the .COM image is loaded at the
//! TPA. `--log` and `--printer` capture the guest's log and printer streams
//! in `cpm.log` / `cpm.prn`; `--disassemble` adds per-instruction
//! disassembly to the log.

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::info;
use tokio::sync::mpsc as tokio_mpsc;

use cpm80_core::{CpmConsole, CpmEmulator, DirDriveFS, ExitReason, FileSink};

/// Run CP/M 2.2 programs
#[derive(Parser, Debug)]
#[command(name = "cpm80")]
#[command(about = "Run CP/M programs against a host directory")]
struct Args {
    /// Host directory mounted as drive A
    #[arg(long, default_value = ".")]
    drive: PathBuf,

    /// Stream per-instruction disassembly into cpm.log
    #[arg(long)]
    disassemble: bool,

    /// Write emulator diagnostics to cpm.log
    #[arg(long)]
    log: bool,

    /// Write guest printer output to cpm.prn
    #[arg(long)]
    printer: bool,

    /// CP/M program image (.COM)
    program: PathBuf,

    /// Command tail passed to the program
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

/// Console fed by the keyboard task over a channel. A blocked `read_key` is
/// the suspended guest reader: the thread parks in `recv` until a key
/// arrives.
struct ChannelConsole {
    keys: mpsc::Receiver<u8>,
    pending: VecDeque<u8>,
}

impl ChannelConsole {
    fn new(keys: mpsc::Receiver<u8>) -> Self {
        Self {
            keys,
            pending: VecDeque::new(),
        }
    }

    fn drain(&mut self) {
        while let Ok(ch) = self.keys.try_recv() {
            self.pending.push_back(ch);
        }
    }
}

impl CpmConsole for ChannelConsole {
    fn write(&mut self, ch: u8) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();

        match ch {
            0x0D => {
                let _ = handle.write_all(b"\r");
            }
            0x0A => {
                let _ = handle.write_all(b"\n");
            }
            0x08 => {
                let _ = handle.write_all(b"\x08 \x08");
            }
            0x07 => {
                let _ = handle.write_all(b"\x07");
            }
            _ => {
                let _ = handle.write_all(&[ch]);
            }
        }
        let _ = handle.flush();
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

/// Translate crossterm key events to CP/M key codes. Control-modified
/// letters become control bytes; arrows map to the WordStar diamond.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                return Some(upper as u8 - 64); // Ctrl+A = 1 ... Ctrl+Z = 26
            }
        }
    }

    match code {
        KeyCode::Char(c) => Some(c as u8),
        KeyCode::Enter => Some(13),
        KeyCode::Backspace => Some(8),
        KeyCode::Tab => Some(9),
        KeyCode::Esc => Some(27),
        KeyCode::Up => Some(11),
        KeyCode::Down => Some(10),
        KeyCode::Left => Some(8),
        KeyCode::Right => Some(12),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let program = fs::read(&args.program)
        .map_err(|e| format!("{}: {e}", args.program.display()))?;
    let drive = DirDriveFS::new(&args.drive)
        .map_err(|e| format!("{}: {e}", args.drive.display()))?;

    let (key_tx, key_rx) = mpsc::channel::<u8>();
    let (shutdown_tx, mut shutdown_rx) = tokio_mpsc::channel::<()>(1);
    let console = ChannelConsole::new(key_rx);

    let raw_mode = enable_raw_mode().is_ok();

    let tail = args.args.join(" ");
    let disassemble = args.disassemble;
    let want_log = args.log || args.disassemble;
    let want_printer = args.printer;

    let emu_task = tokio::task::spawn_blocking(move || {
        let mut emu: CpmEmulator<ChannelConsole, DirDriveFS> = CpmEmulator::new(console);
        emu.mount(0, drive);

        if want_log {
            match FileSink::create("cpm.log") {
                Ok(sink) => emu.set_log(Box::new(sink)),
                Err(e) => log::warn!("cpm.log: {e}"),
            }
        }
        if want_printer {
            match FileSink::create("cpm.prn") {
                Ok(sink) => emu.set_printer(Box::new(sink)),
                Err(e) => log::warn!("cpm.prn: {e}"),
            }
        }
        emu.set_disassembly(disassemble);

        emu.load_com(&program);
        if !tail.is_empty() {
            emu.set_command_tail(&tail);
        }

        emu.run()
    });

    // Keyboard producer: raw-mode events become console-channel bytes.
    let input_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(Duration::from_millis(10)) => {
                    while event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        if let Ok(Event::Key(key)) = event::read() {
                            if let Some(ch) = translate_key(key.code, key.modifiers) {
                                if ch == 0x03 {
                                    // Ctrl-C: tear the terminal down and go.
                                    if raw_mode {
                                        let _ = disable_raw_mode();
                                    }
                                    eprintln!();
                                    std::process::exit(0);
                                }
                                if key_tx.send(ch).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
    });

    let result = emu_task.await?;

    let _ = shutdown_tx.send(()).await;
    let _ = input_task.await;

    if raw_mode {
        let _ = disable_raw_mode();
    }

    match result {
        Ok(exit) => {
            info!(
                "guest exited: {:?} after {} T-states",
                exit.reason, exit.t_states
            );
            if let ExitReason::Error(message) = exit.reason {
                eprintln!("\n{message}");
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
