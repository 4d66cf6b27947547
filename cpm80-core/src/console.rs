//! Console seam between the guest's character I/O and the host terminal.

use std::collections::VecDeque;

/// Character console as BDOS and the CBIOS see it.
///
/// `read_key` may block. Under the CLI it parks the scheduler thread on a
/// channel receive until the keyboard task delivers a byte; that is how a
/// guest suspended in console input waits without burning CPU steps. A key
/// arriving while a reader is parked is handed to it directly, and because
/// the one scheduler thread is the only reader, a second read can never be
/// issued while the first is pending.
pub trait CpmConsole: Send {
    /// Send one byte to the terminal.
    fn write(&mut self, ch: u8);

    /// True if at least one key is queued.
    fn key_ready(&mut self) -> bool;

    /// Dequeue a key without blocking.
    fn poll_key(&mut self) -> Option<u8>;

    /// Dequeue a key, blocking until one arrives.
    fn read_key(&mut self) -> u8;
}

/// Test console: captures output, serves pre-queued keys. `read_key` on an
/// empty queue returns 0 rather than blocking forever.
#[derive(Default)]
pub struct HeadlessConsole {
    output: Vec<u8>,
    keys: VecDeque<u8>,
}

impl HeadlessConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with keys already queued.
    pub fn with_keys(keys: &[u8]) -> Self {
        Self {
            output: Vec::new(),
            keys: keys.iter().copied().collect(),
        }
    }

    /// Queue more keys.
    pub fn queue_keys(&mut self, keys: &[u8]) {
        self.keys.extend(keys.iter().copied());
    }

    /// Everything the guest wrote so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output as a string (lossy UTF-8).
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl CpmConsole for HeadlessConsole {
    fn write(&mut self, ch: u8) {
        self.output.push(ch);
    }

    fn key_ready(&mut self) -> bool {
        !self.keys.is_empty()
    }

    fn poll_key(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }

    fn read_key(&mut self) -> u8 {
        self.keys.pop_front().unwrap_or(0)
    }
}
