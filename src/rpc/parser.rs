//! Resumable command parser.
//!
//! Bytes are pushed one at a time as the transport yields them; partial
//! messages survive between polls in the [`Transmission`]. The parser
//! never waits for input.
//!
//! ```text
//!  OutOfFrame ──STX──▶ AwaitOpcode ──op──▶ Payload ──full──▶ dispatch
//!      ▲                   │  (0-byte op)─────────────────────▶ dispatch
//!      └─ unknown op / bad length / bad escape / dispatch ◀─────┘
//!  (STX in any state restarts at AwaitOpcode)
//! ```
//!
//! Payload bytes arrive stuffed (see [`protocol`](super::protocol)), so a
//! start byte always begins a new message and abandons the one in flight.

use super::protocol::{
    Command, DATA_HEADER_LEN, ESCAPE_BYTE, MAX_PAYLOAD, Opcode, START_BYTE, read_data_header,
    unescape,
};

/// Parse state for the message currently being received.
#[derive(Debug, Clone)]
struct Transmission {
    in_progress: bool,
    opcode: Option<Opcode>,
    bytes_received: usize,
    bytes_remaining: usize,
    /// The previous byte was [`ESCAPE_BYTE`].
    escaped: bool,
    payload: [u8; MAX_PAYLOAD],
}

impl Transmission {
    const fn empty() -> Self {
        Self {
            in_progress: false,
            opcode: None,
            bytes_received: 0,
            bytes_remaining: 0,
            escaped: false,
            payload: [0; MAX_PAYLOAD],
        }
    }

    fn clear(&mut self) {
        self.in_progress = false;
        self.opcode = None;
        self.bytes_received = 0;
        self.bytes_remaining = 0;
        self.escaped = false;
    }
}

/// Streaming command parser.
pub struct Parser {
    tx: Transmission,
    /// Messages abandoned by a restart, unknown opcode, bad length or bad escape.
    discarded: u32,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub const fn new() -> Self {
        Self {
            tx: Transmission::empty(),
            discarded: 0,
        }
    }

    /// Push one byte. Returns a command when this byte completed one.
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        if byte == START_BYTE {
            if self.tx.opcode.is_some() {
                self.discarded = self.discarded.wrapping_add(1);
            }
            self.tx.clear();
            self.tx.in_progress = true;
            return None;
        }
        if !self.tx.in_progress {
            return None;
        }

        let Some(opcode) = self.tx.opcode else {
            return self.accept_opcode(byte);
        };

        let byte = if self.tx.escaped {
            self.tx.escaped = false;
            match unescape(byte) {
                Some(raw) => raw,
                None => {
                    self.abandon();
                    return None;
                }
            }
        } else if byte == ESCAPE_BYTE {
            self.tx.escaped = true;
            return None;
        } else {
            byte
        };

        let tx = &mut self.tx;
        tx.payload[tx.bytes_received] = byte;
        tx.bytes_received += 1;
        tx.bytes_remaining -= 1;

        if opcode == Opcode::SetData
            && tx.bytes_received == DATA_HEADER_LEN
            && tx.bytes_remaining == 0
        {
            match read_data_header(&tx.payload[..DATA_HEADER_LEN]) {
                Some((_, len)) => tx.bytes_remaining = len as usize,
                None => {
                    self.abandon();
                    return None;
                }
            }
        }

        if self.tx.bytes_remaining > 0 {
            return None;
        }
        let cmd = Command::decode(opcode, &self.tx.payload[..self.tx.bytes_received]);
        if cmd.is_none() {
            self.discarded = self.discarded.wrapping_add(1);
        }
        self.tx.clear();
        cmd
    }

    /// Push a run of bytes, handing every completed command to `on_command`.
    pub fn feed(&mut self, bytes: &[u8], mut on_command: impl FnMut(Command)) {
        for &b in bytes {
            if let Some(cmd) = self.push(b) {
                on_command(cmd);
            }
        }
    }

    /// A message has started and not yet completed.
    pub fn in_progress(&self) -> bool {
        self.tx.in_progress
    }

    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    pub fn reset(&mut self) {
        self.tx.clear();
    }

    fn accept_opcode(&mut self, byte: u8) -> Option<Command> {
        let Some(opcode) = Opcode::from_byte(byte) else {
            self.abandon();
            return None;
        };
        let len = opcode.payload_len();
        if len == 0 {
            self.tx.clear();
            return Command::decode(opcode, &[]);
        }
        self.tx.opcode = Some(opcode);
        self.tx.bytes_remaining = len;
        None
    }

    fn abandon(&mut self) {
        self.discarded = self.discarded.wrapping_add(1);
        self.tx.clear();
    }
}
