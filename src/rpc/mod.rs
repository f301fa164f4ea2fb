//! Host protocol subsystem.
//!
//! Compact binary command protocol over a polled byte stream.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Protocol Stack                         │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│  Parser  │──▶│  Engine (dispatcher)  │  │
//! │  │ (trait)   │   │ (resume) │   │  → ControlStateMachine│  │
//! │  └───────────┘   └──────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘               │
//! │       │              ▼                                     │
//! │  ┌───────────┐   ┌──────────┐                              │
//! │  │ Transport │◀──│  Stream  │   (periodic telemetry)       │
//! │  │ (write)   │   │ (push)   │                              │
//! │  └───────────┘   └──────────┘                              │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod parser;
pub mod protocol;
pub mod stream;
pub mod transport;

pub use engine::{Context, ProtocolEngine};
pub use parser::Parser;
pub use protocol::{Command, Opcode, Response, START_BYTE, StatusBits};
pub use transport::{NullTransport, Transport};
