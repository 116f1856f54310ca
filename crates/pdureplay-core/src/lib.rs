//! pdureplay-core: Scripted PDU exchanges for protocol conformance testing.
//!
//! This crate defines:
//! - Scripts of expected and outgoing PDUs ([`Script`], [`Step`], [`ScriptBuilder`])
//! - The exchange state machine that walks a script ([`Exchange`], [`ExchangeState`])
//! - The duplex transport stub the exchange runs over ([`Transport`])
//! - Error types ([`ScriptError`], [`ExchangeError`], [`TransportError`])
//! - Hex dump formatting for PDU diagnostics ([`hexdump`])
//!
//! The state machine is host-agnostic: it never performs I/O itself. A host
//! loop reads from the transport, feeds the bytes to [`Exchange::on_inbound`],
//! writes [`Exchange::outbound`] when the machine is ready to send, and
//! reports the write back through [`Exchange::on_sent`].

#![forbid(unsafe_code)]

mod error;
mod exchange;
mod hexdump;
mod script;
mod transport;

pub use error::*;
pub use exchange::*;
pub use hexdump::*;
pub use script::*;
pub use transport::*;

pub use bytes::Bytes;
