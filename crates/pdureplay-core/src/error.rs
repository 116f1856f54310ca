//! Error types for scripts, transports and exchanges.

use core::fmt;

use bytes::Bytes;

use crate::{ExchangeState, hex_short};

/// Transport-level errors.
#[derive(Debug)]
pub enum TransportError {
    /// The endpoint was closed locally or the other end went away.
    Closed,
    Io(std::io::Error),
    PduTooLarge {
        len: usize,
        max: usize,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "transport closed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::PduTooLarge { len, max } => {
                write!(f, "PDU of {len} bytes exceeds max {max}")
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Script construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    EmptyPdu { index: usize },
    PduTooLarge { index: usize, len: usize, max: usize },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPdu { index } => write!(f, "step {index}: PDU payload is empty"),
            Self::PduTooLarge { index, len, max } => {
                write!(f, "step {index}: PDU of {len} bytes exceeds max {max}")
            }
        }
    }
}

impl std::error::Error for ScriptError {}

/// The condition that ended an inbound wait without a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupCondition {
    /// A read completed with zero bytes.
    ZeroRead,
    /// The other end closed its endpoint.
    Hangup,
    /// The endpoint reported an I/O error.
    Error,
}

impl fmt::Display for HangupCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroRead => write!(f, "zero-byte read"),
            Self::Hangup => write!(f, "hangup"),
            Self::Error => write!(f, "error condition"),
        }
    }
}

/// Errors raised by the exchange state machine.
///
/// Every variant carries the index of the script step that was active when
/// the exchange failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Inbound bytes differ in length or content from the expected PDU.
    Mismatch {
        step: usize,
        expected: Bytes,
        actual: Bytes,
    },
    /// The other end went away before the script finished.
    Disconnected {
        step: usize,
        condition: HangupCondition,
    },
    /// The transport accepted fewer bytes than the PDU holds.
    ShortWrite {
        step: usize,
        expected: usize,
        written: usize,
    },
    /// An event arrived that the current state does not accept.
    OutOfTurn { step: usize, state: ExchangeState },
}

impl ExchangeError {
    pub fn step(&self) -> usize {
        match self {
            Self::Mismatch { step, .. }
            | Self::Disconnected { step, .. }
            | Self::ShortWrite { step, .. }
            | Self::OutOfTurn { step, .. } => *step,
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                step,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "step {step}: PDU mismatch\n  expected ({} bytes): {}\n  actual   ({} bytes): {}",
                    expected.len(),
                    hex_short(expected),
                    actual.len(),
                    hex_short(actual)
                )
            }
            Self::Disconnected { step, condition } => {
                write!(f, "step {step}: peer disconnected ({condition})")
            }
            Self::ShortWrite {
                step,
                expected,
                written,
            } => {
                write!(f, "step {step}: short write ({written} of {expected} bytes)")
            }
            Self::OutOfTurn { step, state } => {
                write!(f, "step {step}: unexpected event while {state}")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}
