//! PDU traffic observation.
//!
//! Sinks see every PDU the engine reads or writes, tagged with direction.
//! They never influence the exchange.

use std::fmt;

use bytes::Bytes;
use pdureplay_core::{Direction, hexdump};

pub trait DiagnosticSink: Send + Sync {
    fn pdu(&self, case: &str, direction: Direction, data: &[u8]);
}

/// Logs a hex dump of each PDU at `debug` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn pdu(&self, case: &str, direction: Direction, data: &[u8]) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                case,
                len = data.len(),
                "{}",
                hexdump(Some(direction), data).trim_end()
            );
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn pdu(&self, _case: &str, _direction: Direction, _data: &[u8]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficEntry {
    pub step: usize,
    pub direction: Direction,
    pub data: Bytes,
}

/// Every PDU one test instance exchanged, in order.
#[derive(Debug, Clone, Default)]
pub struct TrafficLog {
    entries: Vec<TrafficEntry>,
}

impl TrafficLog {
    pub fn record(&mut self, step: usize, direction: Direction, data: Bytes) {
        self.entries.push(TrafficEntry {
            step,
            direction,
            data,
        });
    }

    pub fn entries(&self) -> &[TrafficEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for TrafficLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let label = match entry.direction {
                Direction::Inbound => "received",
                Direction::Outbound => "sent",
            };
            writeln!(
                f,
                "[step {}] {} {} bytes:",
                entry.step,
                label,
                entry.data.len()
            )?;
            f.write_str(&hexdump(Some(entry.direction), &entry.data))?;
        }
        Ok(())
    }
}
