//! Scripted PDU conformance tests.
//!
//! Each test case replays a fixed PDU script against a peer under test over
//! an in-process duplex transport. The engine waits for every expected PDU,
//! compares it byte for byte, writes its own PDUs in order, and reports a
//! single pass or fail once the peer and transport have been released.
//!
//! # Usage
//!
//! ```bash
//! pdureplay-conformance --list
//! pdureplay-conformance --case /TP/HGRF/RH/BV-01-I --debug
//! pdureplay-conformance --prefix /TP/HGRF/ --transport stream
//! ```
//!
//! The binary exits with:
//! - 0: every selected case passed
//! - 1: a case failed or was not run
//! - 2: the harness itself could not start

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod harness;
pub mod peer;
pub mod registry;
pub mod replay;
pub mod reporter;
pub mod runner;
pub mod testcase;
pub mod tests;
pub mod tracing_setup;

use pdureplay_core::{Script, ScriptError};

/// A test case built into the catalog.
///
/// Cases are submitted with `inventory::submit!` next to their PDU tables and
/// collected by [`registry::Registry::with_catalog`].
pub struct CatalogCase {
    /// Unique test name.
    pub name: &'static str,
    /// Profile the case belongs to.
    pub profile: &'static str,
    /// Builds the script the engine replays.
    pub script: fn() -> Result<Script, ScriptError>,
}

inventory::collect!(CatalogCase);
