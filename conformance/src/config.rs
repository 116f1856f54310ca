//! Harness configuration and command-line arguments.

use std::time::Duration;

use clap::Parser;
use pdureplay_core::TransportKind;

use crate::peer::{DEFAULT_MTU, DeviceInfo};
use crate::registry::CaseFilter;
use crate::tracing_setup::Verbosity;

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-run settings shared by every test instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Deadline for each inbound step. `None` waits forever.
    pub step_timeout: Option<Duration>,
    pub transport: TransportKind,
    pub device: DeviceInfo,
    pub mtu: u16,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            step_timeout: Some(DEFAULT_STEP_TIMEOUT),
            transport: TransportKind::default(),
            device: DeviceInfo::default(),
            mtu: DEFAULT_MTU,
        }
    }
}

impl HarnessConfig {
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }
}

#[derive(Parser, Debug)]
#[command(name = "pdureplay-conformance")]
#[command(about = "Replay scripted PDU exchanges against a peer under test")]
pub struct Args {
    /// List test cases instead of running them
    #[arg(long)]
    pub list: bool,

    /// Run a single test case by exact name (e.g. "/TP/HGRF/RH/BV-01-I")
    #[arg(long)]
    pub case: Option<String>,

    /// Only run test cases whose name starts with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Only run test cases whose name contains this string
    #[arg(long = "string")]
    pub substring: Option<String>,

    /// Log every PDU as a hex dump
    #[arg(long, short = 'd', conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log errors
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Per-step inbound deadline in milliseconds (0 waits forever)
    #[arg(long, env = "PDUREPLAY_STEP_TIMEOUT_MS", default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Transport backend (mem, stream)
    #[arg(long, env = "PDUREPLAY_TRANSPORT", default_value_t = TransportKind::Mem)]
    pub transport: TransportKind,
}

impl Args {
    pub fn harness_config(&self) -> HarnessConfig {
        let step_timeout = match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        HarnessConfig::default()
            .with_step_timeout(step_timeout)
            .with_transport(self.transport)
    }

    pub fn filter(&self) -> CaseFilter {
        CaseFilter {
            prefix: self.prefix.clone(),
            substring: self.substring.clone(),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        if self.debug {
            Verbosity::Debug
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }
}
