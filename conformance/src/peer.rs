//! The implementation-under-test contract.
//!
//! A peer is built by a [`PeerFactory`] from the test case and fixed device
//! identification, then attached to its end of the transport. The engine
//! never looks inside a peer; it only sees the PDUs the peer writes.

use pdureplay_core::Transport;

use crate::error::SetupError;
use crate::testcase::TestCase;

/// Default ATT MTU for the link handed to a peer.
pub const DEFAULT_MTU: u16 = 23;

/// Identification a peer is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: "bluez-hog".to_string(),
            vendor: 0x0002,
            product: 0x0001,
            version: 0x0001,
        }
    }
}

/// The peer's end of the transport, plus link parameters.
#[derive(Debug, Clone)]
pub struct PeerLink {
    transport: Transport,
    mtu: u16,
}

impl PeerLink {
    pub fn new(transport: Transport, mtu: u16) -> Self {
        Self { transport, mtu }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn into_transport(self) -> Transport {
        self.transport
    }
}

/// An implementation under test.
pub trait Peer: Send {
    /// Bind the peer to its endpoint and start it.
    fn attach(&mut self, link: PeerLink) -> Result<(), SetupError>;

    /// Stop the peer and release its endpoint. Called at most once, during
    /// teardown.
    fn detach(&mut self);
}

/// Builds a fresh peer for each test instance.
pub trait PeerFactory: Send + Sync {
    fn create(&self, case: &TestCase, device: &DeviceInfo) -> Result<Box<dyn Peer>, SetupError>;
}

impl<F> PeerFactory for F
where
    F: Fn(&TestCase, &DeviceInfo) -> Result<Box<dyn Peer>, SetupError> + Send + Sync,
{
    fn create(&self, case: &TestCase, device: &DeviceInfo) -> Result<Box<dyn Peer>, SetupError> {
        self(case, device)
    }
}
