//! Duplex transport stub.
//!
//! The public API is the [`Transport`] enum. Each backend lives in its own
//! module under `transport/` and implements the internal
//! [`TransportBackend`] trait. Every backend preserves PDU boundaries: one
//! `send` on one end is exactly one `recv` on the other, in order.

use core::fmt;
use core::str::FromStr;

use bytes::Bytes;

use crate::{MAX_PDU_SIZE, TransportError};

pub(crate) trait TransportBackend: Send + Sync + Clone + 'static {
    async fn send_pdu(&self, pdu: &[u8]) -> Result<usize, TransportError>;
    async fn recv_pdu(&self) -> Result<Bytes, TransportError>;
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// Which backend a transport pair uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// In-process message channel.
    #[default]
    Mem,
    /// Length-prefixed PDUs over a byte stream.
    Stream,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mem => write!(f, "mem"),
            Self::Stream => write!(f, "stream"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mem" => Ok(Self::Mem),
            "stream" => Ok(Self::Stream),
            other => Err(format!("unknown transport '{other}' (expected mem or stream)")),
        }
    }
}

/// One endpoint of a duplex transport.
///
/// Clones share the endpoint; closing any clone closes all of them.
#[derive(Clone, Debug)]
pub enum Transport {
    Mem(mem::MemTransport),
    Stream(stream::StreamTransport),
}

impl Transport {
    /// Create two connected endpoints of the given kind.
    pub fn pair(kind: TransportKind) -> (Self, Self) {
        match kind {
            TransportKind::Mem => Self::mem_pair(),
            TransportKind::Stream => Self::stream_pair(),
        }
    }

    pub fn mem_pair() -> (Self, Self) {
        let (a, b) = mem::MemTransport::pair();
        (Transport::Mem(a), Transport::Mem(b))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + Sync + 'static,
    {
        Transport::Stream(stream::StreamTransport::new(stream))
    }

    pub fn stream_pair() -> (Self, Self) {
        let (a, b) = stream::StreamTransport::pair();
        (Transport::Stream(a), Transport::Stream(b))
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Mem(_) => TransportKind::Mem,
            Transport::Stream(_) => TransportKind::Stream,
        }
    }

    /// Write one PDU. Returns the number of payload bytes written.
    pub async fn send(&self, pdu: &[u8]) -> Result<usize, TransportError> {
        match self {
            Transport::Mem(t) => t.send_pdu(pdu).await,
            Transport::Stream(t) => t.send_pdu(pdu).await,
        }
    }

    /// Read one PDU. A closed or vanished peer yields [`TransportError::Closed`].
    pub async fn recv(&self) -> Result<Bytes, TransportError> {
        match self {
            Transport::Mem(t) => t.recv_pdu().await,
            Transport::Stream(t) => t.recv_pdu().await,
        }
    }

    /// Close the endpoint. Calling it again does nothing.
    pub fn close(&self) {
        match self {
            Transport::Mem(t) => t.close(),
            Transport::Stream(t) => t.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Transport::Mem(t) => t.is_closed(),
            Transport::Stream(t) => t.is_closed(),
        }
    }
}

fn check_pdu_size(len: usize) -> Result<(), TransportError> {
    if len > MAX_PDU_SIZE {
        return Err(TransportError::PduTooLarge {
            len,
            max: MAX_PDU_SIZE,
        });
    }
    Ok(())
}

pub mod mem;
pub mod stream;
