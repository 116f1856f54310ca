use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::TransportError;

use super::{TransportBackend, check_pdu_size};

const CHANNEL_CAPACITY: usize = 64;

/// In-process endpoint. PDUs travel as whole `Bytes` messages, so boundaries
/// are kept exactly as a seqpacket socket pair keeps them.
#[derive(Clone, Debug)]
pub struct MemTransport {
    inner: Arc<MemInner>,
}

#[derive(Debug)]
struct MemInner {
    /// Sender into the other end's receiver. Taken on close so the other end
    /// observes the hangup.
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Bytes>>,
    closed: AtomicBool,
}

impl MemTransport {
    /// Returns (A, B) where PDUs sent on A are received on B and vice versa.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);

        let inner_a = Arc::new(MemInner {
            tx: Mutex::new(Some(tx_b)),
            rx: tokio::sync::Mutex::new(rx_a),
            closed: AtomicBool::new(false),
        });

        let inner_b = Arc::new(MemInner {
            tx: Mutex::new(Some(tx_a)),
            rx: tokio::sync::Mutex::new(rx_b),
            closed: AtomicBool::new(false),
        });

        (Self { inner: inner_a }, Self { inner: inner_b })
    }

    fn is_closed_inner(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl TransportBackend for MemTransport {
    async fn send_pdu(&self, pdu: &[u8]) -> Result<usize, TransportError> {
        if self.is_closed_inner() {
            return Err(TransportError::Closed);
        }
        check_pdu_size(pdu.len())?;

        let tx = self.inner.tx.lock().clone().ok_or(TransportError::Closed)?;
        tx.send(Bytes::copy_from_slice(pdu))
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(pdu.len())
    }

    async fn recv_pdu(&self) -> Result<Bytes, TransportError> {
        if self.is_closed_inner() {
            return Err(TransportError::Closed);
        }

        let mut rx = self.inner.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        drop(self.inner.tx.lock().take());

        // A reader parked in recv holds the lock; its receiver goes away with
        // the last handle instead.
        if let Ok(mut rx) = self.inner.rx.try_lock() {
            rx.close();
        }

        tracing::trace!("mem transport closed");
    }

    fn is_closed(&self) -> bool {
        self.is_closed_inner()
    }
}
