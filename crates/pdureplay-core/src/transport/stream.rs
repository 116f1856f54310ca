use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;

use crate::TransportError;

use super::{TransportBackend, check_pdu_size};

/// Size of the little-endian length prefix in front of every PDU.
const LEN_PREFIX: usize = 4;

type Reader = Box<dyn AsyncRead + Unpin + Send + Sync>;
type Writer = Box<dyn AsyncWrite + Unpin + Send + Sync>;

/// Endpoint over any byte stream.
///
/// Wire format per PDU: `[u32 LE length][payload]`. Reads reassemble PDUs
/// however the stream splits or coalesces the bytes.
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("closed", &self.is_closed_inner())
            .finish_non_exhaustive()
    }
}

struct StreamInner {
    reader: AsyncMutex<Option<Reader>>,
    writer: AsyncMutex<Option<Writer>>,
    closed: AtomicBool,
}

impl StreamTransport {
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            inner: Arc::new(StreamInner {
                reader: AsyncMutex::new(Some(Box::new(reader))),
                writer: AsyncMutex::new(Some(Box::new(writer))),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn pair() -> (Self, Self) {
        let (a, b) = tokio::io::duplex(65536);
        (Self::new(a), Self::new(b))
    }

    fn is_closed_inner(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

fn map_io(e: std::io::Error) -> TransportError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::ConnectionReset => TransportError::Closed,
        _ => TransportError::Io(e),
    }
}

impl TransportBackend for StreamTransport {
    async fn send_pdu(&self, pdu: &[u8]) -> Result<usize, TransportError> {
        if self.is_closed_inner() {
            return Err(TransportError::Closed);
        }
        check_pdu_size(pdu.len())?;

        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;

        writer
            .write_all(&(pdu.len() as u32).to_le_bytes())
            .await
            .map_err(map_io)?;
        writer.write_all(pdu).await.map_err(map_io)?;
        writer.flush().await.map_err(map_io)?;
        Ok(pdu.len())
    }

    async fn recv_pdu(&self) -> Result<Bytes, TransportError> {
        if self.is_closed_inner() {
            return Err(TransportError::Closed);
        }

        let mut guard = self.inner.reader.lock().await;
        let reader = guard.as_mut().ok_or(TransportError::Closed)?;

        let mut len_buf = [0u8; LEN_PREFIX];
        reader.read_exact(&mut len_buf).await.map_err(map_io)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        check_pdu_size(len)?;

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await.map_err(map_io)?;
        Ok(Bytes::from(buf))
    }

    fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // The stream is released once both halves are gone. A half still
        // locked by an in-flight call is dropped with the last handle.
        if let Ok(mut writer) = self.inner.writer.try_lock() {
            writer.take();
        }
        if let Ok(mut reader) = self.inner.reader.try_lock() {
            reader.take();
        }

        tracing::trace!("stream transport closed");
    }

    fn is_closed(&self) -> bool {
        self.is_closed_inner()
    }
}
