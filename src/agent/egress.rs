//! Buffered single-writer sink for the upstream connection.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::egress::Egress;
use crate::core::error::UplinkError;
use crate::core::message::{encode_frame, Message};

/// Writes one JSON frame per message and flushes per delivery.
///
/// The dispatcher guarantees a single writer, so the mutex only guards
/// against the embedder holding the egress elsewhere.
pub struct WriterEgress<W> {
    writer: Mutex<BufWriter<W>>,
}

impl<W> WriterEgress<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
        }
    }
}

#[async_trait]
impl<W> Egress for WriterEgress<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn handle_message(&self, msg: &Message) -> Result<(), UplinkError> {
        let frame = encode_frame(msg)?;

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(|e| UplinkError::Transport(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| UplinkError::Transport(e.to_string()))?;

        debug!(id = msg.id, destination = %msg.destination, "message forwarded");
        Ok(())
    }
}

/// The production egress: one TCP connection to the upstream service.
pub type TcpEgress = WriterEgress<OwnedWriteHalf>;

impl TcpEgress {
    pub async fn connect(addr: &str) -> Result<Self, UplinkError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| UplinkError::Transport(format!("connect {addr}: {e}")))?;
        info!(%addr, "connected to upstream");

        // The inbound half is unused; the agent only pushes.
        let (_, write_half) = stream.into_split();
        Ok(WriterEgress::new(write_half))
    }
}
