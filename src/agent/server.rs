//! Local producer ingress.
//!
//! Producers connect over TCP and submit one JSON request per line:
//! `{"destination": "event/x", "priority": "high", "payload": "..."}`.
//! Each accepted request is answered with `+OK`; a malformed line gets
//! `-ERR <reason>` and the connection stays open. Producers are
//! fire-and-forget: an accepted message may still be shed later under
//! memory pressure, and that is not reported back.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task;
use tracing::{debug, warn};

use crate::core::error::UplinkError;
use crate::core::message::{new_message, Priority};
use crate::core::qos;

/// One producer submission.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub destination: String,
    #[serde(default)]
    pub priority: Priority,
    pub payload: String,
}

/// Accept loop; one task per producer connection.
pub async fn serve(listener: TcpListener, handler: Arc<qos::Handler>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!(%addr, "producer connected");

        let handler = Arc::clone(&handler);
        task::spawn(async move {
            if let Err(err) = handle_producer(stream, handler).await {
                debug!(%addr, %err, "producer connection closed");
            }
        });
    }
}

/// Reads submissions line by line until the producer disconnects or the
/// handler shuts down.
pub async fn handle_producer(
    stream: TcpStream,
    handler: Arc<qos::Handler>,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: SubmitRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_half
                    .write_all(format!("-ERR {err}\n").as_bytes())
                    .await?;
                continue;
            }
        };

        let msg = new_message(
            request.destination,
            request.priority,
            request.payload.into_bytes(),
        );
        match handler.enqueue(msg).await {
            Ok(()) => write_half.write_all(b"+OK\n").await?,
            Err(UplinkError::Shutdown) => {
                write_half.write_all(b"-ERR shutdown\n").await?;
                return Ok(());
            }
            Err(err) => {
                warn!(%err, "enqueue failed");
                write_half
                    .write_all(format!("-ERR {err}\n").as_bytes())
                    .await?;
            }
        }
    }

    Ok(())
}
