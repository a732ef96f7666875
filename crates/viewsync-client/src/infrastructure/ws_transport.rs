//! WebSocket-backed [`Transport`].
//!
//! `Transport::send` is synchronous, but writing to a WebSocket is not.  The
//! two are decoupled by an unbounded channel: [`WsTransport`] pushes
//! [`ClientMessage`]s into it and [`run_writer`], running in its own Tokio
//! task, serializes them to JSON text frames in the order they were sent.

use anyhow::Context;
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;
use viewsync_core::ClientMessage;

use crate::application::ports::{Transport, TransportError};

/// Enqueues outbound messages for the writer task.
#[derive(Debug, Clone)]
pub struct WsTransport {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl WsTransport {
    /// Creates a transport and the receiver [`run_writer`] drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for WsTransport {
    fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.tx
            .send(message)
            .map_err(|_| TransportError("connection writer has stopped".to_string()))
    }
}

/// Writes every queued message to `sink` as a JSON text frame.
///
/// Returns once every [`WsTransport`] handle is dropped and the queue is
/// drained, or on the first write failure.
pub async fn run_writer<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<ClientMessage>) -> anyhow::Result<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    while let Some(message) = rx.recv().await {
        let text = serde_json::to_string(&message).context("failed to serialize client message")?;
        debug!(bytes = text.len(), "client → server");
        sink.send(WsMessage::Text(text))
            .await
            .context("WebSocket send failed")?;
    }
    sink.close().await.context("failed to close WebSocket sink")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
