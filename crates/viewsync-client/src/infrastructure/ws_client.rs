//! WebSocket client: connect, mount, read loop, and shutdown.
//!
//! This module is responsible for:
//!
//! 1. Loading the optional style table.
//! 2. Opening the WebSocket connection to the view server.
//! 3. Spawning the writer task behind [`WsTransport`].
//! 4. Mounting the configured route.
//! 5. Feeding every inbound text frame to the [`ViewSession`].
//! 6. Unmounting when the `running` flag is cleared, and resetting every
//!    channel when the connection ends.
//!
//! # Portability
//!
//! Shutdown is triggered by a shared `AtomicBool` that is set by a Ctrl+C
//! signal handler (see `main.rs`), and the read loop polls it every 200 ms.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{Stream, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, info, warn};
use viewsync_core::{ComponentRegistry, FrameError, ProtocolError, ServerMessage, StyleTable};

use crate::application::{RenderHost, ViewSession};
use crate::domain::config::{load_style_table, ClientConfig};
use crate::infrastructure::ws_transport::{run_writer, WsTransport};

/// How often the read loop wakes up to check the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long the writer gets to flush queued messages after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Public API ────────────────────────────────────────────────────────────────

/// Connects to `config.server_url`, mounts `config.route`, and keeps the view
/// in sync until the server closes the connection or `running` is cleared.
///
/// # Errors
///
/// Returns an error if the style table cannot be loaded, the connection
/// cannot be established, a read fails, or the view hits a fatal error.
pub async fn run_client(
    config: ClientConfig,
    host: Arc<dyn RenderHost>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let styles = match &config.styles_path {
        Some(path) => load_style_table(path)
            .with_context(|| format!("failed to load style table {}", path.display()))?,
        None => StyleTable::default(),
    };

    let (ws_stream, _response) = connect_async(config.server_url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", config.server_url))?;
    info!("connected to {}", config.server_url);

    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (transport, outbound) = WsTransport::channel();
    let writer = tokio::spawn(run_writer(ws_tx, outbound));

    let mut session = ViewSession::new(config.route.clone(), Arc::new(transport), host).with_styles(styles);
    if !config.components.is_empty() {
        let mut components = ComponentRegistry::new();
        for key in &config.components {
            components.register(key.clone(), ());
        }
        session = session.with_components(Arc::new(components));
    }

    session.mount().context("failed to send mount")?;
    let result = read_loop(&mut session, &mut ws_rx, &running).await;
    session.disconnect();

    // Dropping the session drops the last transport handle, which lets the
    // writer flush and close the socket.
    drop(session);
    match timeout(WRITER_DRAIN_TIMEOUT, writer).await {
        Ok(Ok(Ok(()))) => debug!("writer finished"),
        Ok(Ok(Err(e))) => warn!("writer stopped with error: {e:#}"),
        Ok(Err(e)) => warn!("writer task failed: {e}"),
        Err(_) => warn!("writer did not finish in time"),
    }

    result
}

// ── Read loop ─────────────────────────────────────────────────────────────────

/// What one inbound frame amounts to.
#[derive(Debug)]
enum Inbound {
    Message(ServerMessage),
    /// A tree-bearing frame that could not be decoded.
    Violation(ProtocolError),
    Closed,
    Skip,
}

fn parse_frame(frame: WsMessage) -> Inbound {
    match frame {
        WsMessage::Text(text) => match ServerMessage::from_frame(&text) {
            Ok(message) => Inbound::Message(message),
            Err(FrameError::Protocol(e)) => Inbound::Violation(e),
            Err(FrameError::Unreadable(e)) => {
                // The tree is untouched, so the view can carry on.
                warn!("skipping server frame: {e}");
                Inbound::Skip
            }
        },
        WsMessage::Binary(_) => {
            warn!("unexpected binary WebSocket frame (ignored)");
            Inbound::Skip
        }
        WsMessage::Close(_) => Inbound::Closed,
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => Inbound::Skip,
    }
}

/// Feeds frames from `stream` into `session` until the stream ends, a close
/// frame arrives, or `running` is cleared.
async fn read_loop<S>(session: &mut ViewSession, stream: &mut S, running: &AtomicBool) -> anyhow::Result<()>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; unmounting");
            if let Err(e) = session.unmount() {
                warn!("failed to send unmount: {e}");
            }
            return Ok(());
        }

        let next = match timeout(POLL_INTERVAL, stream.next()).await {
            Ok(next) => next,
            // Nothing in the last 200 ms; re-check the flag.
            Err(_) => continue,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(WsError::ConnectionClosed)) | None => {
                info!("server closed the connection");
                return Ok(());
            }
            Some(Err(e)) => return Err(e).context("WebSocket read failed"),
        };

        match parse_frame(frame) {
            Inbound::Message(message) => session
                .handle_server_message(message)
                .context("view failed")?,
            Inbound::Violation(e) => {
                return Err(anyhow::Error::new(session.reject_frame(e)).context("view failed"));
            }
            Inbound::Closed => {
                info!("server sent Close frame");
                return Ok(());
            }
            Inbound::Skip => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
