//! One named logical channel multiplexed over the shared connection.
//!
//! # How it works (for beginners)
//!
//! The server and the client can talk on many independent channels over one
//! WebSocket.  Each [`ChannelBridge`] owns one channel name and offers three
//! things:
//!
//! - **events**: [`ChannelBridge::emit`] sends, [`ChannelBridge::on`] listens;
//! - **requests**: [`ChannelBridge::request`] sends a message carrying a fresh
//!   correlation id and returns a future that completes when the server replies
//!   with `in_response_to` set to that id;
//! - **server requests**: an inbound message with an `id` is handed to the
//!   first handler for its event, and whatever the handler returns is sent back
//!   as the reply.
//!
//! Messages that arrive before anyone listens for their event are kept in a
//! backlog and replayed, in arrival order, to the first handler registered for
//! that event.
//!
//! Handlers are `async`.  Each event name gets its own delivery task, started
//! the first time a message for that event is routed to a handler.  Messages
//! for one event are handled one at a time in the order they arrived, while a
//! slow handler never holds up messages for other events.  A handler that
//! panics is treated like one that returned an error.
//!
//! # Terminal state
//!
//! Receiving the reserved [`CLOSE_EVENT`] or calling [`ChannelBridge::close`]
//! (connection loss) resets the bridge for good: every pending request fails
//! with [`ChannelResetError`], handlers and backlog are cleared, queued
//! deliveries are dropped, and every later call fails with the same error.
//! A new logical session needs a new bridge (see `ChannelHub`).

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use anyhow::anyhow;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value as Json;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;
use viewsync_core::{ChannelMessage, ClientMessage};

use super::ports::{Transport, TransportError};

/// Reserved event that tears the channel down.
pub const CLOSE_EVENT: &str = "$close";

/// The terminal error of a closed or disconnected bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("channel '{channel}' was reset")]
pub struct ChannelResetError {
    pub channel: String,
}

/// Errors surfaced by [`ChannelBridge`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Reset(#[from] ChannelResetError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote side answered a request with an error.
    #[error("remote error: {0}")]
    Remote(String),
}

/// Future returned by a handler.
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Json>>;

/// An async event handler.  The returned value is only used when the message
/// was a server-initiated request.
pub type Handler = Arc<dyn Fn(Json) -> HandlerFuture + Send + Sync>;

/// Wraps an async closure into a [`Handler`].
///
/// ```rust
/// use viewsync_client::application::channel_bridge::handler_fn;
///
/// let echo = handler_fn(|payload| async move { Ok(payload) });
/// # drop(echo);
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Json) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Json>> + Send + 'static,
{
    Arc::new(move |payload| f(payload).boxed())
}

// ── Internal state ────────────────────────────────────────────────────────────

type Reply = Result<Json, ChannelError>;

/// Work queued for the delivery task.
enum Delivery {
    Event { handlers: Vec<Handler>, payload: Json },
    Request { handler: Handler, id: Uuid, payload: Json },
}

#[derive(Default)]
struct BridgeState {
    closed: bool,
    pending: HashMap<Uuid, oneshot::Sender<Reply>>,
    handlers: HashMap<String, Vec<(u64, Handler)>>,
    backlog: Vec<ChannelMessage>,
    /// One delivery queue per event name.
    deliveries: HashMap<String, mpsc::UnboundedSender<Delivery>>,
    next_subscription: u64,
}

impl BridgeState {
    /// Queues `message` for its handlers, or backlogs it when there are none.
    ///
    /// Spawns the event's delivery task on first use, so it must run inside a
    /// Tokio runtime.
    fn route(&mut self, bridge: &Arc<BridgeInner>, event: &str, message: ChannelMessage) {
        let channel = bridge.channel.as_str();
        let handlers: Vec<Handler> = self
            .handlers
            .get(event)
            .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        let Some(first) = handlers.first().cloned() else {
            debug!(channel, event, "no handler yet, backlogging message");
            self.backlog.push(message);
            return;
        };

        let delivery = match message.id {
            Some(id) => Delivery::Request {
                handler: first,
                id,
                payload: message.payload,
            },
            None => Delivery::Event {
                handlers,
                payload: message.payload,
            },
        };

        let tx = self.deliveries.entry(event.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_deliveries(Arc::downgrade(bridge), event.to_string(), rx));
            tx
        });
        if tx.send(delivery).is_err() {
            warn!(channel, event, "delivery task is gone, dropping message");
        }
    }
}

struct BridgeInner {
    channel: String,
    transport: Arc<dyn Transport>,
    state: Mutex<BridgeState>,
}

impl BridgeInner {
    // Never held across an `.await`.
    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_error(&self) -> ChannelResetError {
        ChannelResetError {
            channel: self.channel.clone(),
        }
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.lock().closed {
            return Err(self.reset_error().into());
        }
        Ok(())
    }

    fn send(&self, message: ChannelMessage) -> Result<(), TransportError> {
        self.transport.send(ClientMessage::Channel(message))
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// A multiplexed logical channel.  Cloning yields another handle to the same
/// channel.
#[derive(Clone)]
pub struct ChannelBridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for ChannelBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ChannelBridge")
            .field("channel", &self.inner.channel)
            .field("closed", &state.closed)
            .field("pending", &state.pending.len())
            .field("backlog", &state.backlog.len())
            .finish()
    }
}

impl ChannelBridge {
    /// Creates an open bridge for `channel`.
    ///
    /// Delivering messages to handlers spawns Tokio tasks, so [`dispatch`] and
    /// [`on`] must be called from within a Tokio runtime.
    ///
    /// [`dispatch`]: ChannelBridge::dispatch
    /// [`on`]: ChannelBridge::on
    pub fn new(channel: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(BridgeInner {
            channel: channel.into(),
            transport,
            state: Mutex::new(BridgeState::default()),
        });
        debug!(channel = %inner.channel, "channel bridge opened");

        Self { inner }
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Number of messages waiting for a handler.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().backlog.len()
    }

    /// Sends a fire-and-forget event.
    pub fn emit(&self, event: &str, payload: Json) -> Result<(), ChannelError> {
        self.inner.ensure_open()?;
        debug!(channel = %self.inner.channel, event, "emit");
        self.inner
            .send(ChannelMessage::event(self.inner.channel.as_str(), event, payload))?;
        Ok(())
    }

    /// Sends a request and returns a future for its reply.
    ///
    /// No timeout is applied; wrap the future in `tokio::time::timeout` if the
    /// caller needs one.
    ///
    /// # Errors
    ///
    /// Fails synchronously with [`ChannelError::Reset`] on a closed bridge and
    /// with [`ChannelError::Transport`] when the message cannot be enqueued.
    pub fn request(&self, event: &str, payload: Json) -> Result<PendingRequest, ChannelError> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(self.inner.reset_error().into());
            }
            state.pending.insert(id, tx);
        }

        debug!(channel = %self.inner.channel, event, %id, "request");
        let message = ChannelMessage::request(self.inner.channel.as_str(), event, payload, id);
        if let Err(e) = self.inner.send(message) {
            self.inner.lock().pending.remove(&id);
            return Err(e.into());
        }

        Ok(PendingRequest {
            id,
            channel: self.inner.channel.clone(),
            rx,
        })
    }

    /// Registers `handler` for `event` and replays any backlog for that event.
    pub fn on(&self, event: &str, handler: Handler) -> Result<Subscription, ChannelError> {
        let mut state = self.inner.lock();
        if state.closed {
            return Err(self.inner.reset_error().into());
        }

        let id = state.next_subscription;
        state.next_subscription += 1;
        state
            .handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));

        let (replay, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut state.backlog)
            .into_iter()
            .partition(|m| m.event.as_deref() == Some(event));
        state.backlog = keep;
        if !replay.is_empty() {
            debug!(channel = %self.inner.channel, event, count = replay.len(), "replaying backlog");
        }
        for message in replay {
            state.route(&self.inner, event, message);
        }

        Ok(Subscription {
            bridge: Arc::downgrade(&self.inner),
            event: event.to_string(),
            id,
        })
    }

    /// Routes one inbound message for this channel.
    pub fn dispatch(&self, message: ChannelMessage) {
        let mut state = self.inner.lock();
        if state.closed {
            debug!(channel = %self.inner.channel, "bridge closed, dropping inbound message");
            return;
        }

        if let Some(request_id) = message.in_response_to {
            let Some(tx) = state.pending.remove(&request_id) else {
                warn!(channel = %self.inner.channel, %request_id, "reply for unknown request");
                return;
            };
            drop(state);
            let reply = match message.error {
                Some(error) => Err(ChannelError::Remote(error)),
                None => Ok(message.payload),
            };
            if tx.send(reply).is_err() {
                debug!(channel = %self.inner.channel, %request_id, "requester no longer waiting");
            }
            return;
        }

        let Some(event) = message.event.clone() else {
            warn!(channel = %self.inner.channel, "message without event or correlation id");
            return;
        };

        if event == CLOSE_EVENT {
            drop(state);
            self.close();
            return;
        }

        state.route(&self.inner, &event, message);
    }

    /// Moves the bridge to its terminal state.  Idempotent.
    pub fn close(&self) {
        let pending = {
            let mut state = self.inner.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.handlers.clear();
            state.backlog.clear();
            state.deliveries.clear();
            std::mem::take(&mut state.pending)
        };

        let reset = self.inner.reset_error();
        let rejected = pending.len();
        for (_, tx) in pending {
            // The requester may have dropped its future already.
            let _ = tx.send(Err(reset.clone().into()));
        }
        info!(channel = %self.inner.channel, rejected, "channel closed");
    }
}

// ── Pending request ───────────────────────────────────────────────────────────

/// Resolves with the reply payload of one request.
#[derive(Debug)]
pub struct PendingRequest {
    id: Uuid,
    channel: String,
    rx: oneshot::Receiver<Reply>,
}

impl PendingRequest {
    /// The correlation id sent with the request.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Future for PendingRequest {
    type Output = Reply;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(reply)) => Poll::Ready(reply),
            // The bridge went away without answering.
            Poll::Ready(Err(_)) => Poll::Ready(Err(ChannelResetError {
                channel: this.channel.clone(),
            }
            .into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// Handle for one registered handler.  Dropping it keeps the handler.
#[derive(Debug)]
pub struct Subscription {
    bridge: Weak<BridgeInner>,
    event: String,
    id: u64,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Removes the handler.  A no-op once the bridge is closed or gone.
    pub fn unsubscribe(self) {
        let Some(inner) = self.bridge.upgrade() else {
            return;
        };
        let mut state = inner.lock();
        if let Some(entries) = state.handlers.get_mut(&self.event) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                state.handlers.remove(&self.event);
            }
        }
    }
}

impl std::fmt::Debug for BridgeInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeInner").field("channel", &self.channel).finish()
    }
}

// ── Delivery task ─────────────────────────────────────────────────────────────

/// Text carried by a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one handler to completion.  A panic, whether raised while building
/// the future or while polling it, comes back as an error.
async fn call_handler(handler: &Handler, payload: Json) -> anyhow::Result<Json> {
    let future = panic::catch_unwind(AssertUnwindSafe(|| handler(payload)))
        .map_err(|p| anyhow!("handler panicked: {}", panic_message(p.as_ref())))?;
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(p) => Err(anyhow!("handler panicked: {}", panic_message(p.as_ref()))),
    }
}

/// Runs the handlers of one event one at a time, in queue order.
async fn run_deliveries(bridge: Weak<BridgeInner>, event: String, mut rx: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        let Some(inner) = bridge.upgrade() else {
            break;
        };
        if inner.lock().closed {
            break;
        }

        match delivery {
            Delivery::Event { handlers, payload } => {
                for handler in handlers {
                    if let Err(e) = call_handler(&handler, payload.clone()).await {
                        warn!(channel = %inner.channel, %event, error = %e, "event handler failed");
                    }
                }
            }
            Delivery::Request { handler, id, payload } => {
                let reply = match call_handler(&handler, payload).await {
                    Ok(value) => ChannelMessage::reply(inner.channel.as_str(), id, value),
                    Err(e) => ChannelMessage::error_reply(inner.channel.as_str(), id, e.to_string()),
                };
                if inner.lock().closed {
                    debug!(channel = %inner.channel, %id, "bridge closed before reply was sent");
                    break;
                }
                if let Err(e) = inner.send(reply) {
                    warn!(channel = %inner.channel, %id, error = %e, "failed to send reply");
                }
            }
        }
    }
    debug!(%event, "channel delivery task stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
