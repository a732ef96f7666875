//! Application layer for viewsync-client.
//!
//! The application layer orchestrates the business logic: it knows *what* to
//! do, but delegates *how* to do it to the infrastructure layer through the
//! ports in [`ports`].
//!
//! # Responsibilities
//!
//! - Holding the tree of the mounted view and applying patch batches
//! - Multiplexing named channels (events, requests, server requests)
//! - Forwarding bound callable invocations to the server
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or reading frames (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)
//! - Drawing anything (that is the rendering host's job)

pub mod channel_bridge;
pub mod channel_hub;
pub mod ports;
pub mod view_session;

pub use channel_bridge::{
    handler_fn, ChannelBridge, ChannelError, ChannelResetError, Handler, PendingRequest, Subscription,
    CLOSE_EVENT,
};
pub use channel_hub::ChannelHub;
pub use ports::{RenderHost, Transport, TransportError};
pub use view_session::{SessionError, TransportCallbackSink, ViewSession};
