//! Outbound ports of the application layer.
//!
//! The session and the channel bridges never touch a socket or a UI toolkit
//! directly.  They talk to these two traits instead, which lets the
//! infrastructure layer plug in a WebSocket today and lets tests plug in
//! `mockall` doubles.

use std::sync::Arc;

use thiserror::Error;
use viewsync_core::{ClientMessage, Node};

/// The outbound half of the connection refused or lost a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Carries client messages to the server.
///
/// `send` only enqueues; it must not block on network I/O.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn send(&self, message: ClientMessage) -> Result<(), TransportError>;
}

/// The external rendering host that displays the view tree.
#[cfg_attr(test, mockall::automock)]
pub trait RenderHost: Send + Sync {
    /// Displays a new root.  Unchanged subtrees keep their `Arc` identity.
    fn render(&self, root: &Arc<Node>);

    /// Server-driven navigation to `to`.
    fn navigate(&self, to: &str, replace: bool);

    /// Surfaces a server-side or session error.
    fn report_error(&self, message: &str);
}
