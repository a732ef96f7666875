//! Infrastructure layer for viewsync-client.
//!
//! The infrastructure layer handles all I/O: the WebSocket connection to the
//! view server and the task that writes outbound frames.
//!
//! # Responsibilities
//!
//! - Opening the WebSocket connection
//! - Implementing the `Transport` port on top of it
//! - Reading server frames and feeding them to the view session
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Patch application or channel routing (that is the application layer)
//! - Configuration parsing (that is done in `main.rs`)

pub mod ws_client;
pub mod ws_transport;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use ws_client::run_client;
pub use ws_transport::{run_writer, WsTransport};
