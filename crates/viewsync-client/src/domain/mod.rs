//! Domain layer for viewsync-client.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or external frameworks.  Message types and the tree model live
//! in `viewsync-core`; what remains here is the client's own configuration.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - Environment variable reading
//! - Anything that could block or fail due to external state, apart from the
//!   explicit style-table loader

pub mod config;

pub use config::{load_style_table, ClientConfig, ConfigError};
