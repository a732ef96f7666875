//! viewsync-client library crate.
//!
//! This crate keeps a server-driven view in sync on the client side: it holds
//! the tree of the mounted view, applies patch batches from the server, turns
//! user interaction into callback messages, and multiplexes named channels over
//! the same connection.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! View server (JSON over WebSocket)
//!         ↕
//! [viewsync-client]
//!   ├── domain/           ClientConfig, style table loading
//!   ├── application/      ViewSession, ChannelHub, ChannelBridge, ports
//!   └── infrastructure/
//!         ├── ws_client/    connect + read loop (tokio-tungstenite)
//!         └── ws_transport/ Transport port over the WebSocket writer
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O apart from loading the style table file.
//! - `application` depends on `domain` and `viewsync-core` only; it reaches
//!   the network and the screen through the `Transport` and `RenderHost` ports.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # For beginners: why this structure?
//!
//! Clean architecture separates *what the program does* (domain + application)
//! from *how it does it* (infrastructure).  Every session and channel test in
//! this crate runs against `mockall` doubles of the two ports, without a socket.

/// Domain layer: configuration types.
pub mod domain;

/// Application layer: view session and channel bridges.
pub mod application;

/// Infrastructure layer: WebSocket client and transport.
pub mod infrastructure;
