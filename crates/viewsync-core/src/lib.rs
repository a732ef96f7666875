//! # viewsync-core
//!
//! Shared library for viewsync containing the node model, the patch engine,
//! the binding registry, the graph wire codec, and the JSON message types.
//!
//! This crate has no dependencies on sockets, async runtimes, or rendering
//! hosts.  The `viewsync-client` crate wires it to a transport.
//!
//! # Architecture overview (for beginners)
//!
//! viewsync keeps a UI description held by a client in step with one computed
//! on a server.  Instead of resending the whole description after every
//! change, the server sends small, ordered, path-addressed patches.
//!
//! - **`domain`** – The data everything else is about: [`Node`] trees, the
//!   [`Path`]s that address positions inside them, the [`Instruction`]s that
//!   mutate them, and [`BoundCallback`]s that stand in for server-side event
//!   handlers.
//!
//! - **`binding`** – The [`BindingRegistry`]: which prop slots hold
//!   callables, nested sub-trees, or style tokens, plus the style table and
//!   component lookup those slots are resolved against.
//!
//! - **`patch`** – Turns wire nodes into hydrated nodes and applies patch
//!   batches while sharing every untouched subtree with the previous tree.
//!
//! - **`protocol`** – The server/client message enums and a codec that
//!   carries object graphs (shared references, cycles, timestamps, sets,
//!   maps) through plain JSON.

// Rust will look for each module in a subdirectory with the same name
// (e.g., src/patch/mod.rs).
pub mod binding;
pub mod domain;
pub mod patch;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `viewsync_core::ViewTree` instead of `viewsync_core::patch::engine::ViewTree`.
pub use binding::{
    BindingKind, BindingRegistry, BindingSeed, ComponentLookup, ComponentRegistry,
    MissingRegistryEntry, StyleTable,
};
pub use domain::callback::{BoundCallback, CallbackInvocation, CallbackSink, CALLBACK_PLACEHOLDER};
pub use domain::instruction::Instruction;
pub use domain::node::{Element, Node, NodeError, PropValue, Tag, WireElement, WireNode};
pub use domain::path::{Path, PathParseError, Segment};
pub use patch::{apply_batch, hydrate_node, ApplyError, ProtocolError, ViewTree};
pub use protocol::codec::{decode, encode, Payload, SerializationError};
pub use protocol::messages::{ChannelMessage, ClientMessage, FrameError, RouteContext, ServerMessage, TreeSnapshot};
pub use protocol::value::{Timestamp, Value};
