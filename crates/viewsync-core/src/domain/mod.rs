//! Domain entities for viewsync.
//!
//! This module contains pure data types with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Describes the data the whole system is about: here, a tree of UI nodes,
//!   the paths that address positions inside it, and the instructions that
//!   mutate it.
//! - Has **no** imports from network libraries, async runtimes, or rendering
//!   hosts.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Code in outer layers (the patch engine, the client session, the WebSocket
//! transport) depends on the domain, but the domain never depends on them.

/// Bound callables and the sink they forward invocations to.
pub mod callback;

/// Update instructions carried by `patch_batch` messages.
pub mod instruction;

/// The node tree: hydrated [`node::Node`] and wire [`node::WireNode`] forms.
pub mod node;

/// Dot-joined tree addresses.
pub mod path;
