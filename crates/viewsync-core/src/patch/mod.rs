//! Patch engine: hydration of wire nodes and ordered application of update
//! instructions.
//!
//! # How patching works (for beginners)
//!
//! The tree is never mutated in place.  Applying an instruction walks from the
//! root to the addressed node, builds a modified copy of that node, and then
//! rebuilds each ancestor on the way back up with the one changed child
//! swapped in.  Every sibling off that path is shared with the previous tree
//! through its `Arc`.  A rendering host can therefore skip any subtree whose
//! pointer did not change.

use thiserror::Error;

use crate::binding::MissingRegistryEntry;
use crate::domain::node::NodeError;

pub mod engine;
pub mod hydrate;

pub use engine::{apply_batch, ViewTree};
pub use hydrate::hydrate_node;

/// The server sent something that does not fit the held tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The path text could not be parsed.
    #[error("malformed path: {0:?}")]
    MalformedPath(String),

    /// An instruction of a patch batch could not be read, for example
    /// because its `op` is unknown or a field is missing.
    #[error("malformed instruction #{index}: {message}")]
    MalformedInstruction { index: usize, message: String },

    /// A `tree_init` or `patch_batch` message could not be read as a whole.
    #[error("malformed {kind} message: {message}")]
    MalformedMessage { kind: String, message: String },

    /// The path descends through, or targets, something that is not an element.
    #[error("node at {path:?} is not an element")]
    NotAnElement { path: String },

    /// A child index is beyond the element's children.
    #[error("index {index} out of range at {path:?} (element has {len} children)")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// A named segment addresses a prop that does not hold a sub-tree.
    #[error("prop {key:?} at {path:?} does not hold a render-prop sub-tree")]
    NotARenderProp { path: String, key: String },

    /// A wire node carries an invalid tag.
    #[error("invalid node at {path:?}: {source}")]
    InvalidNode {
        path: String,
        #[source]
        source: NodeError,
    },

    /// A render-prop value could not be read as a wire node.
    #[error("malformed node at {path:?}: {message}")]
    MalformedNode { path: String, message: String },

    /// A patch arrived before the initial tree.
    #[error("patch received before the tree was initialized")]
    TreeNotInitialized,
}

/// Failure of a patch batch.  Either way the batch is not committed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApplyError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    MissingRegistryEntry(#[from] MissingRegistryEntry),
}
