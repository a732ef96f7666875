//! Binding registry and the lookup tables it consults.
//!
//! - [`path_set`]: sorted slot lists with prefix search.
//! - [`registry`]: the per-view [`registry::BindingRegistry`].
//! - [`style`]: `moduleId:className` resolution.
//! - [`components`]: mount-point component lookup.

use thiserror::Error;

pub mod components;
pub mod path_set;
pub mod registry;
pub mod style;

pub use components::{ComponentLookup, ComponentRegistry};
pub use path_set::PathSet;
pub use registry::{BindingKind, BindingRegistry, BindingSeed};
pub use style::StyleTable;

/// A lookup key the client has no definition for.
///
/// This always means the server and the client disagree about the set of
/// components or styles, and is fatal for the view.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MissingRegistryEntry {
    #[error("no component registered under {key:?}")]
    Component { key: String },

    #[error("unknown style module {module:?}")]
    StyleModule { module: String },

    #[error("style module {module:?} has no class {class:?}")]
    StyleClass { module: String, class: String },
}
