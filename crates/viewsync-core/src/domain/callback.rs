//! Bound callables stored in element props.
//!
//! The server never sends executable code.  Instead, a prop whose slot is
//! registered as a callback path carries the placeholder literal
//! [`CALLBACK_PLACEHOLDER`], and the client swaps it for a [`BoundCallback`]:
//! a small handle that remembers *where* in the tree it was bound and forwards
//! every call to a [`CallbackSink`] (normally the transport back to the
//! server).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::path::Path;

/// The literal prop value that marks an unbound callable.
pub const CALLBACK_PLACEHOLDER: &str = "$cb";

/// A callable invocation travelling from the client back to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackInvocation {
    /// Text form of the element path the callable is bound to (`""` for root).
    pub path: String,
    /// Prop name of the callable on that element.
    pub key: String,
    /// Event arguments supplied by the rendering host.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

/// Receiver for callback invocations.
///
/// Infrastructure implementations forward to the server transport; tests
/// record calls.
#[cfg_attr(test, mockall::automock)]
pub trait CallbackSink: Send + Sync {
    /// Forwards one invocation.  Returns a description of the failure when
    /// the invocation could not be delivered.
    fn invoke(&self, invocation: CallbackInvocation) -> Result<(), String>;
}

struct Binding {
    path: Path,
    key: String,
    sink: Arc<dyn CallbackSink>,
}

/// A callable bound to one prop slot of the tree.
///
/// Cloning is cheap and preserves identity.  Two handles are *identical*
/// ([`BoundCallback::ptr_eq`]) only when they come from the same binding;
/// they are *equal* (`==`) when they are bound to the same slot.
#[derive(Clone)]
pub struct BoundCallback {
    inner: Arc<Binding>,
}

impl BoundCallback {
    pub(crate) fn new(path: Path, key: impl Into<String>, sink: Arc<dyn CallbackSink>) -> Self {
        Self {
            inner: Arc::new(Binding {
                path,
                key: key.into(),
                sink,
            }),
        }
    }

    /// Element path this callable was bound at.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Prop name this callable was bound under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Invokes the callable, forwarding `(path, key, args)` to the sink.
    pub fn call(&self, args: Vec<serde_json::Value>) -> Result<(), String> {
        self.inner.sink.invoke(CallbackInvocation {
            path: self.inner.path.to_string(),
            key: self.inner.key.clone(),
            args,
        })
    }

    /// Returns `true` when both handles come from the same binding.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for BoundCallback {
    fn eq(&self, other: &Self) -> bool {
        self.inner.path == other.inner.path && self.inner.key == other.inner.key
    }
}

impl fmt::Debug for BoundCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCallback")
            .field("path", &self.inner.path.to_string())
            .field("key", &self.inner.key)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
