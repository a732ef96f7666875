//! JSON message types exchanged between the view server and a client.
//!
//! # Message flow
//!
//! ```text
//! Server → Client:  tree_init, patch_batch, channel, error, navigate
//! Client → Server:  mount, navigate, unmount, callback, channel, api_result
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant; all other fields sit in the same object:
//!
//! ```json
//! {"type":"patch_batch","instructions":[{"op":"remove","path":"","index":0}]}
//! {"type":"callback","path":"0.1","key":"onClick","args":[]}
//! ```
//!
//! As in any tagged protocol, the two directions use two distinct enums, so
//! sending a server-only message from the client is a compile-time error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use thiserror::Error;
use uuid::Uuid;

use crate::binding::BindingSeed;
use crate::domain::callback::CallbackInvocation;
use crate::domain::instruction::Instruction;
use crate::domain::node::WireNode;
use crate::domain::path::Path;
use crate::patch::ProtocolError;

// ── Shared payloads ───────────────────────────────────────────────────────────

/// The full tree of a freshly mounted view plus its initial registry paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub tree: WireNode,
    #[serde(default)]
    pub callbacks: Vec<String>,
    #[serde(default)]
    pub render_props: Vec<String>,
    #[serde(default)]
    pub css_refs: Vec<String>,
}

impl TreeSnapshot {
    /// Registry paths of this snapshot.
    pub fn seed(&self) -> BindingSeed {
        BindingSeed {
            callbacks: self.callbacks.clone(),
            render_props: self.render_props.clone(),
            css_refs: self.css_refs.clone(),
        }
    }
}

/// Where a view is mounted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteContext {
    pub path: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl RouteContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// One message on a named logical channel.  The same shape travels in both
/// directions.
///
/// | `id`  | `in_response_to` | Meaning                               |
/// |-------|------------------|---------------------------------------|
/// | none  | none             | fire-and-forget event                 |
/// | set   | none             | request expecting a reply             |
/// | any   | set              | reply to the request with that id     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelMessage {
    /// A fire-and-forget event.
    pub fn event(channel: impl Into<String>, event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            event: Some(event.into()),
            payload,
            id: None,
            in_response_to: None,
            error: None,
        }
    }

    /// A request carrying correlation id `id`.
    pub fn request(
        channel: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
        id: Uuid,
    ) -> Self {
        Self {
            id: Some(id),
            ..Self::event(channel, event, payload)
        }
    }

    /// A successful reply to request `request_id`.
    pub fn reply(channel: impl Into<String>, request_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            channel: channel.into(),
            event: None,
            payload,
            id: None,
            in_response_to: Some(request_id),
            error: None,
        }
    }

    /// A failed reply to request `request_id`.
    pub fn error_reply(channel: impl Into<String>, request_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::reply(channel, request_id, serde_json::Value::Null)
        }
    }
}

// ── Server → Client messages ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Initial tree of the mounted view.
    TreeInit(TreeSnapshot),

    /// Ordered instructions to apply atomically.
    PatchBatch { instructions: Vec<Instruction> },

    Channel(ChannelMessage),

    /// Server-side failure.  A fatal error ends the view.
    Error {
        message: String,
        #[serde(default)]
        fatal: bool,
    },

    /// Server-driven navigation.
    Navigate {
        to: String,
        #[serde(default)]
        replace: bool,
    },
}

/// A server frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// The frame is not JSON, has no known `type`, or is a message that does
    /// not touch the tree.  Skipping it leaves the held tree intact.
    #[error("unreadable server frame: {0}")]
    Unreadable(String),

    /// A `tree_init` or `patch_batch` could not be read.  The held tree can
    /// no longer follow the server's, so this is fatal for the view.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ServerMessage {
    /// Decodes one text frame.
    ///
    /// The frame is first read as plain JSON and then as a message, so that a
    /// broken `tree_init` or `patch_batch` is reported as a [`ProtocolError`]
    /// naming the offending path or instruction instead of a generic parse
    /// failure.
    ///
    /// # Errors
    ///
    /// See [`FrameError`].
    pub fn from_frame(text: &str) -> Result<Self, FrameError> {
        let frame: Json = serde_json::from_str(text).map_err(|e| FrameError::Unreadable(e.to_string()))?;
        let error = match ServerMessage::deserialize(&frame) {
            Ok(message) => return Ok(message),
            Err(e) => e,
        };

        match frame.get("type").and_then(Json::as_str) {
            Some("patch_batch") => Err(batch_error(&frame, &error).into()),
            Some(kind @ "tree_init") => Err(ProtocolError::MalformedMessage {
                kind: kind.to_string(),
                message: error.to_string(),
            }
            .into()),
            _ => Err(FrameError::Unreadable(error.to_string())),
        }
    }
}

/// Names the first instruction of a batch frame that cannot be read.
fn batch_error(frame: &Json, error: &serde_json::Error) -> ProtocolError {
    let instructions = frame.get("instructions").and_then(Json::as_array);
    for (index, raw) in instructions.into_iter().flatten().enumerate() {
        if let Some(path) = raw.get("path").and_then(Json::as_str) {
            if path.parse::<Path>().is_err() {
                return ProtocolError::MalformedPath(path.to_string());
            }
        }
        if let Err(e) = Instruction::deserialize(raw) {
            return ProtocolError::MalformedInstruction {
                index,
                message: e.to_string(),
            };
        }
    }
    ProtocolError::MalformedMessage {
        kind: "patch_batch".to_string(),
        message: error.to_string(),
    }
}

// ── Client → Server messages ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Mount { route: RouteContext },
    Navigate { route: RouteContext },
    Unmount { route: RouteContext },

    /// A bound callable was invoked in the rendering host.
    Callback(CallbackInvocation),

    Channel(ChannelMessage),

    /// Answer to a host-side API passthrough request.
    ApiResult {
        id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
