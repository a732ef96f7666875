//! One mounted view: its tree, its binding registry, and its channels.
//!
//! # How it works (for beginners)
//!
//! ```text
//!   server ──ServerMessage──► ViewSession::handle_server_message
//!                                 │ tree_init / patch_batch
//!                                 ▼
//!                             ViewTree (patch engine) ──► RenderHost::render
//!                                 │ bound callables
//!                                 ▼
//!   server ◄──ClientMessage── Transport ◄── ChannelHub (channel messages)
//! ```
//!
//! The session owns no socket.  Everything it sends goes through the
//! [`Transport`] port and everything it displays goes through the
//! [`RenderHost`] port, so the whole flow can be exercised with mocks.

use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use viewsync_core::{
    ApplyError, BindingRegistry, CallbackInvocation, CallbackSink, ClientMessage, ComponentLookup,
    ProtocolError, RouteContext, ServerMessage, StyleTable, ViewTree,
};

use super::channel_bridge::ChannelBridge;
use super::channel_hub::ChannelHub;
use super::ports::{RenderHost, Transport, TransportError};

/// Errors that end the handling of one server message.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server reported a fatal error for this view.
    #[error("fatal server error: {0}")]
    Server(String),
}

/// Forwards callable invocations to the server as `callback` messages.
pub struct TransportCallbackSink {
    transport: Arc<dyn Transport>,
}

impl TransportCallbackSink {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl CallbackSink for TransportCallbackSink {
    fn invoke(&self, invocation: CallbackInvocation) -> Result<(), String> {
        debug!(path = %invocation.path, key = %invocation.key, "forwarding callback");
        self.transport
            .send(ClientMessage::Callback(invocation))
            .map_err(|e| e.to_string())
    }
}

/// A mounted view bound to one route.
pub struct ViewSession {
    route: RouteContext,
    transport: Arc<dyn Transport>,
    host: Arc<dyn RenderHost>,
    styles: StyleTable,
    components: Option<Arc<dyn ComponentLookup>>,
    tree: Option<ViewTree>,
    channels: ChannelHub,
}

impl std::fmt::Debug for ViewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSession")
            .field("route", &self.route)
            .field("mounted", &self.tree.is_some())
            .field("channels", &self.channels)
            .finish()
    }
}

impl ViewSession {
    pub fn new(route: RouteContext, transport: Arc<dyn Transport>, host: Arc<dyn RenderHost>) -> Self {
        Self {
            route,
            channels: ChannelHub::new(Arc::clone(&transport)),
            transport,
            host,
            styles: StyleTable::default(),
            components: None,
            tree: None,
        }
    }

    /// Style table used to resolve tokenized class names.
    pub fn with_styles(mut self, styles: StyleTable) -> Self {
        self.styles = styles;
        self
    }

    /// Enables checking of mount point keys.
    pub fn with_components(mut self, components: Arc<dyn ComponentLookup>) -> Self {
        self.components = Some(components);
        self
    }

    pub fn route(&self) -> &RouteContext {
        &self.route
    }

    /// The current tree, if the server has sent one.
    pub fn tree(&self) -> Option<&ViewTree> {
        self.tree.as_ref()
    }

    pub fn registry(&self) -> Option<&BindingRegistry> {
        self.tree.as_ref().map(ViewTree::registry)
    }

    pub fn channels(&self) -> &ChannelHub {
        &self.channels
    }

    /// Returns the open bridge for `name`.
    pub fn channel(&mut self, name: &str) -> ChannelBridge {
        self.channels.channel(name)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Asks the server to mount the current route.
    pub fn mount(&self) -> Result<(), SessionError> {
        info!(route = %self.route.path, "mounting view");
        self.transport.send(ClientMessage::Mount {
            route: self.route.clone(),
        })?;
        Ok(())
    }

    /// Switches to `route`.  The held tree is discarded until the next
    /// `tree_init`.
    pub fn navigate(&mut self, route: RouteContext) -> Result<(), SessionError> {
        info!(from = %self.route.path, to = %route.path, "navigating");
        self.tree = None;
        self.route = route;
        self.transport.send(ClientMessage::Navigate {
            route: self.route.clone(),
        })?;
        Ok(())
    }

    /// Tells the server the view is gone and discards the tree.
    pub fn unmount(&mut self) -> Result<(), SessionError> {
        info!(route = %self.route.path, "unmounting view");
        self.tree = None;
        self.transport.send(ClientMessage::Unmount {
            route: self.route.clone(),
        })?;
        Ok(())
    }

    /// Propagates connection loss to every channel.
    pub fn disconnect(&mut self) {
        warn!(route = %self.route.path, "connection lost");
        self.channels.disconnect();
    }

    /// Answers a host-side API passthrough request.
    pub fn send_api_result(&self, id: Uuid, result: Result<Json, String>) -> Result<(), SessionError> {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(message) => (None, Some(message)),
        };
        self.transport.send(ClientMessage::ApiResult { id, result, error })?;
        Ok(())
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Handles one message from the server.
    ///
    /// # Errors
    ///
    /// A failed batch or hydration is fatal for the view: the tree is
    /// discarded, the host is told, and the error is returned.  A fatal
    /// server `error` message yields [`SessionError::Server`].
    pub fn handle_server_message(&mut self, message: ServerMessage) -> Result<(), SessionError> {
        match message {
            ServerMessage::TreeInit(snapshot) => {
                let registry = self.new_registry();
                let tree = ViewTree::from_snapshot(&snapshot, registry).map_err(|e| self.fail(e))?;
                info!(route = %self.route.path, "view tree received");
                self.host.render(tree.root());
                self.tree = Some(tree);
            }
            ServerMessage::PatchBatch { instructions } => {
                let Some(tree) = self.tree.as_mut() else {
                    return Err(self.fail(ProtocolError::TreeNotInitialized.into()));
                };
                match tree.apply(&instructions).map(Arc::clone) {
                    Ok(root) => {
                        debug!(count = instructions.len(), "patch batch applied");
                        self.host.render(&root);
                    }
                    Err(e) => return Err(self.fail(e)),
                }
            }
            ServerMessage::Channel(message) => self.channels.dispatch(message),
            ServerMessage::Error { message, fatal } => {
                self.host.report_error(&message);
                if fatal {
                    error!(route = %self.route.path, %message, "fatal server error");
                    self.tree = None;
                    return Err(SessionError::Server(message));
                }
                warn!(route = %self.route.path, %message, "server error");
            }
            ServerMessage::Navigate { to, replace } => {
                debug!(%to, replace, "server navigation");
                self.host.navigate(&to, replace);
            }
        }
        Ok(())
    }

    /// Handles a `tree_init` or `patch_batch` frame that could not be decoded.
    ///
    /// The held tree can no longer follow the server's, so this fails the
    /// view exactly like a batch that does not apply.
    pub fn reject_frame(&mut self, error: ProtocolError) -> SessionError {
        self.fail(error.into())
    }

    fn new_registry(&self) -> BindingRegistry {
        let sink = Arc::new(TransportCallbackSink::new(Arc::clone(&self.transport)));
        let registry = BindingRegistry::new(sink).with_styles(self.styles.clone());
        match &self.components {
            Some(components) => registry.with_components(Arc::clone(components)),
            None => registry,
        }
    }

    fn fail(&mut self, e: ApplyError) -> SessionError {
        error!(route = %self.route.path, error = %e, "view update failed");
        self.tree = None;
        self.host.report_error(&e.to_string());
        e.into()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
