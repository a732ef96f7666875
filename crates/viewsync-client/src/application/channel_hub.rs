//! The per-connection set of channel bridges.
//!
//! Bridges are created lazily, either by local code asking for a channel or
//! by the first inbound message naming it.  Creating on inbound messages means
//! that events arriving before the view subscribes land in that bridge's
//! backlog instead of being lost.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use viewsync_core::ChannelMessage;

use super::channel_bridge::ChannelBridge;
use super::ports::Transport;

/// All channel bridges of one connection, keyed by channel name.
pub struct ChannelHub {
    transport: Arc<dyn Transport>,
    bridges: HashMap<String, ChannelBridge>,
}

impl std::fmt::Debug for ChannelHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHub").field("bridges", &self.bridges).finish()
    }
}

impl ChannelHub {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            bridges: HashMap::new(),
        }
    }

    /// Returns the open bridge for `name`, creating one if none exists or the
    /// previous one was closed.
    pub fn channel(&mut self, name: &str) -> ChannelBridge {
        if let Some(bridge) = self.bridges.get(name) {
            if !bridge.is_closed() {
                return bridge.clone();
            }
            debug!(channel = name, "replacing closed channel bridge");
        }
        let bridge = ChannelBridge::new(name, Arc::clone(&self.transport));
        self.bridges.insert(name.to_string(), bridge.clone());
        bridge
    }

    /// Routes an inbound channel message to its bridge.
    pub fn dispatch(&mut self, message: ChannelMessage) {
        let bridge = self.channel(&message.channel);
        bridge.dispatch(message);
    }

    /// Closes every bridge.  Pending requests reject with the reset error.
    pub fn disconnect(&mut self) {
        let count = self.bridges.len();
        for (_, bridge) in self.bridges.drain() {
            bridge.close();
        }
        info!(count, "all channels reset after disconnect");
    }

    /// Names of the bridges that are still open.
    pub fn open_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bridges
            .iter()
            .filter(|(_, b)| !b.is_closed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
