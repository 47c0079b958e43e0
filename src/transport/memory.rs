//! In-process message hub.
//!
//! Models cross-context messaging (host page and embedded frames): every
//! peer connects to the hub under a [`PeerId`] and gets a [`MemoryPort`] to
//! post with plus an [`Inbox`] to receive from. Delivery is FIFO per
//! sender/receiver pair.
//!
//! # Example
//!
//! ```
//! use msg_exchanger::transport::{Channel, MemoryHub, PeerId};
//! use serde_json::json;
//!
//! let hub = MemoryHub::new();
//! let (host, _host_inbox) = hub.connect("host");
//! let (_frame, mut frame_inbox) = hub.connect("frame");
//!
//! host.post(&PeerId::new("frame"), json!("hello")).unwrap();
//! let inbound = frame_inbox.try_recv().unwrap();
//! assert_eq!(inbound.source, PeerId::new("host"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{Channel, Inbound, Inbox, PeerId};
use crate::error::{ExchangeError, Result};

/// Registry of connected peers.
#[derive(Clone, Default)]
pub struct MemoryHub {
    peers: Arc<Mutex<HashMap<PeerId, mpsc::UnboundedSender<Inbound>>>>,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a peer.
    ///
    /// Reconnecting an existing id replaces its inbox; the old one closes.
    pub fn connect(&self, id: impl Into<PeerId>) -> (MemoryPort, Inbox) {
        let id = id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        if self.peers.lock().insert(id.clone(), tx).is_some() {
            tracing::debug!(peer = %id, "peer reconnected, previous inbox closed");
        }
        let port = MemoryPort {
            id,
            hub: self.clone(),
        };
        (port, rx)
    }

    /// Disconnect a peer. Returns whether it was connected.
    pub fn disconnect(&self, id: &PeerId) -> bool {
        self.peers.lock().remove(id).is_some()
    }

    /// Whether a peer is connected.
    pub fn is_connected(&self, id: &PeerId) -> bool {
        self.peers.lock().contains_key(id)
    }

    fn deliver(&self, source: &PeerId, target: &PeerId, data: Value) -> Result<()> {
        let sender = self
            .peers
            .lock()
            .get(target)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownPeer(target.clone()))?;

        sender
            .send(Inbound {
                data,
                source: source.clone(),
            })
            .map_err(|_| ExchangeError::ConnectionClosed)
    }
}

/// One peer's handle on a [`MemoryHub`].
pub struct MemoryPort {
    id: PeerId,
    hub: MemoryHub,
}

impl MemoryPort {
    /// Hub this port belongs to.
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

impl Channel for MemoryPort {
    fn post(&self, target: &PeerId, message: Value) -> Result<()> {
        self.hub.deliver(&self.id, target, message)
    }

    fn local_id(&self) -> &PeerId {
        &self.id
    }
}
