//! Transport module - the channel collaborator the exchanger talks through.
//!
//! A channel only has to deliver opaque messages to a named peer and report
//! inbound messages together with the peer that sent them. Two
//! implementations are provided:
//! - [`MemoryHub`] - in-process hub, one [`MemoryPort`] per peer
//! - [`StreamPort`] - two peers over any `AsyncRead`/`AsyncWrite` pair

mod memory;
mod stream;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

pub use memory::{MemoryHub, MemoryPort};
pub use stream::{StreamPort, StreamTasks};

/// Identity of a peer on a channel; also the reply-to address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A message received from the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Raw message.
    pub data: Value,
    /// Peer that posted it; responses go back here.
    pub source: PeerId,
}

impl Inbound {
    /// Create an inbound message.
    pub fn new(data: Value, source: impl Into<PeerId>) -> Self {
        Self {
            data,
            source: source.into(),
        }
    }
}

/// Receiving side of a channel, consumed by `Exchanger::init`.
pub type Inbox = mpsc::UnboundedReceiver<Inbound>;

/// Outbound side of a channel: fire-and-forget delivery to a peer.
pub trait Channel: Send + Sync + 'static {
    /// Post a message to `target`.
    ///
    /// Returns once the message is queued; delivery is not confirmed.
    fn post(&self, target: &PeerId, message: Value) -> Result<()>;

    /// Identity of this end of the channel.
    fn local_id(&self) -> &PeerId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_conversions() {
        let a = PeerId::from("host");
        let b = PeerId::from("host".to_string());
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "host");
        assert_eq!(a.to_string(), "host");
    }

    #[test]
    fn test_peer_id_serializes_as_string() {
        let json = serde_json::to_value(PeerId::new("frame")).unwrap();
        assert_eq!(json, Value::String("frame".into()));
    }
}
