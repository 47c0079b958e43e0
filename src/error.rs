//! Error types for msg-exchanger.

use serde_json::Value;
use thiserror::Error;

use crate::dispatcher::NO_HANDLER_MESSAGE;
use crate::protocol::CorrelationId;
use crate::transport::PeerId;

/// Main error type for all exchanger operations.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// I/O error on a byte-stream transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON conversion error (typed payloads).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (oversized frame, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// `send` was called on an exchanger built without a default target.
    #[error("Must specify a target with send method")]
    NoTarget,

    /// The peer answered with an error-flagged response.
    ///
    /// Carries the peer's failure payload verbatim. A request that no
    /// handler matched arrives here with [`NO_HANDLER_MESSAGE`].
    #[error("Remote error: {0}")]
    Remote(Value),

    /// The channel does not know the target peer.
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// Channel closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No response arrived within the configured call timeout.
    #[error("Call {0} timed out")]
    Timeout(CorrelationId),

    /// The exchanger was dropped while the call was still pending.
    #[error("Call {0} abandoned before settlement")]
    Abandoned(CorrelationId),

    /// `init` called while a listener is already running.
    #[error("Exchanger is already listening")]
    AlreadyListening,
}

impl ExchangeError {
    /// Payload of an error-flagged response, if this is one.
    pub fn remote_payload(&self) -> Option<&Value> {
        match self {
            ExchangeError::Remote(payload) => Some(payload),
            _ => None,
        }
    }

    /// Whether the peer reported that nothing handled the request.
    pub fn is_no_handler(&self) -> bool {
        matches!(self.remote_payload(), Some(Value::String(s)) if s == NO_HANDLER_MESSAGE)
    }
}

/// Result type alias using ExchangeError.
pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_payload() {
        let err = ExchangeError::Remote(json!("boom"));
        assert_eq!(err.remote_payload(), Some(&json!("boom")));
        assert!(!err.is_no_handler());
        assert!(ExchangeError::NoTarget.remote_payload().is_none());
    }

    #[test]
    fn test_is_no_handler() {
        let err = ExchangeError::Remote(json!(NO_HANDLER_MESSAGE));
        assert!(err.is_no_handler());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ExchangeError::NoTarget.to_string(),
            "Must specify a target with send method"
        );
        assert_eq!(
            ExchangeError::Timeout("abc".to_string()).to_string(),
            "Call abc timed out"
        );
        assert_eq!(
            ExchangeError::UnknownPeer(PeerId::new("frame")).to_string(),
            "Unknown peer: frame"
        );
    }
}
