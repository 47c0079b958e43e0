//! Codec module - serialization of channel messages for byte transports.
//!
//! In-process channels carry `serde_json::Value` messages directly. Byte
//! transports such as [`StreamPort`](crate::transport::StreamPort) encode
//! each message with [`MsgPackCodec`].
//!
//! # Example
//!
//! ```
//! use msg_exchanger::codec::MsgPackCodec;
//! use serde_json::{json, Value};
//!
//! let message = json!({ "id": "a1", "content": { "type": "ping", "message": null } });
//! let encoded = MsgPackCodec::encode(&message).unwrap();
//! let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, message);
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
