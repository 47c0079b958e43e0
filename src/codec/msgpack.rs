//! MsgPack codec using `rmp-serde`.
//!
//! Structs are always written with `to_vec_named` (struct-as-map), so
//! envelopes keep their `id`/`content`/`isError`/`payload` keys on the wire
//! and decode back into the same JSON-like shape on the other side.

use crate::error::Result;

/// MessagePack codec for structured messages.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Envelope, Response};
    use serde_json::{json, Value};

    #[test]
    fn test_envelope_survives_msgpack() {
        let raw = Envelope::new("k3j9x0aa", json!({ "type": "ping", "message": [1, "two", null] }))
            .into_value();

        let encoded = MsgPackCodec::encode(&raw).unwrap();
        let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded, raw);
    }

    #[test]
    fn test_response_keys_are_named() {
        let response = Response::err(json!("boom"));
        let encoded = MsgPackCodec::encode(&response).unwrap();

        // 0x82 = fixmap with 2 entries, not a positional array
        assert_eq!(encoded[0], 0x82);

        let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, json!({ "isError": true, "payload": "boom" }));
    }

    #[test]
    fn test_number_types() {
        let raw = json!({ "neg": -12345, "big": u64::MAX, "float": 2.5 });
        let encoded = MsgPackCodec::encode(&raw).unwrap();
        let decoded: Value = MsgPackCodec::decode(&encoded).unwrap();

        assert_eq!(decoded["neg"], json!(-12345));
        assert_eq!(decoded["big"], json!(u64::MAX));
        assert_eq!(decoded["float"], json!(2.5));
    }

    #[test]
    fn test_null_is_nil() {
        let encoded = MsgPackCodec::encode(&Value::Null).unwrap();
        assert_eq!(encoded, vec![0xc0]);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        // 0xc1 is never used in MsgPack
        let result: Result<Value> = MsgPackCodec::decode(&[0xc1]);
        assert!(result.is_err());
    }
}
