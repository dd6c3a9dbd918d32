//! Payload encoding strategies.
//!
//! Payloads travel as [`serde_json::Value`] and are stored as text. A [`Codec`] turns a
//! value into the stored text and back; queues are opened with [`JsonCodec`] unless another
//! codec is supplied to the builder.
//!
//! ```rust
//! use rowq::codec::{Base64Codec, Codec, JsonCodec};
//! use serde_json::json;
//!
//! let codec = Base64Codec::new(JsonCodec);
//! let stored = codec.encode(&json!({"task": "resize"})).unwrap();
//! assert_eq!(codec.decode(&stored).unwrap(), json!({"task": "resize"}));
//! ```

use crate::error::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::fmt;

/// Converts payloads to and from their stored text form.
///
/// Decode errors are reported as [`Error::Deserialization`] by the queue, with the
/// offending element id attached.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String>;
    fn decode(&self, stored: &str) -> Result<Value>;
}

/// Compact JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode(&self, stored: &str) -> Result<Value> {
        Ok(serde_json::from_str(stored)?)
    }
}

/// Stores the output of an inner codec as standard base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Codec<C> {
    inner: C,
}

impl<C: Codec> Base64Codec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Codec> Codec for Base64Codec<C> {
    fn encode(&self, value: &Value) -> Result<String> {
        let text = self.inner.encode(value)?;
        Ok(general_purpose::STANDARD.encode(text.as_bytes()))
    }

    fn decode(&self, stored: &str) -> Result<Value> {
        let bytes = general_purpose::STANDARD
            .decode(stored.trim())
            .map_err(|e| Error::Internal {
                message: format!("Invalid base64 payload: {}", e),
            })?;
        let text = String::from_utf8(bytes).map_err(|e| Error::Internal {
            message: format!("Payload is not valid UTF-8: {}", e),
        })?;
        self.inner.decode(&text)
    }
}

type EncodeFn = dyn Fn(&Value) -> Result<String> + Send + Sync;
type DecodeFn = dyn Fn(&str) -> Result<Value> + Send + Sync;

/// A codec assembled from an encode/decode function pair.
pub struct FnCodec {
    encode: Box<EncodeFn>,
    decode: Box<DecodeFn>,
}

impl FnCodec {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&Value) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }
}

impl fmt::Debug for FnCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl Codec for FnCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        (self.encode)(value)
    }

    fn decode(&self, stored: &str) -> Result<Value> {
        (self.decode)(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_round_trip() {
        let payload = json!({"task": "send_email", "to": ["a@example.com"], "attempt": 3});
        let stored = JsonCodec.encode(&payload).unwrap();
        assert!(!stored.contains(' '));
        assert!(stored.contains(r#""task":"send_email""#));
        assert_eq!(JsonCodec.decode(&stored).unwrap(), payload);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let err = JsonCodec.decode("{not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_base64_codec_is_storage_safe() {
        let codec = Base64Codec::new(JsonCodec);
        let payload = json!({"quote": "it's \"here\"", "nul": "\u{0000}", "emoji": "\u{1F600}"});
        let stored = codec.encode(&payload).unwrap();
        assert!(stored
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
        assert_eq!(codec.decode(&stored).unwrap(), payload);
    }

    #[test]
    fn test_base64_codec_rejects_invalid_input() {
        let codec = Base64Codec::new(JsonCodec);
        assert!(codec.decode("***").is_err());
        // valid base64, invalid JSON inside
        let stored = general_purpose::STANDARD.encode("nope");
        assert!(codec.decode(&stored).is_err());
    }

    #[test]
    fn test_fn_codec() {
        let codec = FnCodec::new(
            |value| Ok(value.as_str().unwrap_or_default().to_uppercase()),
            |stored| Ok(Value::String(stored.to_lowercase())),
        );
        let stored = codec.encode(&json!("hello")).unwrap();
        assert_eq!(stored, "HELLO");
        assert_eq!(codec.decode(&stored).unwrap(), json!("hello"));
    }
}
