//! Codec trait and implementations for serializing/deserializing values.
//!
//! A "codec" converts between Rust types and raw bytes. The HTTP client and
//! the session store don't care HOW values are serialized; they just need
//! something that implements [`Codec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec is stored inside long-lived
/// clients that may be shared across Tokio tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Convenience wrapper around [`encode`](Self::encode) for text-based
    /// stores.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` on serialization failure, or
    /// `ProtocolError::InvalidMessage` if the codec produced non-UTF-8 bytes.
    fn encode_str<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes)
            .map_err(|_| ProtocolError::InvalidMessage("codec output is not UTF-8".into()))
    }

    /// Convenience wrapper around [`decode`](Self::decode) for text-based
    /// stores.
    ///
    /// # Errors
    /// Same as [`decode`](Self::decode).
    fn decode_str<T: DeserializeOwned>(&self, data: &str) -> Result<T, ProtocolError> {
        self.decode(data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The backend speaks JSON, and the persisted `user` record is stored as
/// JSON, so this is the only codec Chatline needs today. It is behind the
/// `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use chatline_protocol::{Codec, JsonCodec, User, UserId};
///
/// let user = User {
///     id: UserId::new("u1"),
///     username: "alice".into(),
///     email: "alice@example.com".into(),
///     avatar_url: None,
/// };
///
/// let text = JsonCodec.encode_str(&user).unwrap();
/// let decoded: User = JsonCodec.decode_str(&text).unwrap();
/// assert_eq!(user, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Message, User};

    #[test]
    fn test_decode_malformed_json_returns_decode_error() {
        let result: Result<User, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_shape_returns_decode_error() {
        // No `id`, so this can't be a user record.
        let result: Result<User, _> =
            JsonCodec.decode_str(r#"{"text":"hi","authorUserId":"u1"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_str_accepts_message_list() {
        let messages: Vec<Message> = JsonCodec
            .decode_str(r#"[{"id":"m1","text":"hi","authorUserId":"u1"}]"#)
            .expect("valid list");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hi");
    }

    #[test]
    fn test_encode_str_produces_json_text() {
        let text = JsonCodec.encode_str(&vec![1, 2, 3]).expect("encodes");
        assert_eq!(text, "[1,2,3]");
    }
}
