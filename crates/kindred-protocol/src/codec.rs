//! Codec trait and implementations for serializing/deserializing events.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The protocol layer doesn't care HOW events are serialized — it just
//! needs something that implements the [`Codec`] trait. Currently we
//! provide [`JsonCodec`] (human-readable, and what the browser client
//! speaks). A binary codec could be added later without changing any
//! other code.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync` → safe to share between threads (Tokio may run our
///   code on any thread in its pool).
/// - `'static` → the codec doesn't borrow temporary data; it's stored
///   in long-lived server state.
///
/// The `encode` and `decode` methods are *generic* — they work with any
/// type `T` that implements the right serde trait. `DeserializeOwned`
/// (vs plain `Deserialize`) means the result doesn't borrow from the
/// input bytes, so the input buffer can be dropped after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what browser clients naturally produce and consume, and you
/// can read the frames in DevTools when debugging. Behind the `json`
/// feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use kindred_protocol::{Codec, JsonCodec, ClientEvent};
///
/// let codec = JsonCodec;
///
/// let event = ClientEvent::ChatMessage { text: "hi".into() };
///
/// // Encode to bytes (JSON)
/// let bytes = codec.encode(&event).unwrap();
///
/// // Decode back
/// let decoded: ClientEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(event, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
