//! Core protocol types for Kindred's wire format.
//!
//! This module defines every type that travels "on the wire" — the
//! structures that get serialized to bytes, sent over the network, and
//! deserialized on the other side.
//!
//! The event names (`connect`, `chat-message`, `waiting`, `session-start`,
//! `partner-left`, `session-expired`) are part of the public contract with
//! client SDKs, so the serde attributes below are load-bearing: a renamed
//! tag breaks every client.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant.
///
/// This is a "newtype wrapper" — a common Rust pattern where you wrap a
/// primitive type (here `u64`) in a named struct. Why bother?
///
/// 1. **Type safety**: You can't accidentally pass some other counter
///    where a `ParticipantId` is expected, even though both are `u64`
///    underneath.
/// 2. **Readability**: `fn remove(participant: ParticipantId)` is clearer
///    than `fn remove(participant: u64)`.
///
/// The id is derived from the transport-level connection identifier, so
/// it is stable for the lifetime of one connection and never reused while
/// that connection is alive. It identifies the participant; it is *not*
/// the delivery channel (that's the participant's outbox in the session
/// layer). Keeping those two facts separate means the core never depends
/// on the shape of a transport connection object.
///
/// `#[serde(transparent)]` tells serde to serialize this as just the
/// inner `u64`, not as `{ "0": 42 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

/// Display lets us use `{}` in format strings and logging.
/// `tracing::info!("{} connected", id)` will print "P-42 connected".
impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a chat session.
///
/// Unlike [`ParticipantId`], this wraps a `String` — session identifiers
/// are opaque strings minted by the session layer (the format is an
/// implementation detail of the minting code, not of this type). Keys
/// into the session registry and appears in `session-start` events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw string as a `SessionId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientEvent — what clients send to the server
// ---------------------------------------------------------------------------

/// An event sent from a client to the server.
///
/// `#[serde(tag = "type", rename_all = "kebab-case")]` is a serde
/// attribute that controls how this enum is represented in JSON. Instead
/// of:
///   `{ "ChatMessage": { "text": "hi" } }`
/// it produces:
///   `{ "type": "chat-message", "text": "hi" }`
/// This "internally tagged" format with kebab-case tags matches what the
/// JavaScript client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Client → Server: "Here are my credentials, connect me."
    ///
    /// Must be the first event on a fresh connection. The token is
    /// validated by the auth collaborator before anything reaches the
    /// session core; a rejected token closes the connection.
    Connect { token: String },

    /// Client → Server: "Say this to my session."
    ///
    /// Ignored (not an error) if the sender isn't currently in a session.
    ChatMessage { text: String },

    /// Client → Server: "I'm leaving."
    ///
    /// Includes a human-readable reason for logging. Closing the socket
    /// without sending this has the same effect.
    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// ServerEvent — notifications the server sends to clients
// ---------------------------------------------------------------------------

/// A notification sent from the server to one or more clients.
///
/// These are the only user-visible outputs of the session core. There is
/// deliberately no "error" event here — internal faults are logged
/// server-side, never surfaced to participants.
///
/// Field names are camelCase on the wire (`sessionId`, not `session_id`),
/// again to match the client SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// "You're connected but not paired yet." Sent both to participants
    /// who just created a fresh session and to participants parked in the
    /// overflow holding set. The reason string distinguishes the two.
    Waiting { reason: String },

    /// "Your session is live." Sent to every participant of a session
    /// when a second participant joins. Carries the full username list
    /// in join order.
    #[serde(rename_all = "camelCase")]
    SessionStart {
        session_id: SessionId,
        usernames: Vec<String>,
    },

    /// A chat message, broadcast to every participant of the session
    /// including the sender. The timestamp is server-assigned (unix
    /// milliseconds) — one value for all recipients.
    ChatMessage {
        sender: String,
        text: String,
        timestamp: u64,
    },

    /// "The other participant disconnected." Sent to the remaining
    /// participant of a two-party session. The session itself stays
    /// alive until its timer lapses.
    PartnerLeft,

    /// "Your session's timer ran out." Terminal — the session is gone
    /// by the time this arrives.
    SessionExpired,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Tests for protocol types and their JSON serialization.
    //!
    //! The wire protocol defines exact JSON shapes. These tests verify
    //! that our serde attributes produce the correct format, because a
    //! mismatch means the client SDK can't parse our events.

    use super::*;

    // =====================================================================
    // Identity types: ParticipantId, SessionId
    // =====================================================================

    #[test]
    fn test_participant_id_serializes_as_plain_number() {
        // `#[serde(transparent)]` means ParticipantId(42) → `42`,
        // not `{"0":42}`.
        let json = serde_json::to_string(&ParticipantId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_participant_id_display() {
        assert_eq!(ParticipantId(7).to_string(), "P-7");
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let id = SessionId::new("session_1700000000000_42");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"session_1700000000000_42\"");
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new("session_1_2");
        let json = serde_json::to_string(&id).unwrap();
        let decoded: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, decoded);
        assert_eq!(decoded.as_str(), "session_1_2");
    }

    #[test]
    fn test_session_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(SessionId::new("a"), 1);
        map.insert(SessionId::new("b"), 2);
        assert_eq!(map[&SessionId::new("a")], 1);
    }

    // =====================================================================
    // ClientEvent — one test per variant to verify JSON shape
    // =====================================================================

    #[test]
    fn test_client_event_connect_json_format() {
        // `#[serde(tag = "type", rename_all = "kebab-case")]` produces:
        //   { "type": "connect", "token": "abc" }
        let event = ClientEvent::Connect {
            token: "abc".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "connect");
        assert_eq!(json["token"], "abc");
    }

    #[test]
    fn test_client_event_chat_message_parses_from_client_json() {
        // What the JavaScript client actually sends.
        let raw = r#"{ "type": "chat-message", "text": "hi" }"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::ChatMessage { text: "hi".into() }
        );
    }

    #[test]
    fn test_client_event_disconnect_round_trip() {
        let event = ClientEvent::Disconnect {
            reason: "leaving".into(),
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    // =====================================================================
    // ServerEvent — exact shapes, because clients parse these
    // =====================================================================

    #[test]
    fn test_server_event_waiting_json_format() {
        let event = ServerEvent::Waiting {
            reason: "Waiting for partner to join".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "waiting");
        assert_eq!(json["reason"], "Waiting for partner to join");
    }

    #[test]
    fn test_server_event_session_start_uses_camel_case_fields() {
        // The per-variant `#[serde(rename_all = "camelCase")]` produces
        // "sessionId", not "session_id" — the client SDK reads the former.
        let event = ServerEvent::SessionStart {
            session_id: SessionId::new("session_1_2"),
            usernames: vec!["alice".into(), "bob".into()],
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "session-start");
        assert_eq!(json["sessionId"], "session_1_2");
        assert_eq!(json["usernames"], serde_json::json!(["alice", "bob"]));
        assert!(json.get("session_id").is_none());
    }

    #[test]
    fn test_server_event_chat_message_json_format() {
        let event = ServerEvent::ChatMessage {
            sender: "bob".into(),
            text: "hi".into(),
            timestamp: 1_700_000_000_000,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "chat-message");
        assert_eq!(json["sender"], "bob");
        assert_eq!(json["text"], "hi");
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_server_event_partner_left_is_bare_tag() {
        // Unit variants still carry the tag:  { "type": "partner-left" }
        let json = serde_json::to_string(&ServerEvent::PartnerLeft).unwrap();
        assert_eq!(json, r#"{"type":"partner-left"}"#);
    }

    #[test]
    fn test_server_event_session_expired_round_trip() {
        let event = ServerEvent::SessionExpired;
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    // =====================================================================
    // Error cases — malformed input
    // =====================================================================

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<ClientEvent, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_event_type_returns_error() {
        let unknown = r#"{"type": "fly-to-moon", "speed": 9000}"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_missing_required_field_returns_error() {
        // A connect event without its token should fail to parse.
        let wrong = r#"{"type": "connect"}"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(wrong);
        assert!(result.is_err());
    }
}
