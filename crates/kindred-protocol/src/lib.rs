//! Wire protocol for Kindred.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`ParticipantId`],
//!   [`SessionId`]) — the event structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those events
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! core (participant identity, matching). It doesn't know about
//! connections or sessions — it only knows how to serialize and
//! deserialize events.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent/ServerEvent) → Session (core)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientEvent, ParticipantId, ServerEvent, SessionId};
