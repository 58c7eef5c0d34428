//! Durable storage of chat text for Kindred.
//!
//! The session core treats storage as an external collaborator: it calls
//! [`MessageLog::append`] for every chat message and moves on. A failed
//! append is logged and never blocks delivery to participants — loss of
//! durability must not degrade live chat.
//!
//! This crate defines the contract ([`MessageLog`]), the stored record
//! shape ([`ChatRecord`]), and an in-memory reference implementation
//! ([`MemoryMessageLog`]) used by tests and the demo binary. A real
//! deployment would implement the trait over an actual database.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryMessageLog;

use kindred_protocol::SessionId;
use serde::{Deserialize, Serialize};

/// A single persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// The session the message belongs to.
    pub session_id: SessionId,
    /// Username of the sender.
    pub sender: String,
    /// The message body.
    pub text: String,
    /// Server-assigned timestamp, unix milliseconds.
    pub timestamp: u64,
}

/// Appends chat messages to durable storage.
///
/// # Trait bounds
///
/// - `Send + Sync` → the log is shared across async tasks.
/// - `'static` → it doesn't borrow temporary data; it lives as long as
///   the server.
///
/// The `append` future must be `Send` because the session core issues
/// writes as spawned fire-and-forget tasks — completion never gates the
/// broadcast of the message to participants.
pub trait MessageLog: Send + Sync + 'static {
    /// Persists one message and returns the timestamp it was stored
    /// under (unix milliseconds, assigned by the log).
    ///
    /// # Errors
    /// Returns [`StoreError`] if the write fails. Callers treat this as
    /// non-fatal: the failure is logged, nothing is retried.
    fn append(
        &self,
        session_id: &SessionId,
        sender: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}

/// Current wall-clock time as unix milliseconds.
///
/// The one clock used for every server-assigned timestamp, so that a
/// broadcast and its stored record agree on the time base.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
