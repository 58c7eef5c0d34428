//! Error types for the session layer.
//!
//! Deliberately small. Most "errors" in this domain are not errors at
//! all: a chat or disconnect referencing an unknown session is a silent
//! no-op (the session simply expired first), and nothing at this level
//! is ever retried.

use kindred_protocol::SessionId;

/// Errors that can occur in the session core.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A freshly minted identifier collided with a registered session.
    /// Practically unreachable given the minting format; handled by
    /// re-minting rather than overwriting the occupant.
    #[error("session identifier {0} already registered")]
    DuplicateIdentifier(SessionId),

    /// The coordinator task is gone — its command channel is closed.
    /// Seen by connection handlers during server shutdown.
    #[error("coordinator is no longer running")]
    CoordinatorClosed,
}
