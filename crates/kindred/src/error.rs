//! Unified error type for the Kindred server.

use kindred_protocol::ProtocolError;
use kindred_session::{AuthError, SessionError};
use kindred_store::StoreError;
use kindred_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `kindred` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
///
/// Note that none of these ever travel to a client: connection-level
/// faults close the socket, and everything else is logged server-side.
#[derive(Debug, thiserror::Error)]
pub enum KindredError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (coordinator unavailable).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A credential was rejected or yielded an unusable profile.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A storage-level error (message log append).
    #[error(transparent)]
    Store(#[from] StoreError),
}
