//! Error types for the storage layer.

/// Errors that can occur when persisting chat messages.
///
/// All of these are non-fatal to the chat itself: the session core logs
/// the failure and broadcasts the message anyway.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("message log unavailable: {0}")]
    Unavailable(String),

    /// The write was attempted but rejected by the store.
    #[error("append failed: {0}")]
    WriteFailed(String),
}
