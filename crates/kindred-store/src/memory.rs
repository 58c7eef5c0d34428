//! In-memory [`MessageLog`] implementation.
//!
//! Stands in for a real database in tests and the demo binary. Records
//! live in a `Vec` behind a `std::sync::Mutex` — the critical sections
//! are a push or a scan, never held across an `.await`, so a std mutex
//! is the right tool (no need for the async one).

use std::sync::Mutex;

use kindred_protocol::SessionId;

use crate::{ChatRecord, MessageLog, StoreError, now_millis};

/// An in-memory message log.
///
/// Cheap to construct, grows without bound — fine for tests and demos,
/// not for production.
#[derive(Debug, Default)]
pub struct MemoryMessageLog {
    records: Mutex<Vec<ChatRecord>>,
}

impl MemoryMessageLog {
    /// Creates a new, empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records stored for a session, in append order.
    pub fn history(&self, session_id: &SessionId) -> Vec<ChatRecord> {
        self.records
            .lock()
            .expect("message log mutex poisoned")
            .iter()
            .filter(|r| &r.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Returns the total number of stored records (all sessions).
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .expect("message log mutex poisoned")
            .len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageLog for MemoryMessageLog {
    async fn append(
        &self,
        session_id: &SessionId,
        sender: &str,
        text: &str,
    ) -> Result<u64, StoreError> {
        let timestamp = now_millis();
        let record = ChatRecord {
            session_id: session_id.clone(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp,
        };
        self.records
            .lock()
            .map_err(|_| {
                StoreError::Unavailable("log mutex poisoned".into())
            })?
            .push(record);
        tracing::trace!(%session_id, sender, "chat message stored");
        Ok(timestamp)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    #[tokio::test]
    async fn test_append_stores_record_with_timestamp() {
        let log = MemoryMessageLog::new();

        let ts = log
            .append(&sid("s1"), "alice", "hello")
            .await
            .expect("append should succeed");

        assert!(ts > 0);
        let history = log.history(&sid("s1"));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender, "alice");
        assert_eq!(history[0].text, "hello");
        assert_eq!(history[0].timestamp, ts);
    }

    #[tokio::test]
    async fn test_history_filters_by_session() {
        let log = MemoryMessageLog::new();
        log.append(&sid("s1"), "alice", "one").await.unwrap();
        log.append(&sid("s2"), "bob", "two").await.unwrap();
        log.append(&sid("s1"), "alice", "three").await.unwrap();

        let s1 = log.history(&sid("s1"));
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[0].text, "one");
        assert_eq!(s1[1].text, "three");

        assert_eq!(log.history(&sid("s2")).len(), 1);
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn test_history_of_unknown_session_is_empty() {
        let log = MemoryMessageLog::new();
        assert!(log.history(&sid("nope")).is_empty());
        assert!(log.is_empty());
    }
}
