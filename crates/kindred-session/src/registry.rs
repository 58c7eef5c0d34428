//! The session registry: authoritative map of live sessions and owner of
//! their expiry timers.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself — it uses plain
//! `HashMap`s. This is intentional: the registry is owned by a single
//! task (the coordinator) and every mutation, including timer expiry,
//! goes through that task. Keeping it simple here avoids hidden locking
//! overhead and makes "no event observes a half-updated session" true by
//! construction.
//!
//! # Timers
//!
//! Exactly one expiry timer is armed per registered session. Arming
//! spawns a task that sleeps and then pushes an [`ExpiryNotice`] onto the
//! notice channel supplied at construction; the coordinator drains that
//! channel in the same loop as external events. Each arm carries a fresh
//! generation number, and [`SessionRegistry::expire`] only honors a
//! notice whose generation matches the current arm — so a timer that was
//! cancelled or replaced can never produce an observable firing, even if
//! its task had already sent the notice before the abort landed.
//!
//! ```text
//! upsert(id, ..) ──arm gen=N──→ sleep(timeout) ──→ notice {id, gen=N}
//!        │                                               │
//!        └── upsert again: abort task, arm gen=N+1       ▼
//!                              coordinator ──→ expire(notice)
//!                                   gen matches? remove : ignore
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use kindred_protocol::SessionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{Participant, Session, SessionError, matcher};

/// A timer firing, delivered to the coordinator's notice channel.
///
/// Carries the generation of the arm that produced it so stale firings
/// can be told apart from live ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryNotice {
    /// The session whose timer elapsed.
    pub session_id: SessionId,
    /// Generation of the arm that scheduled this firing.
    pub generation: u64,
}

/// One armed timer: its generation and the sleeping task behind it.
struct TimerArm {
    generation: u64,
    task: JoinHandle<()>,
}

/// The authoritative mapping from session identifier to session state.
///
/// Iteration order is creation order (needed for the matcher's
/// first-match-wins tie-break), maintained in a side `Vec` since
/// `HashMap` iteration order is arbitrary.
pub struct SessionRegistry {
    /// All live sessions, keyed by identifier.
    sessions: HashMap<SessionId, Session>,

    /// Identifiers in creation order. Kept in sync with `sessions`.
    order: Vec<SessionId>,

    /// The currently armed timer per session.
    timers: HashMap<SessionId, TimerArm>,

    /// Monotonic arm counter; each (re)arm gets the next value.
    next_generation: u64,

    /// Where timer tasks deliver their firings.
    notice_tx: mpsc::UnboundedSender<ExpiryNotice>,
}

impl SessionRegistry {
    /// Creates an empty registry whose timers report through `notice_tx`.
    pub fn new(notice_tx: mpsc::UnboundedSender<ExpiryNotice>) -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            timers: HashMap::new(),
            next_generation: 0,
            notice_tx,
        }
    }

    /// Inserts or replaces the session under `id` and (re)arms its expiry
    /// timer to fire `timeout` from now, cancelling any prior arm.
    ///
    /// Calling this again for an existing identifier always resets the
    /// deadline — this is the mechanism by which a second participant
    /// joining extends the session's life. `created_at` and the creation-
    /// order position survive the replace. Chat messages never call this.
    pub fn upsert(
        &mut self,
        id: SessionId,
        participants: Vec<Participant>,
        match_interests: HashSet<String>,
        timeout: Duration,
    ) -> &Session {
        let deadline = Instant::now() + timeout;

        match self.sessions.entry(id.clone()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                session.participants = participants;
                session.match_interests = match_interests;
                session.deadline = deadline;
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Session {
                    id: id.clone(),
                    participants,
                    match_interests,
                    deadline,
                    created_at: Instant::now(),
                });
                self.order.push(id.clone());
            }
        }

        self.arm_timer(&id, timeout);

        // `expect` is safe: the entry was inserted or updated just above.
        self.sessions.get(&id).expect("just upserted")
    }

    /// Like [`upsert`](Self::upsert) but refuses to replace an occupied
    /// identifier.
    ///
    /// # Errors
    /// Returns [`SessionError::DuplicateIdentifier`] if `id` is already
    /// registered. Callers re-mint and retry rather than overwrite.
    pub fn create(
        &mut self,
        id: SessionId,
        participants: Vec<Participant>,
        match_interests: HashSet<String>,
        timeout: Duration,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&id) {
            return Err(SessionError::DuplicateIdentifier(id));
        }
        Ok(self.upsert(id, participants, match_interests, timeout))
    }

    /// Looks up a session by identifier.
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Mutable lookup. The disconnect path edits the participant list in
    /// place through this — deliberately WITHOUT touching the timer.
    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Removes the session and cancels its timer if still pending.
    /// Safe to call on an absent identifier (returns `None`, no-op).
    pub fn delete(&mut self, id: &SessionId) -> Option<Session> {
        if let Some(arm) = self.timers.remove(id) {
            arm.task.abort();
        }
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            self.order.retain(|o| o != id);
        }
        removed
    }

    /// Finds a joinable session for the given interests, delegating to
    /// the matcher over creation-order iteration. The returned session
    /// may be full — capacity is the caller's concern.
    pub fn find_joinable(
        &self,
        interests: &HashSet<String>,
    ) -> Option<&Session> {
        matcher::select(interests, self.iter())
    }

    /// Consumes a timer notice.
    ///
    /// Removes and returns the session only when the identifier is still
    /// registered AND the notice's generation matches the current arm.
    /// Anything else — the session was deleted, or the timer was re-armed
    /// after this notice was scheduled — is a stale firing and a no-op.
    ///
    /// The removed session is handed back with its participants intact so
    /// the caller can notify them before dropping it.
    pub fn expire(&mut self, notice: &ExpiryNotice) -> Option<Session> {
        match self.timers.get(&notice.session_id) {
            Some(arm) if arm.generation == notice.generation => {
                tracing::info!(session_id = %notice.session_id, "session expired");
                self.delete(&notice.session_id)
            }
            _ => {
                tracing::debug!(
                    session_id = %notice.session_id,
                    generation = notice.generation,
                    "stale expiry notice ignored"
                );
                None
            }
        }
    }

    /// Returns `true` if the identifier is registered.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterates live sessions in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    /// Cancels the previous arm (if any) and schedules a new firing
    /// `timeout` from now under a fresh generation.
    fn arm_timer(&mut self, id: &SessionId, timeout: Duration) {
        if let Some(old) = self.timers.remove(id) {
            old.task.abort();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let notice_tx = self.notice_tx.clone();
        let session_id = id.clone();

        // The timer task touches no shared state: it sleeps, sends one
        // notice, and exits. All registry mutation stays on the owner.
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = notice_tx.send(ExpiryNotice {
                session_id,
                generation,
            });
        });

        self.timers
            .insert(id.clone(), TimerArm { generation, task });
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        for arm in self.timers.values() {
            arm.task.abort();
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionRegistry`.
    //!
    //! These tests follow the naming convention from the coding standards:
    //!   `test_{function}_{scenario}_{expected}`
    //!
    //! # Testing time-dependent behavior
    //!
    //! Timer behavior is tested under Tokio's paused clock
    //! (`#[tokio::test(start_paused = true)]`): time only moves when the
    //! test advances it (or when every task is asleep), so "the timer
    //! fires at exactly created_at + timeout" is a deterministic
    //! assertion, not a flaky sleep.

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(180_000);

    fn interests(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn participant(id: u64, name: &str) -> Participant {
        let (tx, _rx) = mpsc::unbounded_channel();
        Participant {
            id: kindred_protocol::ParticipantId(id),
            username: name.into(),
            interests: interests(&["music"]),
            outbox: tx,
        }
    }

    fn registry() -> (SessionRegistry, mpsc::UnboundedReceiver<ExpiryNotice>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionRegistry::new(tx), rx)
    }

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    // =====================================================================
    // upsert() / create() / get()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_upsert_inserts_new_session() {
        let (mut reg, _rx) = registry();

        let session = reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );

        assert_eq!(session.id, sid("s1"));
        assert_eq!(session.usernames(), vec!["alice"]);
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(&sid("s1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upsert_existing_id_resets_deadline_and_keeps_created_at() {
        let (mut reg, _rx) = registry();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );
        let created = reg.get(&sid("s1")).unwrap().created_at;
        let first_deadline = reg.get(&sid("s1")).unwrap().deadline;

        tokio::time::advance(Duration::from_secs(100)).await;

        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice"), participant(2, "bob")],
            interests(&["music"]),
            TIMEOUT,
        );

        let session = reg.get(&sid("s1")).unwrap();
        assert_eq!(session.created_at, created, "created_at must survive");
        assert_eq!(
            session.deadline,
            first_deadline + Duration::from_secs(100),
            "deadline must be pushed out by the elapsed time"
        );
        assert_eq!(session.usernames(), vec!["alice", "bob"]);
        assert_eq!(reg.len(), 1, "upsert must not duplicate the entry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_duplicate_identifier_returns_error() {
        let (mut reg, _rx) = registry();
        reg.create(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        )
        .expect("first create should succeed");

        let result = reg.create(
            sid("s1"),
            vec![participant(2, "bob")],
            interests(&["film"]),
            TIMEOUT,
        );

        assert!(
            matches!(result, Err(SessionError::DuplicateIdentifier(id)) if id == sid("s1")),
            "must refuse to overwrite an occupied identifier"
        );
        // The original occupant is untouched.
        assert_eq!(reg.get(&sid("s1")).unwrap().usernames(), vec!["alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_returns_none_for_unknown_id() {
        let (reg, _rx) = registry();
        assert!(reg.get(&sid("nope")).is_none());
    }

    // =====================================================================
    // delete()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_session_and_cancels_timer() {
        let (mut reg, mut rx) = registry();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );

        let removed = reg.delete(&sid("s1"));
        assert!(removed.is_some());
        assert!(reg.is_empty());

        // Long past the deadline, the cancelled timer must not have fired.
        tokio::time::advance(TIMEOUT * 3).await;
        tokio::task::yield_now().await;
        assert!(
            rx.try_recv().is_err(),
            "cancelled timer must never produce a notice"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_absent_id_is_noop() {
        let (mut reg, _rx) = registry();
        assert!(reg.delete(&sid("ghost")).is_none());
    }

    // =====================================================================
    // Timer firing / expire()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_exactly_at_deadline() {
        let (mut reg, mut rx) = registry();
        let armed_at = Instant::now();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );

        // Awaiting the notice auto-advances the paused clock to the next
        // sleeping task — which is exactly the timer.
        let notice = rx.recv().await.expect("timer should fire");
        assert_eq!(notice.session_id, sid("s1"));
        assert_eq!(Instant::now() - armed_at, TIMEOUT);

        // Honoring the notice removes the session and yields it back.
        let expired = reg.expire(&notice).expect("should expire");
        assert_eq!(expired.usernames(), vec!["alice"]);
        assert!(reg.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_with_stale_generation_is_noop() {
        let (mut reg, mut rx) = registry();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );

        // First arm fires...
        let stale = rx.recv().await.expect("first arm should fire");

        // ...but before the owner processed it, the session was re-armed
        // (a second participant joined). The stale notice must be ignored.
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice"), participant(2, "bob")],
            interests(&["music"]),
            TIMEOUT,
        );

        assert!(reg.expire(&stale).is_none());
        assert!(
            reg.contains(&sid("s1")),
            "session must survive a stale firing"
        );

        // The fresh arm still fires on its own schedule.
        let fresh = rx.recv().await.expect("re-arm should fire");
        assert!(fresh.generation > stale.generation);
        assert!(reg.expire(&fresh).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_unknown_session_is_noop() {
        let (mut reg, _rx) = registry();
        let notice = ExpiryNotice {
            session_id: sid("ghost"),
            generation: 99,
        };
        assert!(reg.expire(&notice).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_pushes_firing_out() {
        let (mut reg, mut rx) = registry();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );

        // Re-arm 10 seconds before the original deadline.
        tokio::time::advance(TIMEOUT - Duration::from_secs(10)).await;
        let rearmed_at = Instant::now();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice"), participant(2, "bob")],
            interests(&["music"]),
            TIMEOUT,
        );

        let notice = rx.recv().await.expect("should fire eventually");
        assert_eq!(
            Instant::now() - rearmed_at,
            TIMEOUT,
            "firing must be a full timeout after the re-arm, not the original deadline"
        );
        assert!(reg.expire(&notice).is_some());
    }

    // =====================================================================
    // find_joinable() / iter()
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_find_joinable_scans_in_creation_order() {
        let (mut reg, _rx) = registry();
        reg.upsert(
            sid("older"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );
        reg.upsert(
            sid("newer"),
            vec![participant(2, "bob")],
            interests(&["music", "film"]),
            TIMEOUT,
        );

        let found = reg.find_joinable(&interests(&["music", "film"]));
        assert_eq!(found.unwrap().id, sid("older"), "first match wins");
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_joinable_none_when_disjoint() {
        let (mut reg, _rx) = registry();
        reg.upsert(
            sid("s1"),
            vec![participant(1, "alice")],
            interests(&["music"]),
            TIMEOUT,
        );

        assert!(reg.find_joinable(&interests(&["chess"])).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_iter_order_survives_deletes_and_upserts() {
        let (mut reg, _rx) = registry();
        for name in ["a", "b", "c"] {
            reg.upsert(
                sid(name),
                vec![participant(1, "p")],
                interests(&["x"]),
                TIMEOUT,
            );
        }
        reg.delete(&sid("b"));
        // Re-upserting an existing id must keep its original position.
        reg.upsert(
            sid("a"),
            vec![participant(1, "p"), participant(2, "q")],
            interests(&["x"]),
            TIMEOUT,
        );

        let ids: Vec<_> = reg.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![sid("a"), sid("c")]);
    }
}
