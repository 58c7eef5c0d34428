//! Session types: the data structures that represent a pairing.
//!
//! A "session" is the server's record of one ephemeral chat pairing.
//! It tracks:
//! - WHO is in it (up to two [`Participant`]s, in join order)
//! - WHAT it was matched on (the interest set frozen at creation)
//! - WHEN it dies (the expiry deadline, re-armed on every join)

use std::collections::HashSet;
use std::time::Duration;

use kindred_protocol::{ParticipantId, ServerEvent, SessionId};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// Sensible defaults are provided; operators override the fields they
/// care about.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session lives after its last participant-join event
    /// before it expires. Chat activity does NOT extend this — only
    /// creating the session or a second participant joining re-arms
    /// the timer.
    ///
    /// Default: 180 seconds.
    pub timeout: Duration,

    /// Capacity of the overflow holding set (candidates who matched a
    /// full session). When full, the oldest waiting candidate is
    /// evicted. Default: 256.
    pub overflow_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(180_000),
            overflow_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A connected participant: identity plus a way to reach them.
///
/// The two halves are deliberately decoupled:
/// - `id` is the stable connection identity, used for registry
///   membership and removal
/// - `outbox` is the send capability, used for notification delivery
///
/// The core never touches the underlying socket — it only holds this
/// channel sender. If the connection is gone, sends fail silently and
/// the disconnect event does the cleanup.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Stable identity, derived from the transport connection id.
    pub id: ParticipantId,
    /// Display name from the participant's credential.
    pub username: String,
    /// Declared interests, used once for matching.
    pub interests: HashSet<String>,
    /// Delivery channel back to the participant's connection handler.
    pub outbox: mpsc::UnboundedSender<ServerEvent>,
}

impl Participant {
    /// Delivers a notification to this participant.
    ///
    /// A closed outbox means the connection handler is gone; the
    /// disconnect event that follows will clean up membership, so a
    /// failed send is dropped rather than treated as an error.
    pub fn notify(&self, event: ServerEvent) {
        if self.outbox.send(event).is_err() {
            tracing::debug!(id = %self.id, "outbox closed, notification dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// The phase of a session, derived from its participant count.
///
/// There is no stored state field — the phase is always computed:
///
/// ```text
///   Forming (1 participant) ──(join)──→ Active (2 participants)
///       │                                   │
///       └──(expiry / leave)──→ gone ←──(expiry / both leave)┘
/// ```
///
/// "Terminated" is not a phase: a terminated session is simply absent
/// from the registry. An Active session that drops back to one
/// participant is Forming again — a later connect may join it — but it
/// keeps the original timer countdown rather than getting a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// One participant, awaiting a match.
    Forming,
    /// Two participants, chat is live.
    Active,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forming => write!(f, "Forming"),
            Self::Active => write!(f, "Active"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Maximum participants per session. Pair chat, always two.
pub const SESSION_CAPACITY: usize = 2;

/// One ephemeral chat pairing.
///
/// Invariants (upheld by the registry and coordinator, relied on
/// everywhere):
/// - `1 <= participants.len() <= 2` while the session is registered; a
///   session emptied of participants is deleted in the same step
/// - `match_interests` is frozen at creation from the first
///   participant's interests and never recomputed when someone joins
/// - exactly one expiry timer is armed for a registered session
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque unique identifier.
    pub id: SessionId,
    /// Participants in join order. Capacity exactly two.
    pub participants: Vec<Participant>,
    /// The interest set recorded at creation. Matching compares new
    /// arrivals against THIS, not against the union of current
    /// participants' interests.
    pub match_interests: HashSet<String>,
    /// When the session expires unless re-armed by a join.
    pub deadline: Instant,
    /// When the session was created. Survives joins and re-arms.
    pub created_at: Instant,
}

impl Session {
    /// Returns the session's phase, derived from participant count.
    pub fn phase(&self) -> SessionPhase {
        if self.participants.len() >= SESSION_CAPACITY {
            SessionPhase::Active
        } else {
            SessionPhase::Forming
        }
    }

    /// Returns `true` if no more participants can join.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= SESSION_CAPACITY
    }

    /// Usernames of all participants, in join order.
    pub fn usernames(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.username.clone())
            .collect()
    }

    /// Looks up a participant by id.
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Removes a participant by id. Returns `true` if they were present.
    pub fn remove_participant(&mut self, id: ParticipantId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != id);
        self.participants.len() != before
    }

    /// Delivers a notification to every participant.
    pub fn broadcast(&self, event: &ServerEvent) {
        for participant in &self.participants {
            participant.notify(event.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Identifier minting
// ---------------------------------------------------------------------------

/// Mints a fresh session identifier.
///
/// Format: `session_<unix-millis>_<0..999>`. The random suffix keeps two
/// sessions created in the same millisecond apart; the (vanishingly
/// unlikely) collision is handled by the caller, which checks registry
/// occupancy and re-mints rather than overwriting.
pub fn mint_session_id() -> SessionId {
    let mut rng = rand::rng();
    let suffix: u16 = rng.random_range(0..1000);
    SessionId::new(format!(
        "session_{}_{}",
        kindred_store::now_millis(),
        suffix
    ))
}

// =========================================================================
// Tests
// =========================================================================
