//! The coordinator: one task that owns all mutable matchmaking state.
//!
//! Every external event — connect, chat, disconnect — and every timer
//! firing is applied to the registry by this single actor, delivered over
//! channels and processed one at a time. That is the whole concurrency
//! story: no event handler can observe a partially-updated session, and a
//! timer firing can never race an in-flight connect or disconnect for the
//! same identifier, because they all queue behind the same loop.
//!
//! ```text
//!  connection handlers ──commands──→ ┌─────────────┐
//!                                    │ Coordinator │──→ participant outboxes
//!  timer tasks ──expiry notices────→ │   (1 task)  │
//!                                    └─────────────┘
//!                                      owns: registry, membership index,
//!                                            overflow holding set
//! ```
//!
//! The only external I/O issued from here is the message-log append,
//! which is spawned fire-and-forget — its completion never gates the
//! broadcast of the message.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use kindred_protocol::{ParticipantId, ServerEvent, SessionId};
use kindred_store::MessageLog;
use tokio::sync::{mpsc, oneshot};

use crate::registry::{ExpiryNotice, SessionRegistry};
use crate::{
    Participant, SessionConfig, SessionError, SessionPhase, mint_session_id,
};

/// Command channel capacity. Connection handlers await their sends, so a
/// full channel applies backpressure rather than dropping events.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Reason string sent with `waiting` when a fresh session was created.
const WAITING_FOR_PARTNER: &str = "Waiting for partner to join";

/// Reason string sent with `waiting` when the matched session was full.
const WAITING_OVERFLOW: &str = "No available sessions, added to waiting list";

/// Commands sent to the coordinator through its channel.
enum Command {
    /// A participant connected (already authenticated upstream).
    Connect { participant: Participant },

    /// A participant sent a chat message.
    Chat { id: ParticipantId, text: String },

    /// A participant's connection went away.
    Disconnect { id: ParticipantId },

    /// Request a snapshot of current state (tests, introspection).
    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },

    /// Stop the coordinator task.
    Shutdown,
}

/// A point-in-time view of the coordinator's state.
///
/// Because the reply rides the same queue as every other command, a
/// snapshot also acts as a barrier: when it arrives, every command
/// submitted before it has been fully applied.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Live sessions in creation order.
    pub sessions: Vec<SessionSummary>,
    /// Number of candidates parked in the overflow holding set.
    pub waiting: usize,
}

impl RegistrySnapshot {
    /// Finds a session summary by identifier.
    pub fn session(&self, id: &SessionId) -> Option<&SessionSummary> {
        self.sessions.iter().find(|s| &s.id == id)
    }
}

/// Summary of one live session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub usernames: Vec<String>,
    pub phase: SessionPhase,
}

/// Handle for submitting events to a running [`Coordinator`].
///
/// Cheap to clone — it's just an `mpsc::Sender` wrapper. Each connection
/// handler holds one. Sends are awaited, so events from one connection
/// are applied in the order that connection submitted them.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Submits a connect event for an authenticated participant.
    pub async fn connect(
        &self,
        participant: Participant,
    ) -> Result<(), SessionError> {
        self.send(Command::Connect { participant }).await
    }

    /// Submits a chat message. Silently ignored by the coordinator if
    /// the sender has no session.
    pub async fn chat(
        &self,
        id: ParticipantId,
        text: String,
    ) -> Result<(), SessionError> {
        self.send(Command::Chat { id, text }).await
    }

    /// Submits a disconnect event.
    pub async fn disconnect(
        &self,
        id: ParticipantId,
    ) -> Result<(), SessionError> {
        self.send(Command::Disconnect { id }).await
    }

    /// Requests a state snapshot. Doubles as a processing barrier for
    /// previously submitted events.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::CoordinatorClosed)
    }

    /// Tells the coordinator to stop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::CoordinatorClosed)
    }
}

/// Spawns the coordinator task and returns a handle to it.
///
/// The coordinator takes ownership of the registry (created internally,
/// wired to its own notice channel) and shares the message log for
/// fire-and-forget appends.
pub fn spawn_coordinator<L: MessageLog>(
    config: SessionConfig,
    log: Arc<L>,
) -> CoordinatorHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();

    let coordinator = Coordinator {
        registry: SessionRegistry::new(notice_tx),
        membership: HashMap::new(),
        overflow: VecDeque::new(),
        config,
        log,
        commands: command_rx,
        notices: notice_rx,
    };

    tokio::spawn(coordinator.run());

    CoordinatorHandle { tx: command_tx }
}

/// The coordinator actor. Owns every piece of mutable matchmaking state.
pub struct Coordinator<L: MessageLog> {
    /// The session registry (and, through it, all expiry timers).
    registry: SessionRegistry,

    /// Which session each participant is currently in. A participant is
    /// in at most one session (key invariant); overflow candidates have
    /// no entry here.
    membership: HashMap<ParticipantId, SessionId>,

    /// Candidates who matched a session that was already full. Bounded;
    /// the oldest is evicted when capacity is hit. Read only for
    /// disconnect cleanup — never re-consulted by matching (mirrors the
    /// product behavior; see the open question note in the design doc).
    overflow: VecDeque<Participant>,

    config: SessionConfig,

    /// Shared with spawned append tasks.
    log: Arc<L>,

    commands: mpsc::Receiver<Command>,

    /// Timer firings from the registry's arms.
    notices: mpsc::UnboundedReceiver<ExpiryNotice>,
}

impl<L: MessageLog> Coordinator<L> {
    /// Runs the event loop until shutdown.
    ///
    /// `biased` makes the select check expiry notices first on every
    /// iteration — not for correctness (both arms funnel into the same
    /// serialized handler), just so a due expiry isn't starved behind a
    /// burst of commands.
    async fn run(mut self) {
        tracing::info!("coordinator started");

        loop {
            tokio::select! {
                biased;

                Some(notice) = self.notices.recv() => {
                    self.handle_expiry(notice);
                }

                cmd = self.commands.recv() => match cmd {
                    Some(Command::Connect { participant }) => {
                        self.handle_connect(participant);
                    }
                    Some(Command::Chat { id, text }) => {
                        self.handle_chat(id, text);
                    }
                    Some(Command::Disconnect { id }) => {
                        self.handle_disconnect(id);
                    }
                    Some(Command::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        tracing::info!("coordinator stopped");
    }

    /// Connect: find a joinable session, else create one.
    fn handle_connect(&mut self, participant: Participant) {
        if self.membership.contains_key(&participant.id) {
            // A second Connect on a live connection is a client bug, not
            // ours. Log and drop it.
            tracing::warn!(
                id = %participant.id,
                "duplicate connect for known participant, ignoring"
            );
            return;
        }

        tracing::info!(
            id = %participant.id,
            username = %participant.username,
            interests = ?participant.interests,
            "participant connected"
        );

        let matched = self
            .registry
            .find_joinable(&participant.interests)
            .map(|s| (s.id.clone(), s.is_full()));

        match matched {
            Some((session_id, false)) => {
                self.join_session(session_id, participant);
            }
            Some((session_id, true)) => {
                // The matched session has no room. Park the candidate in
                // the overflow holding set; they stay there until they
                // disconnect (or get evicted by newer arrivals).
                tracing::info!(
                    id = %participant.id,
                    %session_id,
                    "matched session full, holding participant"
                );
                if self.overflow.len() >= self.config.overflow_capacity {
                    if let Some(evicted) = self.overflow.pop_front() {
                        tracing::warn!(
                            id = %evicted.id,
                            "overflow holding set full, evicting oldest"
                        );
                    }
                }
                participant.notify(ServerEvent::Waiting {
                    reason: WAITING_OVERFLOW.into(),
                });
                self.overflow.push_back(participant);
            }
            None => {
                self.create_session(participant);
            }
        }
    }

    /// Appends the participant to an existing Forming session. Re-arms
    /// the timer via upsert; `match_interests` stays exactly as recorded
    /// at creation.
    fn join_session(&mut self, session_id: SessionId, participant: Participant) {
        let Some(session) = self.registry.get(&session_id) else {
            // find_joinable just returned it; absent here would mean the
            // single-owner model broke. Recover by creating instead.
            tracing::error!(%session_id, "matched session vanished, creating new");
            self.create_session(participant);
            return;
        };

        let mut participants = session.participants.clone();
        let match_interests = session.match_interests.clone();
        participants.push(participant.clone());

        let session = self.registry.upsert(
            session_id.clone(),
            participants,
            match_interests,
            self.config.timeout,
        );

        let started = ServerEvent::SessionStart {
            session_id: session_id.clone(),
            usernames: session.usernames(),
        };
        session.broadcast(&started);

        self.membership.insert(participant.id, session_id.clone());
        tracing::info!(
            id = %participant.id,
            %session_id,
            phase = %session.phase(),
            "participant joined session"
        );
    }

    /// Creates a fresh Forming session with this participant as its
    /// first member and their interests as the frozen match set.
    fn create_session(&mut self, participant: Participant) {
        let session_id = loop {
            let candidate = mint_session_id();
            match self.registry.create(
                candidate,
                vec![participant.clone()],
                participant.interests.clone(),
                self.config.timeout,
            ) {
                Ok(session) => break session.id.clone(),
                Err(SessionError::DuplicateIdentifier(id)) => {
                    tracing::warn!(%id, "session id collision, re-minting");
                }
                Err(e) => {
                    tracing::error!(error = %e, "session create failed");
                    return;
                }
            }
        };

        self.membership.insert(participant.id, session_id.clone());
        participant.notify(ServerEvent::Waiting {
            reason: WAITING_FOR_PARTNER.into(),
        });
        tracing::info!(
            id = %participant.id,
            %session_id,
            "created session"
        );
    }

    /// Chat: persist (fire-and-forget) and broadcast with one
    /// server-assigned timestamp. Never touches the expiry timer.
    fn handle_chat(&mut self, id: ParticipantId, text: String) {
        let Some(session_id) = self.membership.get(&id) else {
            // Sessionless chatter (overflow candidate, or a message that
            // raced an expiry). Deliberately silent — not an error.
            tracing::debug!(%id, "chat from sessionless participant, ignoring");
            return;
        };

        let Some(session) = self.registry.get(session_id) else {
            tracing::debug!(%id, %session_id, "chat for unknown session, ignoring");
            return;
        };

        let Some(sender) = session.participant(id) else {
            tracing::debug!(%id, %session_id, "chat sender not in session, ignoring");
            return;
        };

        let timestamp = kindred_store::now_millis();
        let sender_name = sender.username.clone();

        // Persist without gating the broadcast. A failed write costs us
        // durability, not delivery.
        let log = Arc::clone(&self.log);
        let log_session = session_id.clone();
        let log_sender = sender_name.clone();
        let log_text = text.clone();
        tokio::spawn(async move {
            if let Err(e) =
                log.append(&log_session, &log_sender, &log_text).await
            {
                tracing::warn!(
                    session_id = %log_session,
                    error = %e,
                    "chat message persistence failed"
                );
            }
        });

        session.broadcast(&ServerEvent::ChatMessage {
            sender: sender_name,
            text,
            timestamp,
        });
    }

    /// Disconnect: pull the participant out of their session (if any)
    /// and out of the overflow holding set.
    fn handle_disconnect(&mut self, id: ParticipantId) {
        self.overflow.retain(|p| p.id != id);

        let Some(session_id) = self.membership.remove(&id) else {
            tracing::debug!(%id, "disconnect from sessionless participant");
            return;
        };

        let Some(session) = self.registry.get_mut(&session_id) else {
            // Already expired in the same batch; nothing to clean up.
            return;
        };

        if !session.remove_participant(id) {
            return;
        }

        if session.participants.is_empty() {
            // Last one out deletes the session — and cancels its timer —
            // in this same step. An empty session never survives an event.
            self.registry.delete(&session_id);
            tracing::info!(%id, %session_id, "session deleted (empty)");
        } else {
            // One participant remains. The session keeps running on its
            // ORIGINAL countdown: no re-arm, no cancel. A later connect
            // can still join it (it has room again); nothing held in
            // overflow is proactively retried against it.
            session.broadcast(&ServerEvent::PartnerLeft);
            tracing::info!(%id, %session_id, "participant left, partner notified");
        }
    }

    /// Timer expiry: notify remaining participants, drop their
    /// membership, and let the registry remove the session. Stale
    /// notices (cancelled or replaced arms) are filtered inside
    /// `registry.expire` and end up as no-ops here.
    fn handle_expiry(&mut self, notice: ExpiryNotice) {
        let Some(session) = self.registry.expire(&notice) else {
            return;
        };

        for participant in &session.participants {
            self.membership.remove(&participant.id);
            participant.notify(ServerEvent::SessionExpired);
        }
        tracing::info!(
            session_id = %session.id,
            participants = session.participants.len(),
            "session expired and removed"
        );
    }

    fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            sessions: self
                .registry
                .iter()
                .map(|s| SessionSummary {
                    id: s.id.clone(),
                    usernames: s.usernames(),
                    phase: s.phase(),
                })
                .collect(),
            waiting: self.overflow.len(),
        }
    }
}
