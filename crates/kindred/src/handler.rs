//! Per-connection handler: the connect handshake and the event pumps.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive the first frame → must be a `connect` event
//!   2. Authenticate the token → get the participant's profile
//!   3. Hand the participant to the coordinator (which replies through
//!      the participant's outbox with `waiting` or `session-start`)
//!   4. Loop: pump outbox notifications to the socket, and socket frames
//!      to the coordinator
//!
//! Authentication failures close the socket without sending anything —
//! a rejected credential gets no protocol-level explanation.

use std::sync::Arc;
use std::time::Duration;

use kindred_protocol::{Codec, ClientEvent, ParticipantId, ProtocolError};
use kindred_session::{Authenticator, CoordinatorHandle, Participant, Profile};
use kindred_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::KindredError;
use crate::server::ServerState;

/// How long a fresh connection has to send its `connect` frame.
const CONNECT_DEADLINE: Duration = Duration::from_secs(10);

/// Drop guard that submits a disconnect when the handler exits.
///
/// This ensures session cleanup happens even if the handler panics.
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async channel send.
struct DisconnectGuard {
    id: ParticipantId,
    coordinator: CoordinatorHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let id = self.id;
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let _ = coordinator.disconnect(id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), KindredError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: connect frame + authentication ---
    let profile = match await_connect(&conn, &state).await {
        Ok(profile) => profile,
        Err(e) => {
            // Close without telling the client why. Credential failures
            // are logged server-side only.
            let _ = conn.close().await;
            return Err(e);
        }
    };

    let participant_id = ParticipantId(conn_id.into_inner());
    tracing::info!(
        %conn_id,
        id = %participant_id,
        username = %profile.username,
        "participant authenticated"
    );

    // The outbox is how the coordinator reaches this connection: it
    // holds the sender (inside the Participant), we pump the receiver
    // into the socket below.
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();

    state
        .coordinator
        .connect(Participant {
            id: participant_id,
            username: profile.username,
            interests: profile.interests,
            outbox: outbox_tx,
        })
        .await?;
    let _guard = DisconnectGuard {
        id: participant_id,
        coordinator: state.coordinator.clone(),
    };

    // --- Step 2: event pumps ---
    loop {
        tokio::select! {
            notification = outbox_rx.recv() => {
                let Some(event) = notification else {
                    // Every sender is gone: the coordinator no longer
                    // references this participant (its session expired),
                    // so nothing can ever arrive here again. Close.
                    tracing::info!(
                        id = %participant_id,
                        "no live session references, closing"
                    );
                    break;
                };
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await.map_err(KindredError::Transport)?;
            }

            incoming = conn.recv() => {
                let data = match incoming {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(
                            id = %participant_id,
                            "connection closed cleanly"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(
                            id = %participant_id, error = %e, "recv error"
                        );
                        break;
                    }
                };

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        // Malformed frames are dropped, not fatal — the
                        // connection and session stay up.
                        tracing::debug!(
                            id = %participant_id,
                            error = %e,
                            "undecodable frame dropped"
                        );
                        continue;
                    }
                };

                match event {
                    ClientEvent::ChatMessage { text } => {
                        state.coordinator.chat(participant_id, text).await?;
                    }
                    ClientEvent::Disconnect { reason } => {
                        tracing::info!(
                            id = %participant_id,
                            %reason,
                            "client disconnected"
                        );
                        break;
                    }
                    ClientEvent::Connect { .. } => {
                        tracing::debug!(
                            id = %participant_id,
                            "connect on established connection, ignoring"
                        );
                    }
                }
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → disconnect reaches the coordinator.
    Ok(())
}

/// Waits for the connect frame and validates its token.
///
/// Anything other than a timely, well-formed `connect` event carrying an
/// acceptable credential is an error; the caller closes the socket.
async fn await_connect<A, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<A, C>>,
) -> Result<Profile, KindredError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(CONNECT_DEADLINE, conn.recv()).await
    {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(KindredError::Protocol(ProtocolError::InvalidEvent(
                "connection closed before connect".into(),
            )));
        }
        Ok(Err(e)) => return Err(KindredError::Transport(e)),
        Err(_) => {
            return Err(KindredError::Protocol(ProtocolError::InvalidEvent(
                "connect timed out".into(),
            )));
        }
    };

    let event: ClientEvent = state.codec.decode(&data)?;

    let ClientEvent::Connect { token } = event else {
        return Err(KindredError::Protocol(ProtocolError::InvalidEvent(
            "first event must be connect".into(),
        )));
    };

    let profile = state.auth.authenticate(&token).await?;
    Ok(profile)
}
