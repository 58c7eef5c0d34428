//! Matchmaking and session lifecycle for Kindred.
//!
//! This crate is the core of the service. It pairs anonymous participants
//! into two-party chat sessions by shared interests and manages each
//! session's lifetime:
//!
//! 1. **Registry** ([`SessionRegistry`]) — the authoritative map of live
//!    sessions, owner of every expiry timer
//! 2. **Matching** ([`matcher`]) — the rule that picks a joinable session
//!    for a new arrival
//! 3. **Coordination** ([`Coordinator`], [`CoordinatorHandle`]) — the
//!    single task that applies connect/chat/disconnect/expiry events to
//!    the registry
//! 4. **Authentication** ([`Authenticator`] trait, [`JwtAuthenticator`])
//!    — turning a credential into a username + interest set before
//!    anything touches the core
//!
//! # How it fits in the stack
//!
//! ```text
//! Server layer (above)  ← accepts sockets, feeds events to the coordinator
//!     ↕
//! Session layer (this crate)  ← matching, registry, expiry, notifications
//!     ↕
//! Protocol / store layers (below)  ← event types, chat persistence
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod coordinator;
mod error;
pub mod matcher;
mod registry;
mod session;

pub use auth::{AuthError, Authenticator, JwtAuthenticator, Profile};
pub use coordinator::{
    Coordinator, CoordinatorHandle, RegistrySnapshot, SessionSummary,
    spawn_coordinator,
};
pub use error::SessionError;
pub use registry::{ExpiryNotice, SessionRegistry};
pub use session::{
    Participant, Session, SessionConfig, SessionPhase, mint_session_id,
};
