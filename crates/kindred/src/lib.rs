//! # Kindred
//!
//! Anonymous interest-based pair chat, server side.
//!
//! Kindred pairs anonymous participants into two-party chat sessions by
//! shared interests. Sessions are ephemeral: each one lives on a timer
//! that is re-armed when a partner joins and never extended by chat, so
//! every conversation has a built-in end.
//!
//! This meta-crate ties the layers together and exposes the server:
//!
//! - [`kindred_transport`] — WebSocket accept/send/recv
//! - [`kindred_protocol`] — the JSON event types clients speak
//! - [`kindred_session`] — matching, session registry, expiry timers
//! - [`kindred_store`] — chat message persistence
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kindred::prelude::*;
//!
//! # async fn start() -> Result<(), KindredError> {
//! let server = KindredServerBuilder::new()
//!     .bind("0.0.0.0:4000")
//!     .build(
//!         JwtAuthenticator::new("shared-secret"),
//!         MemoryMessageLog::new(),
//!     )
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::KindredError;
pub use server::{KindredServer, KindredServerBuilder};

/// One-stop imports for building and running a server.
pub mod prelude {
    pub use crate::{KindredError, KindredServer, KindredServerBuilder};

    pub use kindred_protocol::{
        ClientEvent, Codec, JsonCodec, ParticipantId, ServerEvent, SessionId,
    };
    pub use kindred_session::{
        AuthError, Authenticator, CoordinatorHandle, JwtAuthenticator,
        Profile, RegistrySnapshot, SessionConfig, SessionPhase,
    };
    pub use kindred_store::{ChatRecord, MemoryMessageLog, MessageLog};
    pub use kindred_transport::{Connection, Transport};
}
