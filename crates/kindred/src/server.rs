//! `KindredServer` builder and accept loop.
//!
//! This is the entry point for running a Kindred chat server. It ties
//! together all the layers: transport → protocol → session → store.

use std::sync::Arc;

use kindred_protocol::{Codec, JsonCodec};
use kindred_session::{
    Authenticator, CoordinatorHandle, SessionConfig, spawn_coordinator,
};
use kindred_store::MessageLog;
use kindred_transport::{Transport, WebSocketTransport};

use crate::KindredError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. There is
/// no mutex here: all mutable matchmaking state lives inside the
/// coordinator task, reached through its handle.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) coordinator: CoordinatorHandle,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Kindred server.
///
/// # Example
///
/// ```rust,ignore
/// use kindred::prelude::*;
///
/// let server = KindredServerBuilder::new()
///     .bind("0.0.0.0:4000")
///     .build(JwtAuthenticator::new(secret), MemoryMessageLog::new())
///     .await?;
/// server.run().await
/// ```
pub struct KindredServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl KindredServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration (expiry timeout, overflow size).
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Builds the server with the given authenticator and message log.
    ///
    /// Binds the listening socket and spawns the coordinator task. Uses
    /// `JsonCodec` and `WebSocketTransport`, which is what the browser
    /// client speaks.
    pub async fn build<A: Authenticator, L: MessageLog>(
        self,
        auth: A,
        log: L,
    ) -> Result<KindredServer<A, JsonCodec>, KindredError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let coordinator =
            spawn_coordinator(self.session_config, Arc::new(log));

        let state = Arc::new(ServerState {
            coordinator,
            auth,
            codec: JsonCodec,
        });

        Ok(KindredServer { transport, state })
    }
}

impl Default for KindredServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Kindred chat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KindredServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> KindredServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    ///
    /// Useful when binding to port 0 and needing the assigned port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle to the coordinator, for introspection
    /// (snapshots) or a graceful shutdown from outside the accept loop.
    pub fn coordinator(&self) -> CoordinatorHandle {
        self.state.coordinator.clone()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), KindredError> {
        tracing::info!("kindred server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection::<A, C>(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
