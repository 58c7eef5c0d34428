//! Runnable anonymous pair-chat server.
//!
//! Configuration comes from the environment:
//!
//! - `KINDRED_ADDR` — listen address (default `0.0.0.0:4000`)
//! - `KINDRED_JWT_SECRET` — HS256 secret shared with the token issuer;
//!   falls back to an insecure development value if unset
//! - `KINDRED_SESSION_TIMEOUT_MS` — session expiry in milliseconds
//!   (default 180000)
//! - `RUST_LOG` — log filter (default `info`)
//!
//! Chat history goes to the in-memory log; swap in a real `MessageLog`
//! implementation for durable storage.

use std::time::Duration;

use kindred::prelude::*;
use tracing_subscriber::EnvFilter;

/// Secret used when `KINDRED_JWT_SECRET` is unset. Tokens signed with
/// this are forgeable by anyone who reads the source.
const DEV_SECRET: &str = "kindred-dev-secret";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = env_or("KINDRED_ADDR", "0.0.0.0:4000");

    let secret = match std::env::var("KINDRED_JWT_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            tracing::warn!(
                "KINDRED_JWT_SECRET not set, using the development secret"
            );
            DEV_SECRET.to_string()
        }
    };

    let timeout_ms: u64 = env_or("KINDRED_SESSION_TIMEOUT_MS", "180000")
        .parse()
        .map_err(|_| "KINDRED_SESSION_TIMEOUT_MS must be an integer")?;

    let config = SessionConfig {
        timeout: Duration::from_millis(timeout_ms),
        ..SessionConfig::default()
    };

    tracing::info!(%addr, timeout_ms, "starting anon-chat server");

    let server = KindredServerBuilder::new()
        .bind(&addr)
        .session_config(config)
        .build(JwtAuthenticator::new(&secret), MemoryMessageLog::new())
        .await?;

    server.run().await?;
    Ok(())
}
