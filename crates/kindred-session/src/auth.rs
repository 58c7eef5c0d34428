//! Authentication: turning a credential into a username + interest set.
//!
//! The session core never sees an unauthenticated event. The connection
//! handler validates the token from the client's first frame through the
//! [`Authenticator`] trait BEFORE building a participant; a failing
//! credential closes the connection and nothing reaches the coordinator.
//! The core therefore assumes validated input and does not re-validate.
//!
//! # Why a trait?
//!
//! The trait decouples the core from any particular identity provider:
//! - [`JwtAuthenticator`] (shipped) validates HS256 tokens
//! - a test double can accept canned profiles
//! - a deployment can call out to whatever issues its tokens
//!
//! All without changing any session code.

use std::collections::HashSet;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

/// A validated identity: who the participant is and what they declared
/// they're into. This is everything the core knows about a person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Display name, shown to the partner in `session-start` and
    /// `chat-message` events.
    pub username: String,
    /// Declared interests. Matching uses these once, at connect time.
    pub interests: HashSet<String>,
}

/// Errors from credential validation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is invalid: bad signature, expired, malformed, or
    /// missing required claims.
    #[error("credential rejected: {0}")]
    Rejected(String),

    /// The token verified but its claims don't form a usable profile
    /// (e.g. empty username).
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

/// Validates a client's credential and returns their profile.
///
/// # Trait bounds
///
/// - `Send + Sync` → shared across connection handler tasks.
/// - `'static` → lives as long as the server.
///
/// The returned future must be `Send` because handlers run on Tokio's
/// multi-threaded runtime.
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token.
    ///
    /// # Returns
    /// - `Ok(Profile)` — credential accepted, here's who they are
    /// - `Err(AuthError)` — rejected; the caller must not let this
    ///   connection reach the coordinator
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Profile, AuthError>> + Send;
}

// ---------------------------------------------------------------------------
// JwtAuthenticator
// ---------------------------------------------------------------------------

/// The claims carried in a Kindred token.
///
/// `exp` is seconds since the unix epoch, per RFC 7519. Interests travel
/// as a list in the token and become a set in the profile.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    username: String,
    interests: Vec<String>,
    exp: u64,
}

/// HS256 JWT validation against a shared secret.
///
/// Token issuance (a login endpoint) is outside this crate's scope, but
/// [`issue`](Self::issue) mints tokens with the same secret — the demo
/// binary and the end-to-end tests use it in place of a real issuer.
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    /// Creates an authenticator for the given shared secret.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mints a token for the given identity, valid for `ttl`.
    ///
    /// # Errors
    /// Returns [`AuthError::Rejected`] if signing fails (effectively
    /// never with an HS256 secret key).
    pub fn issue(
        &self,
        username: &str,
        interests: &[&str],
        ttl: std::time::Duration,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            username: username.to_string(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            exp: kindred_store::now_millis() / 1000 + ttl.as_secs(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Rejected(e.to_string()))
    }
}

impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Profile, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::Rejected(e.to_string()))?;

        let claims = data.claims;
        if claims.username.trim().is_empty() {
            return Err(AuthError::InvalidProfile(
                "username must not be empty".into(),
            ));
        }

        Ok(Profile {
            username: claims.username,
            interests: claims.interests.into_iter().collect(),
        })
    }
}

// =========================================================================
// Tests
// =========================================================================
