//! Signed access and refresh tokens
//!
//! Tokens are JWTs signed with a key from a [`KeyRing`]. Each token names its
//! signing key in the `kid` header and its kind in the `typ` claim, so access and
//! refresh tokens can never be substituted for one another.
//!
//! Access tokens are fully stateless. Refresh tokens are signature-checked here
//! and then re-checked against the credential store by
//! [`crate::services::TokenService`].
mod issuer;
mod keys;

pub use issuer::TokenIssuer;
pub use keys::{KeyRing, SigningKey};

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// The kind of a token, carried in the `typ` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every warden token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub sub: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expires at (seconds since epoch); the token is valid while `now < exp`
    pub exp: i64,
    pub typ: TokenKind,
    /// Unique token ID
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Token lifetimes and issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// When set, written into the `iss` claim and required on validation
    pub issuer: Option<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(30),
            refresh_ttl: Duration::days(7),
            issuer: None,
        }
    }
}

impl TokenConfig {
    pub fn with_access_ttl(mut self, access_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, refresh_ttl: Duration) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }
}

/// An access token and a refresh token issued together at login
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
