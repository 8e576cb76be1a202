//! Granted access and refresh tokens.
//!
//! # Storage Security
//!
//! The token value itself is never stored. Records are keyed by
//! [`GrantedToken::hash_token`] of the value, similar to password storage.
//! Looking a token up means hashing the presented value and fetching by
//! handle.

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::client::AccessTokenFormat;
use super::scope::ScopeSet;

/// Whether a record is an access or a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived access token.
    Access,
    /// Long-lived refresh token.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access_token"),
            Self::Refresh => write!(f, "refresh_token"),
        }
    }
}

/// A granted token record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantedToken {
    /// Unique token identifier (the JWT `jti` for signed tokens).
    pub jti: String,

    /// SHA-256 hex of the token value.
    pub handle: String,

    /// Access or refresh.
    pub kind: TokenKind,

    /// Signed JWT or opaque handle.
    pub format: AccessTokenFormat,

    /// Client the token was issued to.
    pub client_id: String,

    /// Resource owner, absent for the client credentials grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Granted scopes.
    pub scopes: ScopeSet,

    /// Intended audience.
    #[serde(default)]
    pub audience: Vec<String>,

    /// Token type as reported to clients.
    pub token_type: String,

    /// When the token was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the token was revoked, if it was.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,

    /// Additional claims surfaced through introspection.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

impl GrantedToken {
    /// Hash a token value using SHA-256.
    ///
    /// This is used both when storing new tokens and when looking up
    /// tokens for validation.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate a cryptographically secure random token.
    ///
    /// Returns a 256-bit random value encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Returns `true` if this token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if the token is neither expired nor revoked at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.is_expired_at(now) && !self.is_revoked()
    }

    /// Lifetime in whole seconds as issued.
    #[must_use]
    pub fn lifetime_seconds(&self) -> i64 {
        (self.expires_at - self.issued_at).whole_seconds()
    }
}

/// A freshly issued token: the value for the client and the record for the
/// server.
#[derive(Clone)]
pub struct IssuedToken {
    /// The token value handed to the client.
    pub value: String,

    /// The record describing it.
    pub token: GrantedToken,
}

impl IssuedToken {
    /// Seconds until expiry as reported in `expires_in`.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        u64::try_from(self.token.lifetime_seconds()).unwrap_or(0)
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("value", &"<redacted>")
            .field("token", &self.token)
            .finish()
    }
}
