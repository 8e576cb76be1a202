//! Token revocation (RFC 7009) wire types.
//!
//! The revocation endpoint answers 200 OK whether or not the token existed;
//! see [`TokenService::revoke`](super::service::TokenService::revoke).

use serde::{Deserialize, Serialize};

/// Token revocation request per RFC 7009.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RevocationRequest {
    /// The token to revoke.
    pub token: String,

    /// Optional hint about the token type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_hint: Option<TokenTypeHint>,
}

impl RevocationRequest {
    /// Creates a request without a hint.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type_hint: None,
        }
    }

    /// Sets the token type hint.
    #[must_use]
    pub fn with_hint(mut self, hint: TokenTypeHint) -> Self {
        self.token_type_hint = Some(hint);
        self
    }
}

/// Token type hint for revocation and introspection requests.
///
/// A hint only orders the lookups; a wrong hint never makes a valid token
/// unrecognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// The token is an access token.
    AccessToken,

    /// The token is a refresh token.
    RefreshToken,
}

impl TokenTypeHint {
    /// Returns the wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
