//! Authorization codes.
//!
//! A code is created at the authorization step and exchanged exactly once
//! at the token endpoint. Stores delete a code when it is consumed, so a
//! used code and an unknown code look the same to later callers.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::scope::ScopeSet;
use crate::oauth::pkce::PkceChallenge;

/// An issued authorization code and the grant it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The code value (256 random bits, base64url).
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Resource owner who approved the request.
    pub subject: String,

    /// Scopes approved for this grant.
    pub scopes: ScopeSet,

    /// Redirect URI from the authorization request.
    pub redirect_uri: String,

    /// PKCE S256 challenge from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// OpenID Connect nonce from the authorization request.
    ///
    /// Not interpreted by this crate. It rides along with the grant so an
    /// ID token issuer layered on top can read it from the consumed code
    /// (see [`TokenStore::consume`](crate::storage::TokenStore::consume))
    /// and echo it in the `nonce` claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code stops being exchangeable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCode {
    /// Generate a cryptographically secure authorization code.
    ///
    /// Returns a 256-bit random value encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_code() -> String {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Binds a PKCE challenge to the code.
    #[must_use]
    pub fn with_code_challenge(mut self, challenge: &PkceChallenge) -> Self {
        self.code_challenge = Some(challenge.as_str().to_string());
        self
    }

    /// Binds an OpenID Connect nonce to the code.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Returns `true` if the code is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::pkce::PkceVerifier;
    use time::Duration;
    use time::macros::datetime;

    fn sample() -> AuthorizationCode {
        let created_at = datetime!(2024-01-01 00:00 UTC);
        AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            client_id: "web-app".to_string(),
            subject: "alice".to_string(),
            scopes: ScopeSet::parse("openid profile"),
            redirect_uri: "https://app.example.com/callback".to_string(),
            code_challenge: None,
            nonce: None,
            created_at,
            expires_at: created_at + Duration::minutes(10),
        }
    }

    #[test]
    fn test_generate_code_length() {
        let code = AuthorizationCode::generate_code();
        assert_eq!(code.len(), 43);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_code_unique() {
        assert_ne!(
            AuthorizationCode::generate_code(),
            AuthorizationCode::generate_code()
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let code = sample();
        assert!(!code.is_expired_at(code.created_at));
        assert!(!code.is_expired_at(code.expires_at - Duration::seconds(1)));
        assert!(code.is_expired_at(code.expires_at));
    }

    #[test]
    fn test_bindings() {
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier);
        let code = sample().with_code_challenge(&challenge).with_nonce("n-0S6");

        assert_eq!(code.code_challenge.as_deref(), Some(challenge.as_str()));
        assert_eq!(code.nonce.as_deref(), Some("n-0S6"));
    }
}
