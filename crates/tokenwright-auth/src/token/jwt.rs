//! Self-contained access tokens.
//!
//! Access tokens for clients registered with the `jwt` format are JWS
//! tokens following the RFC 9068 profile. Every token carries the `kid` of
//! the key that signed it, and verification looks the key up through the
//! [`KeyProvider`] so tokens signed before a rotation remain verifiable.
//!
//! Expiry is deliberately not checked here: callers compare `exp` against
//! their injected [`Clock`](crate::clock::Clock).

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonwebtoken::{Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::keys::KeyProvider;
use crate::error::AuthError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// The token header carries no `kid`.
    #[error("Token header has no key ID")]
    MissingKeyId,

    /// No verification key with this ID.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found.
        kid: String,
    },

    /// Failed to generate a key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if the presented token is at fault rather than the
    /// server's keys.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::DecodingError { .. }
                | Self::InvalidSignature
                | Self::InvalidClaims { .. }
                | Self::MissingKeyId
                | Self::KeyNotFound { .. }
        )
    }

    /// Returns `true` if this is a key material error.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            Self::KeyGenerationError { .. } | Self::InvalidKey { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        if err.is_validation_error() {
            AuthError::invalid_grant(err.to_string())
        } else {
            AuthError::signing(err.to_string())
        }
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims of a signed access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Resource owner; absent for client credentials tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Audience.
    #[serde(default)]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// JWT ID, used for revocation.
    pub jti: String,

    /// Space-separated scopes.
    #[serde(default)]
    pub scope: String,

    /// OAuth client ID.
    pub client_id: String,

    /// Additional claims.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AccessTokenClaims {
    /// Creates a new builder for access token claims.
    #[must_use]
    pub fn builder(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        issued_at: i64,
    ) -> AccessTokenClaimsBuilder {
        AccessTokenClaimsBuilder {
            claims: AccessTokenClaims {
                iss: issuer.into(),
                sub: None,
                aud: Vec::new(),
                exp: issued_at,
                iat: issued_at,
                jti: uuid::Uuid::new_v4().to_string(),
                scope: String::new(),
                client_id: client_id.into(),
                extra: BTreeMap::new(),
            },
        }
    }
}

/// Builder for `AccessTokenClaims`.
#[derive(Debug)]
pub struct AccessTokenClaimsBuilder {
    claims: AccessTokenClaims,
}

impl AccessTokenClaimsBuilder {
    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, sub: Option<String>) -> Self {
        self.claims.sub = sub;
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn audience(mut self, aud: Vec<String>) -> Self {
        self.claims.aud = aud;
        self
    }

    /// Sets the expiration time in seconds after `iat`.
    #[must_use]
    pub fn expires_in_seconds(mut self, seconds: i64) -> Self {
        self.claims.exp = self.claims.iat.saturating_add(seconds);
        self
    }

    /// Sets the token ID.
    #[must_use]
    pub fn jti(mut self, jti: impl Into<String>) -> Self {
        self.claims.jti = jti.into();
        self
    }

    /// Sets the scopes.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.claims.scope = scope.into();
        self
    }

    /// Adds extension claims. Registered claim names are ignored.
    #[must_use]
    pub fn extra(mut self, extra: &BTreeMap<String, Value>) -> Self {
        const REGISTERED: [&str; 9] = [
            "iss", "sub", "aud", "exp", "iat", "nbf", "jti", "scope", "client_id",
        ];
        for (name, value) in extra {
            if !REGISTERED.contains(&name.as_str()) {
                self.claims.extra.insert(name.clone(), value.clone());
            }
        }
        self
    }

    /// Builds the access token claims.
    #[must_use]
    pub fn build(self) -> AccessTokenClaims {
        self.claims
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Signs and verifies access tokens with keys from a [`KeyProvider`].
pub struct JwtService {
    keys: Arc<dyn KeyProvider>,
    issuer: String,
}

impl JwtService {
    /// Creates a new JWT service.
    #[must_use]
    pub fn new(keys: Arc<dyn KeyProvider>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    /// Signs `claims` with the current signing key.
    ///
    /// Returns the token and the `kid` it was signed with.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if no key is available or encoding fails.
    pub fn encode(&self, claims: &AccessTokenClaims) -> Result<(String, String), AuthError> {
        let key = self.keys.current_signing_key()?;
        let mut header = Header::new(key.algorithm.to_jwt_algorithm());
        header.kid = Some(key.kid.clone());
        header.typ = Some("at+jwt".to_string());

        let token = encode(&header, claims, key.encoding_key())
            .map_err(|e| JwtError::encoding_error(e.to_string()))?;
        Ok((token, key.kid.clone()))
    }

    /// Verifies the signature and issuer of a token.
    ///
    /// `exp` must be present but is not compared with the current time.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the token is malformed, names an
    /// unknown or retired key, has a bad signature or the wrong issuer.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or(JwtError::MissingKeyId)?;
        let key = self
            .keys
            .find_verification_key(&kid)
            .ok_or_else(|| JwtError::key_not_found(&kid))?;

        let mut validation = Validation::new(key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<AccessTokenClaims>(token, key.decoding_key(), &validation)?;
        Ok(data.claims)
    }

    /// Returns `true` if `token` is shaped like a JWS (three dot-separated
    /// segments).
    #[must_use]
    pub fn looks_like_jwt(token: &str) -> bool {
        token.split('.').count() == 3
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the key provider.
    #[must_use]
    pub fn keys(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::token::keys::{KeyRing, SigningAlgorithm, SigningKeyPair};

    const ISSUER: &str = "https://auth.example.com";

    fn make_service() -> (JwtService, Arc<KeyRing>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC)));
        let ring = Arc::new(KeyRing::generate(SigningAlgorithm::ES384, clock).unwrap());
        (JwtService::new(ring.clone(), ISSUER), ring)
    }

    fn claims() -> AccessTokenClaims {
        AccessTokenClaims::builder(ISSUER, "client456", 1_700_000_000)
            .subject(Some("user123".to_string()))
            .audience(vec!["https://api.example.com".to_string()])
            .scope("openid profile")
            .expires_in_seconds(3600)
            .build()
    }

    #[test]
    fn test_encode_verify() {
        let (service, ring) = make_service();
        let claims = claims();
        let (token, kid) = service.encode(&claims).unwrap();
        assert_eq!(kid, ring.current_kid());

        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(kid.as_str()));
        assert_eq!(header.typ.as_deref(), Some("at+jwt"));

        assert_eq!(service.verify(&token).unwrap(), claims);
    }

    #[test]
    fn test_expired_token_still_verifies_signature() {
        let (service, _) = make_service();
        let old = AccessTokenClaims::builder(ISSUER, "client456", 1_000)
            .expires_in_seconds(60)
            .build();
        let (token, _) = service.encode(&old).unwrap();
        assert_eq!(service.verify(&token).unwrap().exp, 1_060);
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let (service, ring) = make_service();
        let other = JwtService::new(ring, "https://evil.example.com");
        let (token, _) = other.encode(&claims()).unwrap();

        let err = service.verify(&token).unwrap_err();
        assert!(matches!(err, JwtError::InvalidClaims { .. }));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let (service, _) = make_service();
        let (other, _) = make_service();
        let (token, _) = other.encode(&claims()).unwrap();

        let err = service.verify(&token).unwrap_err();
        assert!(matches!(err, JwtError::KeyNotFound { .. }));
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let (service, ring) = make_service();
        let (token, _) = service.encode(&claims()).unwrap();

        // Same kid, different key material
        let imposter = SigningKeyPair::generate(SigningAlgorithm::ES384)
            .unwrap()
            .with_kid(ring.current_kid());
        let forger = JwtService::new(
            Arc::new(KeyRing::new(
                imposter,
                Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC))),
            )),
            ISSUER,
        );
        let (forged, _) = forger.encode(&claims()).unwrap();

        assert!(service.verify(&token).is_ok());
        assert!(matches!(
            service.verify(&forged).unwrap_err(),
            JwtError::InvalidSignature
        ));
    }

    #[test]
    fn test_extra_claims_cannot_override_registered() {
        let mut extra = BTreeMap::new();
        extra.insert("tenant".to_string(), Value::from("acme"));
        extra.insert("sub".to_string(), Value::from("mallory"));

        let claims = AccessTokenClaims::builder(ISSUER, "c1", 0)
            .subject(Some("alice".to_string()))
            .extra(&extra)
            .build();

        assert_eq!(claims.sub.as_deref(), Some("alice"));
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["tenant"], "acme");
        assert_eq!(json["sub"], "alice");
    }

    #[test]
    fn test_jwt_error_conversion() {
        let err: AuthError = JwtError::InvalidSignature.into();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));

        let err: AuthError = JwtError::invalid_key("bad").into();
        assert!(matches!(err, AuthError::Signing { .. }));
    }

    #[test]
    fn test_looks_like_jwt() {
        assert!(JwtService::looks_like_jwt("a.b.c"));
        assert!(!JwtService::looks_like_jwt("opaque-token-value"));
    }
}
