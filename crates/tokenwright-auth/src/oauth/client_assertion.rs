//! JWT client assertions (RFC 7523 section 3).
//!
//! A `private_key_jwt` client proves possession of a key registered in its
//! JWK set by signing a short-lived assertion:
//!
//! - `iss` and `sub`: both equal to the client_id
//! - `aud`: contains the token endpoint URL
//! - `exp`: in the future, no further out than the configured maximum
//! - `jti`: never seen before
//!
//! Errors from this module carry detailed messages for logs. The
//! authenticator replaces them with a uniform error before they leave the
//! crate.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::storage::JtiStorage;

/// Claims of a client assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    /// Issuer, the client_id.
    pub iss: String,

    /// Subject, the client_id.
    pub sub: String,

    /// Audience, a string or an array of strings.
    pub aud: StringOrArray,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// Single-use identifier.
    pub jti: String,

    /// Issued at as Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// A JSON value that may be a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// Single string.
    String(String),
    /// Array of strings.
    Array(Vec<String>),
}

impl StringOrArray {
    /// Checks if the value is or contains `value`.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::Array(arr) => arr.iter().any(|s| s == value),
        }
    }
}

/// Configuration for client assertion validation.
#[derive(Debug, Clone)]
pub struct ClientAssertionConfig {
    /// Token endpoint URL the assertion must be addressed to.
    pub token_endpoint: String,

    /// Longest accepted distance between now and `exp`, in seconds.
    pub max_lifetime_seconds: i64,
}

impl ClientAssertionConfig {
    /// Creates a configuration with a five minute maximum lifetime.
    #[must_use]
    pub fn new(token_endpoint: impl Into<String>) -> Self {
        Self {
            token_endpoint: token_endpoint.into(),
            max_lifetime_seconds: 300,
        }
    }

    /// Sets the maximum assertion lifetime.
    #[must_use]
    pub fn with_max_lifetime(mut self, seconds: i64) -> Self {
        self.max_lifetime_seconds = seconds;
        self
    }
}

/// Header and issuer of an assertion, read before its signature is checked
/// so the right client and key can be looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedAssertion {
    /// `iss` (falling back to `sub`).
    pub client_id: String,
    /// `kid` header, if any.
    pub kid: Option<String>,
    /// `alg` header.
    pub algorithm: Algorithm,
}

impl UnverifiedAssertion {
    /// Reads the header and issuer without verifying anything.
    ///
    /// Only asymmetric algorithms are accepted; an HMAC assertion cannot be
    /// checked against a public JWK set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the assertion is not a well-formed JWS.
    pub fn peek(assertion: &str) -> AuthResult<Self> {
        #[derive(Deserialize)]
        struct IssuerOnly {
            #[serde(default)]
            iss: Option<String>,
            #[serde(default)]
            sub: Option<String>,
        }

        let header = jsonwebtoken::decode_header(assertion)
            .map_err(|e| AuthError::invalid_client(format!("malformed assertion header: {e}")))?;

        if !is_asymmetric(header.alg) {
            return Err(AuthError::invalid_client(format!(
                "assertion algorithm {:?} is not allowed",
                header.alg
            )));
        }

        let payload = assertion
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::invalid_client("assertion has no payload"))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::invalid_client("assertion payload is not base64url"))?;
        let claims: IssuerOnly = serde_json::from_slice(&bytes)
            .map_err(|_| AuthError::invalid_client("assertion payload is not JSON"))?;

        let client_id = claims
            .iss
            .or(claims.sub)
            .ok_or_else(|| AuthError::invalid_client("assertion has neither iss nor sub"))?;

        Ok(Self {
            client_id,
            kid: header.kid,
            algorithm: header.alg,
        })
    }
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}

/// Validates client assertions and records their JTIs.
pub struct ClientAssertionValidator {
    config: ClientAssertionConfig,
    jti_storage: Arc<dyn JtiStorage>,
    clock: Arc<dyn Clock>,
}

impl ClientAssertionValidator {
    /// Creates a new validator.
    #[must_use]
    pub fn new(
        config: ClientAssertionConfig,
        jti_storage: Arc<dyn JtiStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            jti_storage,
            clock,
        }
    }

    /// Verifies `assertion` for `expected_client_id` and consumes its JTI.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if:
    /// - the signature does not verify with `decoding_key`
    /// - `iss` or `sub` differ from the client_id
    /// - `aud` does not contain the token endpoint
    /// - `exp` has passed or lies beyond the maximum lifetime
    /// - the JTI was already used
    ///
    /// Returns `Storage` if the JTI store fails.
    pub async fn validate(
        &self,
        assertion: &str,
        expected_client_id: &str,
        decoding_key: &DecodingKey,
        algorithm: Algorithm,
    ) -> AuthResult<ClientAssertionClaims> {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[&self.config.token_endpoint]);
        validation.set_issuer(&[expected_client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;

        let claims =
            jsonwebtoken::decode::<ClientAssertionClaims>(assertion, decoding_key, &validation)
                .map_err(|e| AuthError::invalid_client(format!("assertion rejected: {e}")))?
                .claims;

        if claims.sub != expected_client_id {
            return Err(AuthError::invalid_client(
                "assertion sub must equal client_id",
            ));
        }
        if !claims.aud.contains(&self.config.token_endpoint) {
            return Err(AuthError::invalid_client(
                "assertion aud must contain the token endpoint",
            ));
        }

        let now = self.clock.unix_timestamp();
        if now >= claims.exp {
            return Err(AuthError::invalid_client("assertion expired"));
        }
        if claims.exp - now > self.config.max_lifetime_seconds {
            return Err(AuthError::invalid_client(format!(
                "assertion exp must be within {} seconds",
                self.config.max_lifetime_seconds
            )));
        }

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|_| AuthError::invalid_client("assertion exp out of range"))?;
        if !self.jti_storage.mark_used(&claims.jti, expires_at).await? {
            return Err(AuthError::invalid_client("assertion jti already used"));
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for ClientAssertionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientAssertionValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header};
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::InMemoryJtiStorage;
    use crate::token::keys::{SigningAlgorithm, SigningKeyPair};

    const ENDPOINT: &str = "https://auth.example.com/token";

    struct Fixture {
        clock: Arc<ManualClock>,
        key: SigningKeyPair,
        validator: ClientAssertionValidator,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC)));
        let jtis = Arc::new(InMemoryJtiStorage::new(clock.clone()));
        Fixture {
            validator: ClientAssertionValidator::new(
                ClientAssertionConfig::new(ENDPOINT),
                jtis,
                clock.clone(),
            ),
            key: SigningKeyPair::generate(SigningAlgorithm::ES384)
                .unwrap()
                .with_kid("client-key"),
            clock,
        }
    }

    fn sign(key: &EncodingKey, kid: &str, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::ES384);
        header.kid = Some(kid.to_string());
        jsonwebtoken::encode(&header, claims, key).unwrap()
    }

    fn claims(f: &Fixture, jti: &str) -> serde_json::Value {
        serde_json::json!({
            "iss": "backend",
            "sub": "backend",
            "aud": ENDPOINT,
            "exp": f.clock.unix_timestamp() + 120,
            "jti": jti,
        })
    }

    async fn validate(f: &Fixture, assertion: &str) -> AuthResult<ClientAssertionClaims> {
        f.validator
            .validate(assertion, "backend", f.key.decoding_key(), Algorithm::ES384)
            .await
    }

    #[tokio::test]
    async fn test_valid_assertion_accepted_once() {
        let f = fixture();
        let assertion = sign(f.key.encoding_key(), "client-key", &claims(&f, "j1"));

        let claims = validate(&f, &assertion).await.unwrap();
        assert_eq!(claims.iss, "backend");

        let replay = validate(&f, &assertion).await.unwrap_err();
        assert!(replay.to_string().contains("already used"));
    }

    #[tokio::test]
    async fn test_expiry_uses_injected_clock() {
        let f = fixture();
        let assertion = sign(f.key.encoding_key(), "client-key", &claims(&f, "j2"));

        f.clock.advance(time::Duration::seconds(120));
        let err = validate(&f, &assertion).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_lifetime_too_long_rejected() {
        let f = fixture();
        let mut c = claims(&f, "j3");
        c["exp"] = serde_json::json!(f.clock.unix_timestamp() + 3600);
        let assertion = sign(f.key.encoding_key(), "client-key", &c);

        let err = validate(&f, &assertion).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_wrong_audience_and_subject_rejected() {
        let f = fixture();

        let mut c = claims(&f, "j4");
        c["aud"] = serde_json::json!(["https://other.example.com/token"]);
        let assertion = sign(f.key.encoding_key(), "client-key", &c);
        assert!(validate(&f, &assertion).await.is_err());

        let mut c = claims(&f, "j5");
        c["sub"] = serde_json::json!("someone-else");
        let assertion = sign(f.key.encoding_key(), "client-key", &c);
        assert!(validate(&f, &assertion).await.is_err());
    }

    #[tokio::test]
    async fn test_signature_from_other_key_rejected() {
        let f = fixture();
        let other = SigningKeyPair::generate(SigningAlgorithm::ES384).unwrap();
        let assertion = sign(other.encoding_key(), "client-key", &claims(&f, "j6"));
        assert!(validate(&f, &assertion).await.is_err());
    }

    #[test]
    fn test_peek_reads_header_and_issuer() {
        let f = fixture();
        let assertion = sign(f.key.encoding_key(), "client-key", &claims(&f, "j7"));

        let peeked = UnverifiedAssertion::peek(&assertion).unwrap();
        assert_eq!(peeked.client_id, "backend");
        assert_eq!(peeked.kid.as_deref(), Some("client-key"));
        assert_eq!(peeked.algorithm, Algorithm::ES384);
    }

    #[test]
    fn test_peek_rejects_hmac_and_garbage() {
        let hs = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({"iss": "backend"}),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();
        assert!(UnverifiedAssertion::peek(&hs).is_err());
        assert!(UnverifiedAssertion::peek("not-a-jwt").is_err());
    }

    #[test]
    fn test_string_or_array_contains() {
        let aud = StringOrArray::String(ENDPOINT.to_string());
        assert!(aud.contains(ENDPOINT));
        assert!(!aud.contains("https://other.example.com"));

        let aud: StringOrArray =
            serde_json::from_str(r#"["https://a.example.com", "https://b.example.com"]"#).unwrap();
        assert!(aud.contains("https://b.example.com"));
    }
}
