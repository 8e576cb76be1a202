//! Signing keys, JWK export and key rotation.
//!
//! ## Supported Algorithms
//!
//! - **RS256**: RSA with SHA-256 (widely compatible)
//! - **RS384**: RSA with SHA-384
//! - **ES384**: ECDSA with the P-384 curve (smaller keys, fast to generate)
//!
//! ## Rotation
//!
//! A [`KeyRing`] holds one active signing key and any number of retiring
//! keys. Rotation promotes a new key and keeps the previous one for
//! verification until its overlap window closes, so a token signed just
//! before rotation stays verifiable for as long as it can be valid.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p384::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::jwt::JwtError;
use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;

const RSA_KEY_BITS: usize = 2048;

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms for issued tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 and SHA-384.
    #[default]
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` algorithm.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the `alg` header value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` for the RSA algorithms.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "ES384" => Ok(Self::ES384),
            other => Err(JwtError::invalid_key(format!(
                "unsupported signing algorithm: {other}"
            ))),
        }
    }
}

// ============================================================================
// JWK
// ============================================================================

/// JSON Web Key Set as published at a `jwks_uri`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// Public JSON Web Key for a signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key ID.
    pub kid: String,

    /// Key use, always `sig`.
    #[serde(rename = "use")]
    pub key_use: String,

    /// Algorithm the key is used with.
    pub alg: String,

    /// Key type specific parameters.
    #[serde(flatten)]
    pub params: JwkParams,
}

/// Key material of a [`Jwk`], tagged by `kty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum JwkParams {
    /// RSA public key.
    #[serde(rename = "RSA")]
    Rsa {
        /// Modulus, base64url.
        n: String,
        /// Public exponent, base64url.
        e: String,
    },
    /// Elliptic curve public key.
    #[serde(rename = "EC")]
    Ec {
        /// Curve name.
        crv: String,
        /// X coordinate, base64url.
        x: String,
        /// Y coordinate, base64url.
        y: String,
    },
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// A private signing key with its derived verification key.
pub struct SigningKeyPair {
    /// Key ID, placed in the `kid` header of every token it signs.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    params: JwkParams,
    private_pem: String,
}

impl SigningKeyPair {
    /// Generates a key for `algorithm` with a random key ID.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        let kid = uuid::Uuid::new_v4().to_string();
        if algorithm.is_rsa() {
            let key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
                .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
            Self::from_rsa(kid, algorithm, &key)
        } else {
            Self::from_ec(kid, &p384::SecretKey::random(&mut OsRng))
        }
    }

    /// Loads a private key from PEM.
    ///
    /// RSA keys may be PKCS#1 or PKCS#8; EC keys may be SEC1 or PKCS#8.
    /// The public half is derived from the private key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the PEM does not hold a key for `algorithm`.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
    ) -> Result<Self, JwtError> {
        let kid = kid.into();
        if algorithm.is_rsa() {
            use rsa::pkcs1::DecodeRsaPrivateKey;
            use rsa::pkcs8::DecodePrivateKey;

            let key = RsaPrivateKey::from_pkcs8_pem(private_pem)
                .ok()
                .or_else(|| RsaPrivateKey::from_pkcs1_pem(private_pem).ok())
                .ok_or_else(|| JwtError::invalid_key("not a PKCS#1 or PKCS#8 RSA private key"))?;
            Self::from_rsa(kid, algorithm, &key)
        } else {
            use p384::pkcs8::DecodePrivateKey;

            let key = p384::SecretKey::from_pkcs8_pem(private_pem)
                .ok()
                .or_else(|| p384::SecretKey::from_sec1_pem(private_pem).ok())
                .ok_or_else(|| JwtError::invalid_key("not a SEC1 or PKCS#8 P-384 private key"))?;
            Self::from_ec(kid, &key)
        }
    }

    fn from_rsa(
        kid: String,
        algorithm: SigningAlgorithm,
        key: &RsaPrivateKey,
    ) -> Result<Self, JwtError> {
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};

        let private_pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?
            .to_string();
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())?;

        let public = key.to_public_key();
        let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)?;

        Ok(Self {
            kid,
            algorithm,
            encoding_key,
            decoding_key,
            params: JwkParams::Rsa { n, e },
            private_pem,
        })
    }

    fn from_ec(kid: String, key: &p384::SecretKey) -> Result<Self, JwtError> {
        use p384::pkcs8::{EncodePrivateKey, LineEnding};

        // jsonwebtoken only accepts PKCS#8 for EC keys
        let private_pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?
            .to_string();
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())?;

        let point = key.public_key().to_encoded_point(false);
        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            return Err(JwtError::invalid_key("EC public key is the identity point"));
        };
        let x = URL_SAFE_NO_PAD.encode(x);
        let y = URL_SAFE_NO_PAD.encode(y);
        let decoding_key = DecodingKey::from_ec_components(&x, &y)?;

        Ok(Self {
            kid,
            algorithm: SigningAlgorithm::ES384,
            encoding_key,
            decoding_key,
            params: JwkParams::Ec {
                crv: "P-384".to_string(),
                x,
                y,
            },
            private_pem,
        })
    }

    /// Replaces the key ID.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = kid.into();
        self
    }

    /// Key used to sign.
    #[must_use]
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Key used to verify.
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// The private key as PKCS#8 PEM.
    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_pem
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kid: self.kid.clone(),
            key_use: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Key Provider
// ============================================================================

/// Source of signing and verification keys.
///
/// Implementations may be backed by files, a KMS or an HSM. The token core
/// only needs the current signing key and lookup of verification keys by
/// `kid`.
pub trait KeyProvider: Send + Sync {
    /// Returns the key new tokens are signed with.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if no key is available.
    fn current_signing_key(&self) -> AuthResult<Arc<SigningKeyPair>>;

    /// Returns every key a presented token may currently be verified with.
    fn verification_keys(&self) -> Vec<Arc<SigningKeyPair>>;

    /// Finds a verification key by key ID.
    fn find_verification_key(&self, kid: &str) -> Option<Arc<SigningKeyPair>> {
        self.verification_keys().into_iter().find(|k| k.kid == kid)
    }

    /// Public keys for publication.
    fn jwks(&self) -> Jwks {
        Jwks {
            keys: self.verification_keys().iter().map(|k| k.to_jwk()).collect(),
        }
    }
}

#[derive(Clone)]
struct RetiringKey {
    key: Arc<SigningKeyPair>,
    verify_until: OffsetDateTime,
}

#[derive(Clone)]
struct KeyRingState {
    active: Arc<SigningKeyPair>,
    retiring: Vec<RetiringKey>,
}

/// Rotating in-memory key set.
///
/// Readers never block: the state is swapped atomically on rotation.
pub struct KeyRing {
    state: ArcSwap<KeyRingState>,
    clock: Arc<dyn Clock>,
}

impl KeyRing {
    /// Creates a ring whose only key is `active`.
    #[must_use]
    pub fn new(active: SigningKeyPair, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: ArcSwap::from_pointee(KeyRingState {
                active: Arc::new(active),
                retiring: Vec::new(),
            }),
            clock,
        }
    }

    /// Generates a fresh key and creates a ring around it.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if key generation fails.
    pub fn generate(algorithm: SigningAlgorithm, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let key = SigningKeyPair::generate(algorithm)?;
        Ok(Self::new(key, clock))
    }

    /// Promotes `new_key` to the signing key.
    ///
    /// The previous signing key keeps verifying until `now + overlap`. Pass
    /// an overlap at least as long as the longest access token lifetime.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `now + overlap` is out of range; the ring
    /// is left unchanged.
    pub fn rotate(&self, new_key: SigningKeyPair, overlap: Duration) -> AuthResult<()> {
        let verify_until = self.clock.now().checked_add(overlap).ok_or_else(|| {
            AuthError::configuration(format!("key overlap of {overlap} is out of range"))
        })?;
        let new_key = Arc::new(new_key);
        let new_kid = new_key.kid.clone();

        let previous = self.state.rcu(|current| {
            let mut retiring = current.retiring.clone();
            retiring.push(RetiringKey {
                key: current.active.clone(),
                verify_until,
            });
            KeyRingState {
                active: new_key.clone(),
                retiring,
            }
        });

        tracing::info!(
            new_kid = %new_kid,
            retired_kid = %previous.active.kid,
            verify_until = %verify_until,
            "Rotated signing key"
        );
        Ok(())
    }

    /// Drops retiring keys whose overlap window has closed.
    ///
    /// Returns the number of keys dropped.
    pub fn retire_expired(&self) -> usize {
        let now = self.clock.now();
        let previous = self.state.rcu(|current| KeyRingState {
            active: current.active.clone(),
            retiring: current
                .retiring
                .iter()
                .filter(|r| now < r.verify_until)
                .cloned()
                .collect(),
        });

        let dropped = previous
            .retiring
            .iter()
            .filter(|r| now >= r.verify_until)
            .count();
        if dropped > 0 {
            tracing::info!(dropped, "Retired expired signing keys");
        }
        dropped
    }

    /// Key ID of the current signing key.
    #[must_use]
    pub fn current_kid(&self) -> String {
        self.state.load().active.kid.clone()
    }
}

impl KeyProvider for KeyRing {
    fn current_signing_key(&self) -> AuthResult<Arc<SigningKeyPair>> {
        Ok(self.state.load().active.clone())
    }

    fn verification_keys(&self) -> Vec<Arc<SigningKeyPair>> {
        let now = self.clock.now();
        let state = self.state.load();
        std::iter::once(state.active.clone())
            .chain(
                state
                    .retiring
                    .iter()
                    .filter(|r| now < r.verify_until)
                    .map(|r| r.key.clone()),
            )
            .collect()
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.load();
        f.debug_struct("KeyRing")
            .field("active", &state.active.kid)
            .field(
                "retiring",
                &state.retiring.iter().map(|r| &r.key.kid).collect::<Vec<_>>(),
            )
            .finish()
    }
}
