//! Client secret generation and verification.
//!
//! # Security
//!
//! - Secrets are 256-bit random values (32 bytes) with a "tws_" prefix
//! - Hashing uses Argon2id with default parameters and a random salt
//! - Hashes are stored in PHC string format

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::AuthError;

/// Generate a new cryptographically secure client secret.
///
/// Format: `tws_{64 hex characters}`.
///
/// ```
/// use tokenwright_auth::oauth::client_secret::generate_client_secret;
///
/// let secret = generate_client_secret();
/// assert_eq!(secret.len(), 68);
/// assert!(secret.starts_with("tws_"));
/// ```
#[must_use]
pub fn generate_client_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    format!("tws_{}", hex::encode(bytes))
}

/// Hash a client secret for storage using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::Internal` if hashing fails (rare).
pub fn hash_client_secret(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("Failed to hash client secret: {e}")))
}

/// Verify a client secret against a stored Argon2 hash.
///
/// Returns `false` both for a mismatch and for an unparsable hash, so a
/// corrupted registration fails closed instead of erroring.
#[must_use]
pub fn verify_client_secret(secret: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored client secret hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_client_secret_format() {
        let secret = generate_client_secret();
        assert!(secret.starts_with("tws_"));
        assert!(secret[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_client_secret());
    }

    #[test]
    fn test_hash_and_verify() {
        let secret = generate_client_secret();
        let hash = hash_client_secret(&secret).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_client_secret(&secret, &hash));
        assert!(!verify_client_secret("wrong", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let h1 = hash_client_secret("same").unwrap();
        let h2 = hash_client_secret("same").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_invalid_hash_fails_closed() {
        assert!(!verify_client_secret("secret", "not-a-phc-string"));
    }
}
