//! Replay protection for `private_key_jwt` client assertions.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// Records assertion `jti` values until the assertion itself expires.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Records `jti`, returning `false` when it was already recorded.
    ///
    /// Check and insert are one atomic step: two concurrent submissions of
    /// the same assertion see exactly one `true`. `expires_at` is the
    /// assertion's `exp`; the entry may be dropped after it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool>;

    /// Whether `jti` is currently recorded.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    async fn is_used(&self, jti: &str) -> AuthResult<bool>;

    /// Drops entries past their `expires_at`, returning how many.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the backend fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
