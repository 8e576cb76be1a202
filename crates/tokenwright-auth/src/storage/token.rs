//! Token store trait.
//!
//! The store owns the lifecycle of authorization codes and of every token
//! record it is given. Signed access tokens are self-contained, so for them
//! the store only keeps the revoked-JTI list.
//!
//! # Security Considerations
//!
//! - Token records are keyed by the SHA-256 hash of the value, never the value
//! - Authorization codes are deleted on consumption
//! - Entries past their expiry must read as absent even before cleanup

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::{AuthorizationCode, GrantedToken};

/// Storage trait for authorization codes and granted tokens.
///
/// # Expiry
///
/// `get_code`, `get_token` and `consume` treat entries whose expiry has
/// passed as absent. Physical deletion happens in [`cleanup_expired`],
/// which a deployment may run periodically with
/// [`spawn_cleanup_task`](crate::storage::spawn_cleanup_task).
///
/// [`cleanup_expired`]: TokenStore::cleanup_expired
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Stores a new authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if a code with the same value already exists or the
    /// storage operation fails.
    async fn put_code(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Stores a token record keyed by its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn put_token(&self, token: &GrantedToken) -> AuthResult<()>;

    /// Looks up an authorization code without consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Looks up a token record by handle (SHA-256 hex of the value).
    ///
    /// Revoked records are returned so callers can distinguish reuse of a
    /// rotated refresh token; expired records are not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_token(&self, handle: &str) -> AuthResult<Option<GrantedToken>>;

    /// Atomically removes and returns an authorization code.
    ///
    /// Among concurrent callers presenting the same code exactly one
    /// receives `Some`. An expired code is removed and reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    ///
    /// # Atomicity
    ///
    /// A SQL backend would use a single statement:
    ///
    /// ```sql
    /// DELETE FROM authorization_codes
    /// WHERE code = $1
    /// RETURNING *
    /// ```
    async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Marks a token record revoked. Returns `false` if no such record
    /// exists.
    ///
    /// Revoking an already-revoked record succeeds and keeps the original
    /// revocation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, handle: &str) -> AuthResult<bool>;

    /// Adds a signed token's JTI to the revoked list until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_jti(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<()>;

    /// Checks whether a signed token's JTI has been revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_jti_revoked(&self, jti: &str) -> AuthResult<bool>;

    /// Revokes every token record and deletes every pending code of a client.
    ///
    /// Used when a client is compromised or deleted. Returns the number of
    /// token records revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    async fn revoke_by_client(&self, client_id: &str) -> AuthResult<u64>;

    /// Deletes expired codes, token records and revoked-JTI entries.
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
