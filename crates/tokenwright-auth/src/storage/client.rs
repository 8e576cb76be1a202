//! Client storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage operations for OAuth 2.0 client registrations.
///
/// # Example
///
/// ```ignore
/// use tokenwright_auth::storage::ClientStorage;
///
/// async fn example(storage: &dyn ClientStorage) -> tokenwright_auth::AuthResult<()> {
///     if let Some(client) = storage.find_by_client_id("my-app").await? {
///         println!("Found client: {}", client.name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// Inactive clients are returned; callers decide what inactive means.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Registers a client, replacing any registration with the same id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the registration does not validate, or an
    /// error if the storage operation fails.
    async fn register(&self, client: Client) -> AuthResult<()>;

    /// Removes a registration. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn remove(&self, client_id: &str) -> AuthResult<bool>;

    /// Lists all registrations ordered by client_id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Client>>;
}
