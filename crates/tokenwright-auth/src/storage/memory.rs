//! In-memory storage backends.
//!
//! Built on `DashMap` for sharded concurrent access. Suitable for tests,
//! the CLI demo and single-node deployments that accept losing state on
//! restart. Every expiry decision reads the injected [`Clock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use super::{ClientStorage, JtiStorage, TokenStore};
use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::types::{AccessTokenFormat, AuthorizationCode, Client, GrantedToken, TokenKind};

// =============================================================================
// Clients
// =============================================================================

/// Client registry held in memory.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: DashMap<String, Client>,
}

impl InMemoryClientStorage {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from a list of clients, validating each.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for the first registration that fails
    /// validation.
    pub fn with_clients(clients: impl IntoIterator<Item = Client>) -> AuthResult<Self> {
        let storage = Self::new();
        for client in clients {
            storage.insert_validated(client)?;
        }
        Ok(storage)
    }

    fn insert_validated(&self, client: Client) -> AuthResult<()> {
        client.validate().map_err(|e| {
            AuthError::invalid_request(format!("client '{}': {e}", client.client_id))
        })?;
        self.clients.insert(client.client_id.clone(), client);
        Ok(())
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }

    async fn register(&self, client: Client) -> AuthResult<()> {
        self.insert_validated(client)
    }

    async fn remove(&self, client_id: &str) -> AuthResult<bool> {
        Ok(self.clients.remove(client_id).is_some())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        let mut clients: Vec<Client> = self.clients.iter().map(|c| c.value().clone()).collect();
        clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(clients)
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// Codes, token records and the revoked-JTI list held in memory.
pub struct InMemoryTokenStore {
    codes: DashMap<String, AuthorizationCode>,
    tokens: DashMap<String, GrantedToken>,
    revoked_jtis: DashMap<String, OffsetDateTime>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTokenStore {
    /// Creates an empty store reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            codes: DashMap::new(),
            tokens: DashMap::new(),
            revoked_jtis: DashMap::new(),
            clock,
        }
    }

    /// Number of stored codes and token records, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len() + self.tokens.len()
    }

    /// Returns `true` if no codes or token records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenStore")
            .field("codes", &self.codes.len())
            .field("tokens", &self.tokens.len())
            .field("revoked_jtis", &self.revoked_jtis.len())
            .finish()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put_code(&self, code: &AuthorizationCode) -> AuthResult<()> {
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage("authorization code already exists")),
            Entry::Vacant(slot) => {
                slot.insert(code.clone());
                Ok(())
            }
        }
    }

    async fn put_token(&self, token: &GrantedToken) -> AuthResult<()> {
        self.tokens.insert(token.handle.clone(), token.clone());
        Ok(())
    }

    async fn get_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        let now = self.clock.now();
        Ok(self
            .codes
            .get(code)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value().clone()))
    }

    async fn get_token(&self, handle: &str) -> AuthResult<Option<GrantedToken>> {
        let now = self.clock.now();
        Ok(self
            .tokens
            .get(handle)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value().clone()))
    }

    async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        // Removal holds the shard lock, so only one caller can get the entry.
        let now = self.clock.now();
        Ok(self
            .codes
            .remove(code)
            .map(|(_, entry)| entry)
            .filter(|entry| !entry.is_expired_at(now)))
    }

    async fn revoke(&self, handle: &str) -> AuthResult<bool> {
        let now = self.clock.now();
        match self.tokens.get_mut(handle) {
            Some(mut token) => {
                token.revoked_at.get_or_insert(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_jti(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<()> {
        self.revoked_jtis
            .entry(jti.to_string())
            .and_modify(|existing| *existing = (*existing).max(expires_at))
            .or_insert(expires_at);
        Ok(())
    }

    async fn is_jti_revoked(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.revoked_jtis.contains_key(jti))
    }

    async fn revoke_by_client(&self, client_id: &str) -> AuthResult<u64> {
        let now = self.clock.now();
        let mut revoked = 0;

        for mut token in self.tokens.iter_mut() {
            if token.client_id != client_id || token.is_revoked() {
                continue;
            }
            token.revoked_at = Some(now);
            if token.kind == TokenKind::Access && token.format == AccessTokenFormat::Jwt {
                self.revoked_jtis
                    .insert(token.jti.clone(), token.expires_at);
            }
            revoked += 1;
        }

        self.codes.retain(|_, code| code.client_id != client_id);

        tracing::info!(client_id = %client_id, revoked, "Revoked all tokens for client");
        Ok(revoked)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = self.clock.now();
        let deleted = AtomicU64::new(0);
        let keep = |expired: bool| {
            if expired {
                deleted.fetch_add(1, Ordering::Relaxed);
            }
            !expired
        };

        self.codes.retain(|_, code| keep(code.is_expired_at(now)));
        self.tokens.retain(|_, token| keep(token.is_expired_at(now)));
        self.revoked_jtis.retain(|_, expires_at| keep(now >= *expires_at));

        Ok(deleted.into_inner())
    }
}

// =============================================================================
// Assertion JTIs
// =============================================================================

/// Used client assertion JTIs held in memory.
pub struct InMemoryJtiStorage {
    used: DashMap<String, OffsetDateTime>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJtiStorage {
    /// Creates an empty JTI store reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            used: DashMap::new(),
            clock,
        }
    }
}

impl std::fmt::Debug for InMemoryJtiStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryJtiStorage")
            .field("used", &self.used.len())
            .finish()
    }
}

#[async_trait]
impl JtiStorage for InMemoryJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        match self.used.entry(jti.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.used.contains_key(jti))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = self.clock.now();
        let before = self.used.len();
        self.used.retain(|_, expires_at| now < *expires_at);
        Ok(before.saturating_sub(self.used.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use time::Duration;
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{GrantType, ScopeSet};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC)))
    }

    fn code(value: &str, clock: &ManualClock, ttl: Duration) -> AuthorizationCode {
        let now = clock.now();
        AuthorizationCode {
            code: value.to_string(),
            client_id: "c1".to_string(),
            subject: "alice".to_string(),
            scopes: ScopeSet::parse("openid"),
            redirect_uri: "https://app.example.com/cb".to_string(),
            code_challenge: None,
            nonce: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    fn token(value: &str, client_id: &str, kind: TokenKind, clock: &ManualClock) -> GrantedToken {
        let now = clock.now();
        GrantedToken {
            jti: uuid::Uuid::new_v4().to_string(),
            handle: GrantedToken::hash_token(value),
            kind,
            format: AccessTokenFormat::Opaque,
            client_id: client_id.to_string(),
            subject: Some("alice".to_string()),
            scopes: ScopeSet::parse("openid"),
            audience: Vec::new(),
            token_type: "Bearer".to_string(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
            revoked_at: None,
            extensions: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let clock = clock();
        let store = InMemoryTokenStore::new(clock.clone());
        store
            .put_code(&code("abc123", &clock, Duration::minutes(10)).with_nonce("n-0S6"))
            .await
            .unwrap();

        // The consumed grant carries the nonce for ID token issuance
        let first = store.consume("abc123").await.unwrap().unwrap();
        assert_eq!(first.subject, "alice");
        assert_eq!(first.nonce.as_deref(), Some("n-0S6"));

        clock.advance(Duration::seconds(1));
        assert!(store.consume("abc123").await.unwrap().is_none());
        assert!(store.get_code("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_code_rejects_duplicate() {
        let clock = clock();
        let store = InMemoryTokenStore::new(clock.clone());
        let c = code("dup", &clock, Duration::minutes(10));
        store.put_code(&c).await.unwrap();
        assert!(store.put_code(&c).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_has_one_winner() {
        let clock = clock();
        let store = Arc::new(InMemoryTokenStore::new(clock.clone()));
        store
            .put_code(&code("race", &clock, Duration::minutes(10)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.consume("race").await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let clock = clock();
        let store = InMemoryTokenStore::new(clock.clone());
        store
            .put_code(&code("short", &clock, Duration::seconds(60)))
            .await
            .unwrap();
        store
            .put_token(&token("rt", "c1", TokenKind::Refresh, &clock))
            .await
            .unwrap();

        clock.advance(Duration::seconds(60));
        assert!(store.get_code("short").await.unwrap().is_none());
        assert!(store.consume("short").await.unwrap().is_none());

        let handle = GrantedToken::hash_token("rt");
        assert!(store.get_token(&handle).await.unwrap().is_some());
        clock.advance(Duration::hours(1));
        assert!(store.get_token(&handle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_keeps_record() {
        let clock = clock();
        let store = InMemoryTokenStore::new(clock.clone());
        store
            .put_token(&token("rt", "c1", TokenKind::Refresh, &clock))
            .await
            .unwrap();
        let handle = GrantedToken::hash_token("rt");

        assert!(store.revoke(&handle).await.unwrap());
        let first_revocation = store.get_token(&handle).await.unwrap().unwrap().revoked_at;
        assert!(first_revocation.is_some());

        clock.advance(Duration::seconds(5));
        assert!(store.revoke(&handle).await.unwrap());
        let record = store.get_token(&handle).await.unwrap().unwrap();
        assert_eq!(record.revoked_at, first_revocation);

        assert!(!store.revoke("unknown").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_by_client() {
        let clock = clock();
        let store = InMemoryTokenStore::new(clock.clone());
        let mut jwt = token("jwt", "c1", TokenKind::Access, &clock);
        jwt.format = AccessTokenFormat::Jwt;
        store.put_token(&jwt).await.unwrap();
        store
            .put_token(&token("rt1", "c1", TokenKind::Refresh, &clock))
            .await
            .unwrap();
        store
            .put_token(&token("rt2", "c2", TokenKind::Refresh, &clock))
            .await
            .unwrap();
        store
            .put_code(&code("pending", &clock, Duration::minutes(10)))
            .await
            .unwrap();

        assert_eq!(store.revoke_by_client("c1").await.unwrap(), 2);
        assert!(store.is_jti_revoked(&jwt.jti).await.unwrap());
        assert!(store.get_code("pending").await.unwrap().is_none());

        let other = store
            .get_token(&GrantedToken::hash_token("rt2"))
            .await
            .unwrap()
            .unwrap();
        assert!(!other.is_revoked());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let clock = clock();
        let store = InMemoryTokenStore::new(clock.clone());
        store
            .put_code(&code("old", &clock, Duration::minutes(1)))
            .await
            .unwrap();
        store
            .put_token(&token("rt", "c1", TokenKind::Refresh, &clock))
            .await
            .unwrap();
        store
            .revoke_jti("jti-1", clock.now() + Duration::minutes(1))
            .await
            .unwrap();

        clock.advance(Duration::minutes(2));
        assert_eq!(store.cleanup_expired().await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert!(!store.is_jti_revoked("jti-1").await.unwrap());
    }

    #[test]
    fn test_jti_mark_used() {
        let clock = clock();
        let storage = InMemoryJtiStorage::new(clock.clone());
        let exp = clock.now() + Duration::minutes(5);

        tokio_test::block_on(async {
            assert!(tokio_test::assert_ok!(storage.mark_used("jti-1", exp).await));
            assert!(!tokio_test::assert_ok!(storage.mark_used("jti-1", exp).await));
            assert!(storage.is_used("jti-1").await.unwrap());

            clock.advance(Duration::minutes(5));
            assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
            assert!(!storage.is_used("jti-1").await.unwrap());
        });
    }

    #[tokio::test]
    async fn test_client_storage_validates() {
        let storage = InMemoryClientStorage::new();
        let invalid = Client::new("spa", "SPA").with_grant_types([GrantType::ClientCredentials]);
        let err = storage.register(invalid).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        let valid = Client::new("spa", "SPA")
            .with_grant_types([GrantType::AuthorizationCode])
            .with_redirect_uris(["https://spa.example.com/cb"]);
        storage.register(valid).await.unwrap();
        assert!(storage.find_by_client_id("spa").await.unwrap().is_some());
        assert_eq!(storage.list().await.unwrap().len(), 1);
        assert!(storage.remove("spa").await.unwrap());
        assert!(storage.find_by_client_id("spa").await.unwrap().is_none());
    }
}
