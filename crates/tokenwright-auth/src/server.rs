//! Explicit wiring of the token core.
//!
//! [`AuthorizationServer`] owns one instance of every component and passes
//! the shared collaborators (clock, stores, keys) to each at construction.
//! Nothing is global: two servers in one process share nothing unless the
//! caller hands them the same collaborators.
//!
//! # Example
//!
//! ```ignore
//! use tokenwright_auth::prelude::*;
//!
//! let server = AuthorizationServer::builder(AuthConfig::load("auth.toml")?)
//!     .with_clients(Arc::new(InMemoryClientStorage::with_clients(clients)?))
//!     .build()?;
//!
//! let credentials = ClientCredentials::from_request(header, &request, None)?;
//! let response = server.token(&credentials, &request).await?;
//! ```

use std::sync::Arc;
use std::time::Duration as StdDuration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::AuthResult;
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, whole_seconds};
use crate::error::AuthError;
use crate::oauth::{
    AuthenticatedClient, ClientAssertionConfig, ClientAuthenticator, ClientCredentials,
    PkceChallenge, TokenRequest, TokenResponse,
};
use crate::storage::{
    ClientStorage, InMemoryClientStorage, InMemoryJtiStorage, InMemoryTokenStore, JtiStorage,
    TokenStore, spawn_cleanup_task,
};
use crate::token::{
    IntrospectionEngine, IntrospectionRequest, IntrospectionResponse, Jwks, JwtService,
    KeyProvider, KeyRing, RevocationRequest, SigningKeyPair, TokenFactory, TokenPolicy,
    TokenService,
};
use crate::types::{AuthorizationCode, ScopeSet};

/// Builder for [`AuthorizationServer`].
///
/// Collaborators left unset default to the wall clock, in-memory stores and
/// a key ring built from [`SigningConfig`](crate::config::SigningConfig).
pub struct AuthorizationServerBuilder {
    config: AuthConfig,
    clock: Option<Arc<dyn Clock>>,
    clients: Option<Arc<dyn ClientStorage>>,
    tokens: Option<Arc<dyn TokenStore>>,
    jtis: Option<Arc<dyn JtiStorage>>,
    keys: Option<Arc<dyn KeyProvider>>,
}

impl AuthorizationServerBuilder {
    /// Sets the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the client registry.
    #[must_use]
    pub fn with_clients(mut self, clients: Arc<dyn ClientStorage>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Sets the code and token store.
    #[must_use]
    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Sets the client assertion JTI store.
    #[must_use]
    pub fn with_jti_storage(mut self, jtis: Arc<dyn JtiStorage>) -> Self {
        self.jtis = Some(jtis);
        self
    }

    /// Uses an external key provider instead of a local key ring.
    ///
    /// [`AuthorizationServer::rotate_signing_key`] is unavailable then;
    /// rotation belongs to the provider.
    #[must_use]
    pub fn with_key_provider(mut self, keys: Arc<dyn KeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Validates the configuration and wires every component.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the configuration is invalid or the key file
    ///   cannot be read
    /// - `Signing` if the key cannot be loaded or generated
    pub fn build(self) -> AuthResult<AuthorizationServer> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let clients = self
            .clients
            .unwrap_or_else(|| Arc::new(InMemoryClientStorage::new()));
        let store = self
            .tokens
            .unwrap_or_else(|| Arc::new(InMemoryTokenStore::new(clock.clone())));
        let jtis = self
            .jtis
            .unwrap_or_else(|| Arc::new(InMemoryJtiStorage::new(clock.clone())));

        let (keys, key_ring): (Arc<dyn KeyProvider>, Option<Arc<KeyRing>>) = match self.keys {
            Some(keys) => (keys, None),
            None => {
                let ring = Arc::new(KeyRing::new(load_signing_key(&config)?, clock.clone()));
                let provider: Arc<dyn KeyProvider> = ring.clone();
                (provider, Some(ring))
            }
        };

        let jwt = Arc::new(JwtService::new(keys.clone(), config.issuer.clone()));
        let factory = Arc::new(TokenFactory::new(
            jwt.clone(),
            clock.clone(),
            TokenPolicy::from_config(&config),
        ));
        let authenticator = ClientAuthenticator::new(
            clients.clone(),
            jtis.clone(),
            ClientAssertionConfig::new(config.token_endpoint())
                .with_max_lifetime(whole_seconds(config.client_auth.assertion_max_lifetime)),
            clock.clone(),
        )?;
        let introspection = IntrospectionEngine::new(
            store.clone(),
            jwt,
            clock.clone(),
            config.introspection.clone(),
        );
        let tokens = TokenService::new(
            factory.clone(),
            store.clone(),
            clock.clone(),
            config.tokens.refresh_token_rotation,
        );

        let key_source = if key_ring.is_some() { "key_ring" } else { "external" };
        tracing::info!(
            issuer = %config.issuer,
            key_source,
            "Authorization server initialized"
        );

        Ok(AuthorizationServer {
            config,
            clock,
            clients,
            store,
            jtis,
            keys,
            key_ring,
            factory,
            authenticator,
            introspection,
            tokens,
        })
    }
}

fn load_signing_key(config: &AuthConfig) -> AuthResult<SigningKeyPair> {
    let algorithm = config.signing.algorithm;
    let Some(path) = &config.signing.private_key_path else {
        tracing::warn!(
            algorithm = %algorithm,
            "No signing key configured; generated an ephemeral key"
        );
        return Ok(SigningKeyPair::generate(algorithm)?);
    };

    let pem = std::fs::read_to_string(path).map_err(|e| {
        AuthError::configuration(format!(
            "failed to read signing key {}: {e}",
            path.display()
        ))
    })?;

    // Stable across restarts so tokens signed before one still verify
    let kid = config
        .signing
        .key_id
        .clone()
        .unwrap_or_else(|| hex::encode(&Sha256::digest(pem.as_bytes())[..8]));

    Ok(SigningKeyPair::from_pem(kid, algorithm, &pem)?)
}

/// The assembled token core.
pub struct AuthorizationServer {
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    clients: Arc<dyn ClientStorage>,
    store: Arc<dyn TokenStore>,
    jtis: Arc<dyn JtiStorage>,
    keys: Arc<dyn KeyProvider>,
    key_ring: Option<Arc<KeyRing>>,
    factory: Arc<TokenFactory>,
    authenticator: ClientAuthenticator,
    introspection: IntrospectionEngine,
    tokens: TokenService,
}

impl AuthorizationServer {
    /// Starts building a server from `config`.
    #[must_use]
    pub fn builder(config: AuthConfig) -> AuthorizationServerBuilder {
        AuthorizationServerBuilder {
            config,
            clock: None,
            clients: None,
            tokens: None,
            jtis: None,
            keys: None,
        }
    }

    /// Authenticates a client.
    ///
    /// # Errors
    ///
    /// See [`ClientAuthenticator::authenticate`].
    pub async fn authenticate_client(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<AuthenticatedClient> {
        self.authenticator.authenticate(credentials).await
    }

    /// Creates and stores an authorization code after the resource owner
    /// approved the request.
    ///
    /// `nonce` is stored on the code unchanged for a downstream ID token
    /// issuer; token responses never carry it.
    ///
    /// # Errors
    ///
    /// - `InvalidClient` if the client is unknown
    /// - otherwise as [`TokenFactory::create_authorization_code`]
    pub async fn issue_authorization_code(
        &self,
        client_id: &str,
        subject: &str,
        scopes: &ScopeSet,
        redirect_uri: &str,
        code_challenge: Option<&PkceChallenge>,
        nonce: Option<&str>,
    ) -> AuthResult<AuthorizationCode> {
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client '{client_id}'")))?;

        let mut code = self
            .factory
            .create_authorization_code(&client, subject, scopes, redirect_uri)?;
        if let Some(challenge) = code_challenge {
            code = code.with_code_challenge(challenge);
        }
        if let Some(nonce) = nonce {
            code = code.with_nonce(nonce);
        }

        self.store.put_code(&code).await?;
        Ok(code)
    }

    /// Authenticates the client and handles a token request.
    ///
    /// # Errors
    ///
    /// See [`ClientAuthenticator::authenticate`] and [`TokenService::handle`].
    pub async fn token(
        &self,
        credentials: &ClientCredentials,
        request: &TokenRequest,
    ) -> AuthResult<TokenResponse> {
        let client = self.authenticator.authenticate(credentials).await?;
        self.tokens.handle(request, &client).await
    }

    /// Authenticates the requester and introspects a token.
    ///
    /// # Errors
    ///
    /// `InvalidClient` if the requester fails authentication, `Storage` if
    /// the token store fails.
    pub async fn introspect(
        &self,
        credentials: &ClientCredentials,
        request: &IntrospectionRequest,
    ) -> AuthResult<IntrospectionResponse> {
        let requester = self.authenticator.authenticate(credentials).await?;
        self.introspection.handle(request, &requester.client).await
    }

    /// Authenticates the client and revokes a token.
    ///
    /// # Errors
    ///
    /// `InvalidClient` if the client fails authentication, `Storage` if the
    /// token store fails.
    pub async fn revoke(
        &self,
        credentials: &ClientCredentials,
        request: &RevocationRequest,
    ) -> AuthResult<()> {
        let client = self.authenticator.authenticate(credentials).await?;
        self.tokens.revoke(request, &client.client).await
    }

    /// Revokes every token of a client and drops its pending codes.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the token store fails.
    pub async fn revoke_client_tokens(&self, client_id: &str) -> AuthResult<u64> {
        let revoked = self.store.revoke_by_client(client_id).await?;
        tracing::info!(client_id, revoked, "Revoked all tokens of client");
        Ok(revoked)
    }

    /// Rotates the local signing key, keeping the old one verifiable for the
    /// configured overlap. Keys whose window already closed are dropped
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when an external key provider is in use.
    pub fn rotate_signing_key(&self, new_key: SigningKeyPair) -> AuthResult<()> {
        let ring = self.key_ring.as_ref().ok_or_else(|| {
            AuthError::configuration("signing keys are managed by an external provider")
        })?;
        let overlap = time::Duration::seconds(whole_seconds(self.config.signing.key_overlap));
        ring.retire_expired();
        ring.rotate(new_key, overlap)
    }

    /// Starts the background sweep of expired codes, tokens and JTIs.
    pub fn spawn_cleanup(&self, interval: StdDuration) -> JoinHandle<()> {
        spawn_cleanup_task(self.store.clone(), Some(self.jtis.clone()), interval)
    }

    /// Public keys for the JWKS endpoint.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.keys.jwks()
    }

    /// The configuration in effect.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The time source.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The client registry.
    #[must_use]
    pub fn clients(&self) -> &Arc<dyn ClientStorage> {
        &self.clients
    }

    /// The code and token store.
    #[must_use]
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// The key provider.
    #[must_use]
    pub fn key_provider(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }

    /// The token factory.
    #[must_use]
    pub fn factory(&self) -> &Arc<TokenFactory> {
        &self.factory
    }

    /// The introspection engine.
    #[must_use]
    pub fn introspection(&self) -> &IntrospectionEngine {
        &self.introspection
    }

    /// The token endpoint service.
    #[must_use]
    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }
}

impl std::fmt::Debug for AuthorizationServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationServer")
            .field("issuer", &self.config.issuer)
            .field("local_key_ring", &self.key_ring.is_some())
            .finish_non_exhaustive()
    }
}
