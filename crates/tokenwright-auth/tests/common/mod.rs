//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use time::macros::datetime;
use tokenwright_auth::oauth::client_secret::hash_client_secret;
use tokenwright_auth::prelude::*;

pub const REDIRECT: &str = "https://app.example.com/callback";
pub const SECRET: &str = "c1-secret";

/// Confidential web client allowed `{openid, profile}`.
pub fn c1() -> Client {
    Client::new("c1", "Client One")
        .with_auth_method(
            TokenEndpointAuthMethod::ClientSecretBasic,
            Some(hash_client_secret(SECRET).expect("hash secret")),
        )
        .with_grant_types([GrantType::AuthorizationCode, GrantType::RefreshToken])
        .with_redirect_uris([REDIRECT])
        .with_scopes(ScopeSet::parse("openid profile"))
}

/// Resource server holding the introspection privilege.
pub fn resource_server() -> Client {
    Client::new("rs", "Resource Server")
        .with_auth_method(
            TokenEndpointAuthMethod::ClientSecretPost,
            Some(hash_client_secret("rs-secret").expect("hash secret")),
        )
        .with_grant_types([GrantType::ClientCredentials])
        .with_introspection(true)
}

pub struct Harness {
    pub server: Arc<AuthorizationServer>,
    pub clock: Arc<ManualClock>,
}

pub fn harness_with(config: AuthConfig, clients: Vec<Client>) -> Harness {
    let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC)));
    let clients = InMemoryClientStorage::with_clients(clients).expect("valid clients");
    let server = AuthorizationServer::builder(config)
        .with_clock(clock.clone())
        .with_clients(Arc::new(clients))
        .build()
        .expect("server builds");
    Harness {
        server: Arc::new(server),
        clock,
    }
}

pub fn harness() -> Harness {
    let mut config = AuthConfig::default();
    config.issuer = "https://auth.example.com".to_string();
    harness_with(config, vec![c1(), resource_server()])
}

/// `c1` as the token service sees it after authentication.
pub fn authenticated_c1() -> AuthenticatedClient {
    AuthenticatedClient {
        client: c1(),
        auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
    }
}
