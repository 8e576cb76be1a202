//! # tokenwright-auth
//!
//! OAuth 2.0 / OpenID Connect token issuance and introspection core.
//!
//! This crate provides:
//! - Authorization code, access token and refresh token creation
//! - Code and token storage with single-use code consumption
//! - Token introspection (RFC 7662) with requester access control
//! - Client authentication (`none`, `client_secret_basic`,
//!   `client_secret_post`, `private_key_jwt`, `tls_client_auth`)
//! - Token endpoint grant handling and revocation (RFC 7009)
//! - Signing key rotation that never invalidates a still-valid token
//!
//! ## Overview
//!
//! Transport is out of scope: an HTTP layer parses requests into the wire
//! types in [`oauth`] and [`token`], calls [`AuthorizationServer`], and
//! renders [`AuthError::to_error_response`] on failure.
//!
//! All shared state (clock, stores, keys) is passed in at construction.
//!
//! ## Modules
//!
//! - [`config`] - Lifetimes, signing and introspection configuration
//! - [`oauth`] - Client authentication, PKCE and token endpoint wire types
//! - [`token`] - Token factory, introspection, token service and keys
//! - [`storage`] - Storage traits and in-memory backends
//! - [`server`] - Component wiring
//! - [`clock`] - Injectable time source

pub mod clock;
pub mod config;
pub mod error;
pub mod oauth;
pub mod server;
pub mod storage;
pub mod token;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory, ErrorResponse, OAuthErrorCode};
pub use oauth::{AuthenticatedClient, ClientAuthenticator, ClientCredentials};
pub use server::{AuthorizationServer, AuthorizationServerBuilder};
pub use storage::{ClientStorage, JtiStorage, TokenStore};
pub use token::{
    IntrospectionEngine, IntrospectionResponse, KeyProvider, KeyRing, TokenFactory, TokenService,
};
pub use types::{Client, ClientValidationError, GrantType, ScopeSet};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenwright_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory, ErrorResponse, OAuthErrorCode};
    pub use crate::oauth::{
        AuthenticatedClient, ClientAuthenticator, ClientCertificate, ClientCredentials,
        PkceChallenge, PkceVerifier, TokenRequest, TokenResponse,
    };
    pub use crate::server::{AuthorizationServer, AuthorizationServerBuilder};
    pub use crate::storage::{
        ClientStorage, InMemoryClientStorage, InMemoryJtiStorage, InMemoryTokenStore, JtiStorage,
        TokenStore,
    };
    pub use crate::token::{
        IntrospectionEngine, IntrospectionRequest, IntrospectionResponse, KeyProvider, KeyRing,
        RevocationRequest, SigningAlgorithm, SigningKeyPair, TokenFactory, TokenService,
        TokenTypeHint,
    };
    pub use crate::types::{
        AccessTokenFormat, AuthorizationCode, Client, GrantType, GrantedToken, IssuedToken,
        ScopeSet, TokenEndpointAuthMethod,
    };
}
