//! OAuth 2.0 protocol pieces shared by the token components.
//!
//! - [`client_auth`] - Client authentication for all five methods
//! - [`client_assertion`] - RFC 7523 assertion validation (`private_key_jwt`)
//! - [`client_secret`] - Secret generation and Argon2 hashing
//! - [`pkce`] - PKCE challenge/verifier implementation
//! - [`token`] - Token endpoint request and response types
//!
//! # Example
//!
//! ```ignore
//! use tokenwright_auth::oauth::{ClientCredentials, PkceChallenge, PkceVerifier};
//!
//! // Client generates PKCE verifier and challenge
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::from_verifier(&verifier);
//!
//! // Server authenticates the client presenting a token request
//! let credentials = ClientCredentials::from_request(header, &request, None)?;
//! let client = authenticator.authenticate(&credentials).await?;
//! ```

pub mod client_assertion;
pub mod client_auth;
pub mod client_secret;
pub mod pkce;
pub mod token;

// Client assertion types (for private_key_jwt authentication)
pub use client_assertion::{
    ClientAssertionClaims, ClientAssertionConfig, ClientAssertionValidator, StringOrArray,
    UnverifiedAssertion,
};

// Client authentication
pub use client_auth::{
    AuthenticatedClient, ClientAuthenticator, ClientCertificate, ClientCredentials,
    parse_basic_auth,
};

// PKCE
pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};

// Token endpoint
pub use token::{CLIENT_ASSERTION_TYPE_JWT_BEARER, TokenRequest, TokenResponse};
