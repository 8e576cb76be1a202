//! Token creation, validation, and management.
//!
//! This module provides:
//!
//! - [`factory`] - Authorization code, access token and refresh token creation
//! - [`introspection`] - Token introspection (RFC 7662)
//! - [`revocation`] - Token revocation wire types (RFC 7009)
//! - [`service`] - Token endpoint grant handling
//! - [`jwt`] - Self-contained access token encoding and verification
//! - [`keys`] - Signing keys, key providers and rotation

pub mod factory;
pub mod introspection;
pub mod jwt;
pub mod keys;
pub mod revocation;
pub mod service;

pub use factory::{TokenFactory, TokenPolicy};
pub use introspection::{IntrospectionEngine, IntrospectionRequest, IntrospectionResponse};
pub use jwt::{AccessTokenClaims, AccessTokenClaimsBuilder, JwtError, JwtService};
pub use keys::{Jwk, JwkParams, Jwks, KeyProvider, KeyRing, SigningAlgorithm, SigningKeyPair};
pub use revocation::{RevocationRequest, TokenTypeHint};
pub use service::TokenService;
