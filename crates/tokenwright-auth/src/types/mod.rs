//! Domain types for clients, codes and tokens.

pub mod authorization_code;
pub mod client;
pub mod granted_token;
pub mod scope;

pub use authorization_code::AuthorizationCode;
pub use client::{
    AccessTokenFormat, Client, ClientValidationError, GrantType, MAX_TOKEN_LIFETIME_SECONDS,
    TokenEndpointAuthMethod,
};
pub use granted_token::{GrantedToken, IssuedToken, TokenKind};
pub use scope::ScopeSet;
