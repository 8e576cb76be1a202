//! Token introspection (RFC 7662)
//!
//! Resource servers ask whether a token is active and what it grants.
//!
//! # Security Considerations
//!
//! - The requesting client must already be authenticated
//! - Never reveal why a token is inactive (expired vs revoked vs invalid vs
//!   not visible to the requester)
//! - Only a failing token store produces an error; everything else is
//!   `{"active": false}`
//!
//! # Visibility
//!
//! A requester sees a token when it is the client the token was issued to
//! (if [`IntrospectionConfig::allow_owner`] is set) or when it holds the
//! introspection privilege and, with
//! [`IntrospectionConfig::require_audience_match`], is named in the token
//! audience.
//!
//! # References
//!
//! - [RFC 7662 - OAuth 2.0 Token Introspection](https://tools.ietf.org/html/rfc7662)

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jwt::{AccessTokenClaims, JwtService};
use super::revocation::TokenTypeHint;
use crate::AuthResult;
use crate::clock::Clock;
use crate::config::IntrospectionConfig;
use crate::storage::TokenStore;
use crate::types::{Client, GrantedToken};

/// Member names defined by RFC 7662; extension claims never override them.
const RESERVED_MEMBERS: [&str; 12] = [
    "active",
    "scope",
    "client_id",
    "username",
    "token_type",
    "exp",
    "iat",
    "nbf",
    "sub",
    "aud",
    "iss",
    "jti",
];

// =============================================================================
// Request Types
// =============================================================================

/// Token introspection request per RFC 7662.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntrospectionRequest {
    /// The token to introspect.
    pub token: String,

    /// Optional hint about the token type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_hint: Option<TokenTypeHint>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Token introspection response per RFC 7662.
///
/// If the token is invalid, expired, revoked, unknown or not visible to the
/// requester, only `active: false` is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently active. The only required member.
    pub active: bool,

    /// Space-separated granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Human-readable resource owner identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Token type, e.g. `Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Subject, absent for client credentials tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Intended audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Vec<String>>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Extension claims, flattened into the top-level object.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl IntrospectionResponse {
    /// Creates an inactive response.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Returns the granted scopes as a list.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn from_record(record: &GrantedToken, issuer: &str) -> Self {
        let mut response = Self {
            active: true,
            scope: non_empty(record.scopes.to_scope_string()),
            client_id: Some(record.client_id.clone()),
            username: None,
            token_type: Some(record.token_type.clone()),
            exp: Some(record.expires_at.unix_timestamp()),
            iat: Some(record.issued_at.unix_timestamp()),
            nbf: None,
            sub: record.subject.clone(),
            aud: (!record.audience.is_empty()).then(|| record.audience.clone()),
            iss: Some(issuer.to_string()),
            jti: Some(record.jti.clone()),
            extensions: BTreeMap::new(),
        };
        response.absorb_extensions(&record.extensions);
        response
    }

    fn from_claims(claims: AccessTokenClaims) -> Self {
        let mut response = Self {
            active: true,
            scope: non_empty(claims.scope),
            client_id: Some(claims.client_id),
            username: None,
            token_type: Some("Bearer".to_string()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            nbf: claims.extra.get("nbf").and_then(Value::as_i64),
            sub: claims.sub,
            aud: (!claims.aud.is_empty()).then_some(claims.aud),
            iss: Some(claims.iss),
            jti: Some(claims.jti),
            extensions: BTreeMap::new(),
        };
        response.absorb_extensions(&claims.extra);
        response
    }

    /// Copies extension claims that do not collide with RFC 7662 members.
    /// A string `username` extension fills the `username` member.
    fn absorb_extensions(&mut self, extensions: &BTreeMap<String, Value>) {
        if let Some(Value::String(username)) = extensions.get("username") {
            self.username = Some(username.clone());
        }
        self.extensions = extensions
            .iter()
            .filter(|(name, _)| !RESERVED_MEMBERS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

// =============================================================================
// Engine
// =============================================================================

/// Resolves presented tokens to introspection responses.
pub struct IntrospectionEngine {
    store: Arc<dyn TokenStore>,
    jwt: Arc<JwtService>,
    clock: Arc<dyn Clock>,
    config: IntrospectionConfig,
}

impl IntrospectionEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        jwt: Arc<JwtService>,
        clock: Arc<dyn Clock>,
        config: IntrospectionConfig,
    ) -> Self {
        Self {
            store,
            jwt,
            clock,
            config,
        }
    }

    /// Introspects `token` on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only when the token store fails.
    pub async fn introspect(
        &self,
        token: &str,
        requester: &Client,
    ) -> AuthResult<IntrospectionResponse> {
        self.introspect_with_hint(token, None, requester).await
    }

    /// Introspects `token`, using `hint` to order the lookups.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only when the token store fails.
    pub async fn introspect_with_hint(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
        requester: &Client,
    ) -> AuthResult<IntrospectionResponse> {
        let resolved = self.resolve(token, hint).await?;

        let response = match resolved {
            Some(response) if self.may_inspect(requester, &response) => response,
            Some(_) => {
                tracing::debug!(
                    client_id = %requester.client_id,
                    "Introspection denied for token owned by another client"
                );
                IntrospectionResponse::inactive()
            }
            None => IntrospectionResponse::inactive(),
        };

        tracing::debug!(
            client_id = %requester.client_id,
            active = response.active,
            "Token introspected"
        );
        Ok(response)
    }

    /// Handles a wire request.
    ///
    /// # Errors
    ///
    /// Returns `Storage` only when the token store fails.
    pub async fn handle(
        &self,
        request: &IntrospectionRequest,
        requester: &Client,
    ) -> AuthResult<IntrospectionResponse> {
        self.introspect_with_hint(&request.token, request.token_type_hint, requester)
            .await
    }

    async fn resolve(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<Option<IntrospectionResponse>> {
        let is_jwt = JwtService::looks_like_jwt(token);

        if is_jwt && hint != Some(TokenTypeHint::RefreshToken) {
            return self.resolve_signed(token).await;
        }

        match self.resolve_stored(token).await? {
            Some(response) => Ok(Some(response)),
            None if is_jwt => self.resolve_signed(token).await,
            None => Ok(None),
        }
    }

    async fn resolve_stored(&self, token: &str) -> AuthResult<Option<IntrospectionResponse>> {
        let handle = GrantedToken::hash_token(token);
        let Some(record) = self.store.get_token(&handle).await? else {
            return Ok(None);
        };
        if !record.is_active_at(self.clock.now()) {
            return Ok(None);
        }
        Ok(Some(IntrospectionResponse::from_record(
            &record,
            self.jwt.issuer(),
        )))
    }

    async fn resolve_signed(&self, token: &str) -> AuthResult<Option<IntrospectionResponse>> {
        let claims = match self.jwt.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Presented JWT failed verification");
                return Ok(None);
            }
        };

        if self.clock.unix_timestamp() >= claims.exp {
            return Ok(None);
        }
        if self.store.is_jti_revoked(&claims.jti).await? {
            return Ok(None);
        }
        let record = self
            .store
            .get_token(&GrantedToken::hash_token(token))
            .await?;
        if record.is_some_and(|r| r.is_revoked()) {
            return Ok(None);
        }

        Ok(Some(IntrospectionResponse::from_claims(claims)))
    }

    fn may_inspect(&self, requester: &Client, response: &IntrospectionResponse) -> bool {
        if !requester.active {
            return false;
        }
        if self.config.allow_owner
            && response.client_id.as_deref() == Some(requester.client_id.as_str())
        {
            return true;
        }
        if !requester.introspection_allowed {
            return false;
        }
        !self.config.require_audience_match
            || response
                .aud
                .as_ref()
                .is_some_and(|aud| aud.iter().any(|a| *a == requester.client_id))
    }
}

impl std::fmt::Debug for IntrospectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
