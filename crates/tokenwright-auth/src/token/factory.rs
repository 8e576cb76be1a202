//! Creation of authorization codes, access tokens and refresh tokens.
//!
//! The factory checks a request against the client registration, picks
//! lifetimes and audience, and produces the value plus its record. It never
//! touches storage; callers persist what it returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use super::jwt::{AccessTokenClaims, JwtService};
use crate::AuthResult;
use crate::clock::Clock;
use crate::config::{AuthConfig, whole_seconds};
use crate::error::AuthError;
use crate::types::{
    AccessTokenFormat, AuthorizationCode, Client, GrantType, GrantedToken, IssuedToken, ScopeSet,
    TokenKind,
};

const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Lifetimes and audience applied when a client registration has none.
///
/// All lifetimes are in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Authorization code lifetime.
    pub authorization_code_lifetime: i64,

    /// Default access token lifetime.
    pub access_token_lifetime: i64,

    /// Ceiling for every access token lifetime.
    pub max_access_token_lifetime: i64,

    /// Default refresh token lifetime.
    pub refresh_token_lifetime: i64,

    /// Audience for clients that do not register one.
    pub default_audience: Vec<String>,
}

impl TokenPolicy {
    /// Derives the policy from configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            authorization_code_lifetime: whole_seconds(config.tokens.authorization_code_lifetime),
            access_token_lifetime: whole_seconds(config.tokens.access_token_lifetime),
            max_access_token_lifetime: whole_seconds(config.tokens.max_access_token_lifetime),
            refresh_token_lifetime: whole_seconds(config.tokens.refresh_token_lifetime),
            default_audience: config.audience.clone(),
        }
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

/// Creates codes and tokens.
pub struct TokenFactory {
    jwt: Arc<JwtService>,
    clock: Arc<dyn Clock>,
    policy: TokenPolicy,
}

impl TokenFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new(jwt: Arc<JwtService>, clock: Arc<dyn Clock>, policy: TokenPolicy) -> Self {
        Self { jwt, clock, policy }
    }

    /// Returns the policy in effect.
    #[must_use]
    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Returns the JWT service used for self-contained tokens.
    #[must_use]
    pub fn jwt_service(&self) -> &Arc<JwtService> {
        &self.jwt
    }

    /// Creates an authorization code for `subject`.
    ///
    /// Attach PKCE and nonce bindings with
    /// [`AuthorizationCode::with_code_challenge`] and
    /// [`AuthorizationCode::with_nonce`] before storing.
    ///
    /// # Errors
    ///
    /// - `UnauthorizedClient` if the client is inactive or may not use the
    ///   authorization code grant
    /// - `InvalidRequest` if the redirect URI is not registered or the
    ///   subject is empty
    /// - `InvalidScope` if a scope is outside the client's allowed set
    pub fn create_authorization_code(
        &self,
        client: &Client,
        subject: &str,
        scopes: &ScopeSet,
        redirect_uri: &str,
    ) -> AuthResult<AuthorizationCode> {
        check_client(client, GrantType::AuthorizationCode)?;
        if subject.is_empty() {
            return Err(AuthError::invalid_request("subject cannot be empty"));
        }
        if !client.is_redirect_uri_allowed(redirect_uri) {
            return Err(AuthError::invalid_request(format!(
                "redirect_uri '{redirect_uri}' is not registered"
            )));
        }
        check_scopes(client, scopes)?;

        let created_at = self.clock.now();
        let expires_at = expiry(created_at, self.policy.authorization_code_lifetime)?;
        let code = AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            client_id: client.client_id.clone(),
            subject: subject.to_string(),
            scopes: scopes.clone(),
            redirect_uri: redirect_uri.to_string(),
            code_challenge: None,
            nonce: None,
            created_at,
            expires_at,
        };

        tracing::debug!(client_id = %client.client_id, "Authorization code created");
        Ok(code)
    }

    /// Creates an access token.
    ///
    /// The lifetime is `lifetime_override`, else the client's registered
    /// lifetime, else the default, and is clamped to the configured maximum.
    ///
    /// # Errors
    ///
    /// - `UnauthorizedClient` if the client is inactive
    /// - `InvalidScope` if a scope is outside the client's allowed set
    /// - `InvalidRequest` if `lifetime_override` is not positive
    /// - `Signing` if a self-contained token cannot be signed
    pub fn create_access_token(
        &self,
        client: &Client,
        subject: Option<&str>,
        scopes: &ScopeSet,
        lifetime_override: Option<i64>,
    ) -> AuthResult<IssuedToken> {
        self.create_access_token_with_extensions(
            client,
            subject,
            scopes,
            lifetime_override,
            BTreeMap::new(),
        )
    }

    /// Creates an access token carrying extension claims.
    ///
    /// Extensions are embedded in self-contained tokens and kept on the
    /// record, so introspection reports them for both formats.
    ///
    /// # Errors
    ///
    /// As [`create_access_token`](Self::create_access_token).
    pub fn create_access_token_with_extensions(
        &self,
        client: &Client,
        subject: Option<&str>,
        scopes: &ScopeSet,
        lifetime_override: Option<i64>,
        extensions: BTreeMap<String, Value>,
    ) -> AuthResult<IssuedToken> {
        if !client.active {
            return Err(AuthError::unauthorized_client("client is inactive"));
        }
        check_scopes(client, scopes)?;
        let lifetime = self.access_lifetime(client, lifetime_override)?;

        let issued_at = self.clock.now();
        let expires_at = expiry(issued_at, lifetime)?;
        let jti = uuid::Uuid::new_v4().to_string();
        let audience = if client.audience.is_empty() {
            self.policy.default_audience.clone()
        } else {
            client.audience.clone()
        };

        let value = match client.access_token_format {
            AccessTokenFormat::Jwt => {
                let claims = AccessTokenClaims::builder(
                    self.jwt.issuer(),
                    &client.client_id,
                    issued_at.unix_timestamp(),
                )
                .subject(subject.map(str::to_string))
                .audience(audience.clone())
                .expires_in_seconds(lifetime)
                .jti(&jti)
                .scope(scopes.to_scope_string())
                .extra(&extensions)
                .build();
                let (token, kid) = self.jwt.encode(&claims)?;
                tracing::debug!(client_id = %client.client_id, %jti, %kid, "Signed access token issued");
                token
            }
            AccessTokenFormat::Opaque => {
                tracing::debug!(client_id = %client.client_id, %jti, "Opaque access token issued");
                GrantedToken::generate_token()
            }
        };

        let token = GrantedToken {
            jti,
            handle: GrantedToken::hash_token(&value),
            kind: TokenKind::Access,
            format: client.access_token_format,
            client_id: client.client_id.clone(),
            subject: subject.map(str::to_string),
            scopes: scopes.clone(),
            audience,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            issued_at,
            expires_at,
            revoked_at: None,
            extensions,
        };

        Ok(IssuedToken { value, token })
    }

    /// Creates an opaque refresh token.
    ///
    /// # Errors
    ///
    /// - `UnauthorizedClient` if the client is inactive or may not use the
    ///   refresh token grant
    /// - `InvalidScope` if a scope is outside the client's allowed set
    pub fn create_refresh_token(
        &self,
        client: &Client,
        subject: Option<&str>,
        scopes: &ScopeSet,
    ) -> AuthResult<IssuedToken> {
        check_client(client, GrantType::RefreshToken)?;
        check_scopes(client, scopes)?;

        let issued_at = self.clock.now();
        let lifetime = client
            .refresh_token_lifetime
            .unwrap_or(self.policy.refresh_token_lifetime);

        Ok(self.refresh_token_record(
            client,
            subject,
            scopes,
            issued_at,
            expiry(issued_at, lifetime)?,
        ))
    }

    /// Issues the successor of a rotated refresh token.
    ///
    /// The successor keeps the predecessor's subject and expiry, so rotation
    /// never extends a grant.
    ///
    /// # Errors
    ///
    /// Returns `UnauthorizedClient` if the client is inactive or lost the
    /// refresh token grant.
    pub fn rotate_refresh_token(
        &self,
        client: &Client,
        previous: &GrantedToken,
        scopes: &ScopeSet,
    ) -> AuthResult<IssuedToken> {
        check_client(client, GrantType::RefreshToken)?;
        Ok(self.refresh_token_record(
            client,
            previous.subject.as_deref(),
            scopes,
            self.clock.now(),
            previous.expires_at,
        ))
    }

    fn refresh_token_record(
        &self,
        client: &Client,
        subject: Option<&str>,
        scopes: &ScopeSet,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> IssuedToken {
        let value = GrantedToken::generate_token();
        let token = GrantedToken {
            jti: uuid::Uuid::new_v4().to_string(),
            handle: GrantedToken::hash_token(&value),
            kind: TokenKind::Refresh,
            format: AccessTokenFormat::Opaque,
            client_id: client.client_id.clone(),
            subject: subject.map(str::to_string),
            scopes: scopes.clone(),
            audience: Vec::new(),
            token_type: TOKEN_TYPE_BEARER.to_string(),
            issued_at,
            expires_at,
            revoked_at: None,
            extensions: BTreeMap::new(),
        };
        tracing::debug!(client_id = %client.client_id, jti = %token.jti, "Refresh token issued");
        IssuedToken { value, token }
    }

    fn access_lifetime(&self, client: &Client, lifetime_override: Option<i64>) -> AuthResult<i64> {
        let requested = match lifetime_override {
            Some(seconds) if seconds <= 0 => {
                return Err(AuthError::invalid_request(format!(
                    "token lifetime must be positive, got {seconds}"
                )));
            }
            Some(seconds) => seconds,
            None => client
                .access_token_lifetime
                .unwrap_or(self.policy.access_token_lifetime),
        };
        Ok(requested.min(self.policy.max_access_token_lifetime))
    }
}

impl std::fmt::Debug for TokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFactory")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// `issued_at + lifetime`, refusing lifetimes past the representable range.
fn expiry(issued_at: OffsetDateTime, lifetime: i64) -> AuthResult<OffsetDateTime> {
    issued_at
        .checked_add(Duration::seconds(lifetime))
        .ok_or_else(|| {
            AuthError::invalid_request(format!(
                "token lifetime of {lifetime} seconds is out of range"
            ))
        })
}

fn check_client(client: &Client, grant_type: GrantType) -> AuthResult<()> {
    if !client.active {
        return Err(AuthError::unauthorized_client("client is inactive"));
    }
    if !client.is_grant_type_allowed(grant_type) {
        return Err(AuthError::unauthorized_client(format!(
            "client is not allowed the {grant_type} grant"
        )));
    }
    Ok(())
}

fn check_scopes(client: &Client, scopes: &ScopeSet) -> AuthResult<()> {
    if client.are_scopes_allowed(scopes) {
        return Ok(());
    }
    let denied = scopes.difference(&client.scopes).join(" ");
    Err(AuthError::invalid_scope(format!(
        "scope not permitted for client: {denied}"
    )))
}
