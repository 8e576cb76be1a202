//! Token endpoint grant handling and revocation.
//!
//! `TokenService` runs after client authentication. It dispatches on
//! `grant_type`, persists what the [`TokenFactory`] creates, and answers
//! with a [`TokenResponse`].
//!
//! # Security
//!
//! - Authorization codes are consumed atomically (one-time use)
//! - PKCE is verified whenever the code carries a challenge and is
//!   mandatory for public clients
//! - Refresh token rotation keeps the original expiry
//! - Token values are never logged

use std::sync::Arc;

use time::OffsetDateTime;

use super::factory::TokenFactory;
use super::jwt::JwtService;
use super::revocation::RevocationRequest;
use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::oauth::{
    AuthenticatedClient, PkceChallenge, PkceVerifier, TokenRequest, TokenResponse,
};
use crate::storage::TokenStore;
use crate::types::{
    AccessTokenFormat, AuthorizationCode, Client, GrantType, GrantedToken, ScopeSet, TokenKind,
};

/// Token endpoint service.
pub struct TokenService {
    factory: Arc<TokenFactory>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    rotate_refresh_tokens: bool,
}

impl TokenService {
    /// Creates a token service.
    #[must_use]
    pub fn new(
        factory: Arc<TokenFactory>,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        rotate_refresh_tokens: bool,
    ) -> Self {
        Self {
            factory,
            store,
            clock,
            rotate_refresh_tokens,
        }
    }

    /// Handles a token request from an authenticated client.
    ///
    /// # Errors
    ///
    /// - `UnsupportedGrantType` for an unknown `grant_type`
    /// - `UnauthorizedClient` if the client may not use the grant
    /// - `InvalidRequest` if a required parameter is missing
    /// - `InvalidGrant` for unusable codes, refresh tokens or PKCE failures
    /// - `InvalidScope` if the requested scope is not permitted
    /// - `Storage` or `Signing` on backend failures
    pub async fn handle(
        &self,
        request: &TokenRequest,
        authenticated: &AuthenticatedClient,
    ) -> AuthResult<TokenResponse> {
        let client = &authenticated.client;
        let grant_type = GrantType::parse(&request.grant_type)
            .ok_or_else(|| AuthError::unsupported_grant_type(&request.grant_type))?;

        if !client.is_grant_type_allowed(grant_type) {
            return Err(AuthError::unauthorized_client(format!(
                "client is not allowed the {grant_type} grant"
            )));
        }

        let result = match grant_type {
            GrantType::AuthorizationCode => self.exchange_code(request, client).await,
            GrantType::ClientCredentials => self.client_credentials(request, client).await,
            GrantType::RefreshToken => self.refresh(request, client).await,
        };

        match &result {
            Ok(_) => tracing::info!(
                client_id = %client.client_id,
                grant_type = %grant_type,
                "Token issued"
            ),
            Err(e) => tracing::debug!(
                client_id = %client.client_id,
                grant_type = %grant_type,
                error = %e,
                "Token request rejected"
            ),
        }
        result
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        request: &TokenRequest,
        client: &Client,
    ) -> AuthResult<TokenResponse> {
        let code = request
            .code
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing code parameter"))?;
        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing redirect_uri parameter"))?;

        // Consumed before any other check so a code can never be tried twice
        let grant = self
            .store
            .consume(code)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("invalid authorization code"))?;

        if grant.client_id != client.client_id {
            return Err(AuthError::invalid_grant(
                "authorization code was issued to a different client",
            ));
        }
        if grant.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_grant(
                "redirect_uri does not match authorization request",
            ));
        }
        verify_pkce(&grant, request.code_verifier.as_deref(), client)?;

        let access = self.factory.create_access_token(
            client,
            Some(&grant.subject),
            &grant.scopes,
            None,
        )?;
        self.store.put_token(&access.token).await?;

        let mut response = TokenResponse::new(
            access.value.clone(),
            access.expires_in(),
            grant.scopes.to_scope_string(),
        );

        if client.is_grant_type_allowed(GrantType::RefreshToken) {
            let refresh =
                self.factory
                    .create_refresh_token(client, Some(&grant.subject), &grant.scopes)?;
            self.store.put_token(&refresh.token).await?;
            response = response.with_refresh_token(refresh.value);
        }

        Ok(response)
    }

    /// Issues an access token for the client itself.
    ///
    /// No refresh token is issued (RFC 6749 section 4.4.3).
    async fn client_credentials(
        &self,
        request: &TokenRequest,
        client: &Client,
    ) -> AuthResult<TokenResponse> {
        if !client.is_confidential() {
            return Err(AuthError::unauthorized_client(
                "public clients cannot use client_credentials",
            ));
        }

        let scopes = match request.scope.as_deref() {
            Some(scope) => ScopeSet::parse(scope),
            None => client.scopes.clone(),
        };

        let access = self
            .factory
            .create_access_token(client, None, &scopes, None)?;
        self.store.put_token(&access.token).await?;

        Ok(TokenResponse::new(
            access.value.clone(),
            access.expires_in(),
            scopes.to_scope_string(),
        ))
    }

    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, request: &TokenRequest, client: &Client) -> AuthResult<TokenResponse> {
        let value = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("missing refresh_token parameter"))?;

        let handle = GrantedToken::hash_token(value);
        let stored = self
            .store
            .get_token(&handle)
            .await?
            .filter(|t| t.kind == TokenKind::Refresh)
            .ok_or_else(|| AuthError::invalid_grant("invalid refresh token"))?;

        if stored.client_id != client.client_id {
            return Err(AuthError::invalid_grant(
                "refresh token was issued to a different client",
            ));
        }
        if stored.is_revoked() {
            return Err(AuthError::invalid_grant("refresh token has been revoked"));
        }
        if stored.is_expired_at(self.clock.now()) {
            return Err(AuthError::invalid_grant("refresh token has expired"));
        }

        // Scope may be narrowed, never expanded
        let scopes = match request.scope.as_deref() {
            None => stored.scopes.clone(),
            Some(requested) => {
                let requested = ScopeSet::parse(requested);
                if !requested.is_subset(&stored.scopes) {
                    return Err(AuthError::invalid_scope(
                        "requested scope exceeds original grant",
                    ));
                }
                requested
            }
        };

        let access =
            self.factory
                .create_access_token(client, stored.subject.as_deref(), &scopes, None)?;

        let rotated = if self.rotate_refresh_tokens {
            let next = self.factory.rotate_refresh_token(client, &stored, &scopes)?;
            self.store.revoke(&handle).await?;
            self.store.put_token(&next.token).await?;
            Some(next.value)
        } else {
            None
        };

        self.store.put_token(&access.token).await?;

        let mut response =
            TokenResponse::new(access.value.clone(), access.expires_in(), scopes.to_scope_string());
        if let Some(token) = rotated {
            response = response.with_refresh_token(token);
        }
        Ok(response)
    }

    /// Revokes a token (RFC 7009).
    ///
    /// Unknown tokens and tokens issued to other clients are ignored, so
    /// the caller answers 200 OK either way.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the token store fails.
    pub async fn revoke(&self, request: &RevocationRequest, client: &Client) -> AuthResult<()> {
        let handle = GrantedToken::hash_token(&request.token);

        if let Some(record) = self.store.get_token(&handle).await? {
            if record.client_id != client.client_id {
                tracing::debug!(
                    client_id = %client.client_id,
                    "Ignoring revocation of a token owned by another client"
                );
                return Ok(());
            }

            self.store.revoke(&handle).await?;
            if record.kind == TokenKind::Access && record.format == AccessTokenFormat::Jwt {
                self.store.revoke_jti(&record.jti, record.expires_at).await?;
            }
            tracing::info!(
                client_id = %client.client_id,
                jti = %record.jti,
                kind = %record.kind,
                "Token revoked"
            );
            return Ok(());
        }

        // A signed token this instance holds no record of
        if JwtService::looks_like_jwt(&request.token) {
            if let Ok(claims) = self.factory.jwt_service().verify(&request.token) {
                if claims.client_id == client.client_id {
                    if let Ok(expires_at) = OffsetDateTime::from_unix_timestamp(claims.exp) {
                        self.store.revoke_jti(&claims.jti, expires_at).await?;
                        tracing::info!(
                            client_id = %client.client_id,
                            jti = %claims.jti,
                            "Signed access token revoked"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns the token factory.
    #[must_use]
    pub fn factory(&self) -> &Arc<TokenFactory> {
        &self.factory
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("rotate_refresh_tokens", &self.rotate_refresh_tokens)
            .finish_non_exhaustive()
    }
}

fn verify_pkce(grant: &AuthorizationCode, verifier: Option<&str>, client: &Client) -> AuthResult<()> {
    match (grant.code_challenge.as_deref(), verifier) {
        (Some(challenge), Some(verifier)) => {
            let challenge = PkceChallenge::new(challenge.to_string())
                .map_err(|e| AuthError::invalid_grant(format!("invalid PKCE challenge: {e}")))?;
            let verifier = PkceVerifier::new(verifier.to_string())
                .map_err(|e| AuthError::invalid_grant(format!("invalid PKCE verifier: {e}")))?;
            challenge
                .verify(&verifier)
                .map_err(|e| AuthError::invalid_grant(format!("PKCE verification failed: {e}")))
        }
        (Some(_), None) => Err(AuthError::invalid_grant("missing code_verifier")),
        (None, Some(_)) => Err(AuthError::invalid_grant(
            "code_verifier sent for a code issued without a challenge",
        )),
        (None, None) if !client.is_confidential() => Err(AuthError::invalid_grant(
            "PKCE is required for public clients",
        )),
        (None, None) => Ok(()),
    }
}
