//! OAuth 2.0 client registrations.
//!
//! Field names follow the RFC 7591 client metadata vocabulary where one
//! exists (`token_endpoint_auth_method`, `grant_types`, `redirect_uris`,
//! `tls_client_auth_subject_dn`).

use std::fmt;

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};

use super::scope::ScopeSet;

/// Longest lifetime, in seconds, accepted for any code, token or key
/// overlap (ten years).
pub const MAX_TOKEN_LIFETIME_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Client Credentials flow (confidential clients only).
    ClientCredentials,
    /// Refresh Token flow.
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a grant_type parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "client_credentials" => Some(Self::ClientCredentials),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// Token endpoint authentication methods.
///
/// Defined in OpenID Connect Core section 9 and RFC 8705.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// No client authentication (public clients).
    None,

    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,

    /// Client assertion JWT signed with private key.
    PrivateKeyJwt,

    /// Mutual TLS with a PKI-issued client certificate.
    TlsClientAuth,
}

impl TokenEndpointAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::PrivateKeyJwt => "private_key_jwt",
            Self::TlsClientAuth => "tls_client_auth",
        }
    }

    /// Returns `true` for the two shared-secret methods.
    #[must_use]
    pub fn uses_secret(&self) -> bool {
        matches!(self, Self::ClientSecretBasic | Self::ClientSecretPost)
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Access Token Format
// =============================================================================

/// How access tokens for a client are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTokenFormat {
    /// Self-contained signed JWT (RFC 9068 profile).
    #[default]
    Jwt,
    /// Random handle resolved through the token store.
    Opaque,
}

// =============================================================================
// Client
// =============================================================================

/// OAuth 2.0 client registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Human-readable display name.
    pub name: String,

    /// Argon2 PHC hash of the client secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_hash: Option<String>,

    /// The only method this client may authenticate with.
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Grant types this client is allowed to use.
    pub grant_types: Vec<GrantType>,

    /// Registered redirect URIs, compared by exact string match.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes this client may request. An empty set permits no scopes.
    #[serde(default)]
    pub scopes: ScopeSet,

    /// Audience placed in tokens issued to this client.
    #[serde(default)]
    pub audience: Vec<String>,

    /// Access token representation.
    #[serde(default)]
    pub access_token_format: AccessTokenFormat,

    /// Access token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_lifetime: Option<i64>,

    /// Refresh token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_lifetime: Option<i64>,

    /// Inline JWKS holding the client's public keys for `private_key_jwt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,

    /// Expected certificate subject DN for `tls_client_auth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_auth_subject_dn: Option<String>,

    /// Expected base64url SHA-256 certificate thumbprint (`x5t#S256`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_certificate_thumbprint: Option<String>,

    /// Whether this client is a resource server allowed to introspect
    /// tokens it did not obtain itself.
    #[serde(default)]
    pub introspection_allowed: bool,

    /// Whether this client is currently active.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Client {
    /// Creates an active public client with no grants, scopes or redirect URIs.
    #[must_use]
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            client_secret_hash: None,
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            grant_types: Vec::new(),
            redirect_uris: Vec::new(),
            scopes: ScopeSet::new(),
            audience: Vec::new(),
            access_token_format: AccessTokenFormat::Jwt,
            access_token_lifetime: None,
            refresh_token_lifetime: None,
            jwks: None,
            tls_client_auth_subject_dn: None,
            tls_client_certificate_thumbprint: None,
            introspection_allowed: false,
            active: true,
        }
    }

    /// Sets the auth method and, for secret methods, the secret hash.
    #[must_use]
    pub fn with_auth_method(
        mut self,
        method: TokenEndpointAuthMethod,
        secret_hash: Option<String>,
    ) -> Self {
        self.token_endpoint_auth_method = method;
        self.client_secret_hash = secret_hash;
        self
    }

    /// Sets the allowed grant types.
    #[must_use]
    pub fn with_grant_types(mut self, grant_types: impl IntoIterator<Item = GrantType>) -> Self {
        self.grant_types = grant_types.into_iter().collect();
        self
    }

    /// Sets the registered redirect URIs.
    #[must_use]
    pub fn with_redirect_uris<S: Into<String>>(mut self, uris: impl IntoIterator<Item = S>) -> Self {
        self.redirect_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the allowed scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the token audience.
    #[must_use]
    pub fn with_audience<S: Into<String>>(mut self, audience: impl IntoIterator<Item = S>) -> Self {
        self.audience = audience.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the access token format.
    #[must_use]
    pub fn with_access_token_format(mut self, format: AccessTokenFormat) -> Self {
        self.access_token_format = format;
        self
    }

    /// Sets the access token lifetime in seconds.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, seconds: i64) -> Self {
        self.access_token_lifetime = Some(seconds);
        self
    }

    /// Sets the inline JWKS used for `private_key_jwt`.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JwkSet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Sets the expected TLS client certificate identity.
    #[must_use]
    pub fn with_tls_identity(
        mut self,
        subject_dn: Option<String>,
        thumbprint: Option<String>,
    ) -> Self {
        self.tls_client_auth_subject_dn = subject_dn;
        self.tls_client_certificate_thumbprint = thumbprint;
        self
    }

    /// Grants the introspection privilege.
    #[must_use]
    pub fn with_introspection(mut self, allowed: bool) -> Self {
        self.introspection_allowed = allowed;
        self
    }

    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is inconsistent.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        if !self.is_confidential() && self.grant_types.contains(&GrantType::ClientCredentials) {
            return Err(ClientValidationError::PublicClientCredentials);
        }

        match self.token_endpoint_auth_method {
            m if m.uses_secret() && self.client_secret_hash.is_none() => {
                return Err(ClientValidationError::MissingSecret);
            }
            TokenEndpointAuthMethod::PrivateKeyJwt
                if self.jwks.as_ref().is_none_or(|set| set.keys.is_empty()) =>
            {
                return Err(ClientValidationError::MissingJwks);
            }
            TokenEndpointAuthMethod::TlsClientAuth
                if self.tls_client_auth_subject_dn.is_none()
                    && self.tls_client_certificate_thumbprint.is_none() =>
            {
                return Err(ClientValidationError::MissingTlsIdentity);
            }
            _ => {}
        }

        if self.grant_types.contains(&GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        for uri in &self.redirect_uris {
            let parsed = url::Url::parse(uri)
                .map_err(|_| ClientValidationError::InvalidRedirectUri(uri.clone()))?;
            if parsed.fragment().is_some() {
                return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
            }
        }

        for lifetime in [self.access_token_lifetime, self.refresh_token_lifetime]
            .into_iter()
            .flatten()
        {
            if !(1..=MAX_TOKEN_LIFETIME_SECONDS).contains(&lifetime) {
                return Err(ClientValidationError::InvalidLifetime(lifetime));
            }
        }

        Ok(())
    }

    /// Returns `true` unless the client is public.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.token_endpoint_auth_method != TokenEndpointAuthMethod::None
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if every requested scope is allowed for this client.
    #[must_use]
    pub fn are_scopes_allowed(&self, requested: &ScopeSet) -> bool {
        requested.is_subset(&self.scopes)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }
}

/// Client validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID is empty.
    #[error("client_id cannot be empty")]
    EmptyClientId,

    /// No grant types specified.
    #[error("At least one grant type must be specified")]
    NoGrantTypes,

    /// Public client trying to use client_credentials.
    #[error("Public clients cannot use client_credentials grant")]
    PublicClientCredentials,

    /// Secret auth method without a secret hash.
    #[error("client_secret_basic and client_secret_post require a client secret")]
    MissingSecret,

    /// private_key_jwt without keys.
    #[error("private_key_jwt requires a non-empty jwks")]
    MissingJwks,

    /// tls_client_auth without an expected certificate identity.
    #[error("tls_client_auth requires a subject DN or certificate thumbprint")]
    MissingTlsIdentity,

    /// Authorization code flow without redirect URIs.
    #[error("Authorization code grant requires at least one redirect URI")]
    NoRedirectUris,

    /// Redirect URI is not an absolute URI or carries a fragment.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Token lifetime outside `1..=MAX_TOKEN_LIFETIME_SECONDS`.
    #[error("Token lifetime must be between 1 second and ten years, got {0}")]
    InvalidLifetime(i64),
}
