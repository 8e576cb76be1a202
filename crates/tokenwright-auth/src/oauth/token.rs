//! Token endpoint wire types (RFC 6749 sections 4 to 6).
//!
//! Errors use [`crate::error::ErrorResponse`].

use serde::{Deserialize, Serialize};

/// `client_assertion_type` value for RFC 7523 JWT client assertions.
pub const CLIENT_ASSERTION_TYPE_JWT_BEARER: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Token request parameters.
///
/// This structure handles all supported grant types. Different fields
/// are required depending on the `grant_type`:
///
/// - `authorization_code`: code, redirect_uri, code_verifier (PKCE)
/// - `refresh_token`: refresh_token, (optional) scope
/// - `client_credentials`: (optional) scope
///
/// Client credentials may also appear here (`client_secret_post`,
/// `private_key_jwt`, public clients); see
/// [`ClientCredentials::from_request`](crate::oauth::ClientCredentials::from_request).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type.
    pub grant_type: String,

    /// Authorization code (for authorization_code grant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Redirect URI (must match authorization request).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (for authorization_code grant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,

    /// Client ID (for public clients or client_secret_post).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret (for client_secret_post authentication).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Client assertion type (for private_key_jwt).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_assertion_type: Option<String>,

    /// Client assertion JWT (for private_key_jwt authentication).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_assertion: Option<String>,

    /// Refresh token (for refresh_token grant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Requested scope, space-delimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenRequest {
    /// Builds an `authorization_code` request.
    #[must_use]
    pub fn authorization_code(
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
        code_verifier: Option<String>,
    ) -> Self {
        Self {
            grant_type: "authorization_code".to_string(),
            code: Some(code.into()),
            redirect_uri: Some(redirect_uri.into()),
            code_verifier,
            ..Default::default()
        }
    }

    /// Builds a `client_credentials` request.
    #[must_use]
    pub fn client_credentials(scope: Option<String>) -> Self {
        Self {
            grant_type: "client_credentials".to_string(),
            scope,
            ..Default::default()
        }
    }

    /// Builds a `refresh_token` request.
    #[must_use]
    pub fn refresh(refresh_token: impl Into<String>, scope: Option<String>) -> Self {
        Self {
            grant_type: "refresh_token".to_string(),
            refresh_token: Some(refresh_token.into()),
            scope,
            ..Default::default()
        }
    }
}

/// Successful token response.
///
/// ```json
/// {
///   "access_token": "eyJhbG...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "openid profile",
///   "refresh_token": "tGzv3JOkF0XG5Qx2TlKWIA"
/// }
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Refresh token, when the client may use the refresh grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Creates a new token response with required fields.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_deserialization() {
        let json = r#"{
            "grant_type": "authorization_code",
            "code": "abc123",
            "redirect_uri": "https://app.example.com/callback",
            "code_verifier": "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
        }"#;

        let request: TokenRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.grant_type, "authorization_code");
        assert_eq!(request.code.as_deref(), Some("abc123"));
        assert!(request.client_secret.is_none());
        assert!(request.scope.is_none());
    }

    #[test]
    fn test_token_response_serialization() {
        let response = TokenResponse::new("at".to_string(), 3600, "openid".to_string());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"token_type\":\"Bearer\""));
        assert!(json.contains("\"expires_in\":3600"));
        assert!(!json.contains("refresh_token"));

        let response = response.with_refresh_token("rt".to_string());
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"refresh_token\":\"rt\""));
    }

    #[test]
    fn test_token_response_debug_redacts() {
        let response = TokenResponse::new("secret-at".to_string(), 60, String::new())
            .with_refresh_token("secret-rt".to_string());
        let debug = format!("{response:?}");
        assert!(!debug.contains("secret-at"));
        assert!(!debug.contains("secret-rt"));
    }

    #[test]
    fn test_request_builders() {
        let request = TokenRequest::refresh("rt", Some("openid".to_string()));
        assert_eq!(request.grant_type, "refresh_token");
        assert_eq!(request.refresh_token.as_deref(), Some("rt"));

        let request = TokenRequest::client_credentials(None);
        assert_eq!(request.grant_type, "client_credentials");
    }
}
