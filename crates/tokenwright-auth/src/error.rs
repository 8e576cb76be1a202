//! Error types for token issuance, introspection and client authentication.
//!
//! Every variant carries a `message` meant for logs. The message never
//! reaches the wire: [`AuthError::to_error_response`] maps each variant to
//! its RFC 6749 error code and a fixed description so responses cannot be
//! used to enumerate clients, codes or tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur while issuing, validating or introspecting tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Client authentication failed.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization code or refresh token is unknown, expired, used or revoked.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The requested scope is not permitted for the client.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The request is missing a parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The client is not allowed to use the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client is not authorized.
        message: String,
    },

    /// The grant type is not supported.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// Signing or key material failure.
    #[error("Signing error: {message}")]
    Signing {
        /// Description of the signing error.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidClient { .. }
                | Self::InvalidGrant { .. }
                | Self::InvalidScope { .. }
                | Self::InvalidRequest { .. }
                | Self::UnauthorizedClient { .. }
                | Self::UnsupportedGrantType { .. }
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } => ErrorCategory::Authentication,
            Self::InvalidGrant { .. } => ErrorCategory::Grant,
            Self::InvalidScope { .. } | Self::UnauthorizedClient { .. } => {
                ErrorCategory::Authorization
            }
            Self::InvalidRequest { .. } | Self::UnsupportedGrantType { .. } => {
                ErrorCategory::Validation
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Signing { .. } => ErrorCategory::Crypto,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> OAuthErrorCode {
        match self {
            Self::InvalidClient { .. } => OAuthErrorCode::InvalidClient,
            Self::InvalidGrant { .. } => OAuthErrorCode::InvalidGrant,
            Self::InvalidScope { .. } => OAuthErrorCode::InvalidScope,
            Self::InvalidRequest { .. } => OAuthErrorCode::InvalidRequest,
            Self::UnauthorizedClient { .. } => OAuthErrorCode::UnauthorizedClient,
            Self::UnsupportedGrantType { .. } => OAuthErrorCode::UnsupportedGrantType,
            Self::Storage { .. }
            | Self::Signing { .. }
            | Self::Configuration { .. }
            | Self::Internal { .. } => OAuthErrorCode::ServerError,
        }
    }

    /// Returns the HTTP status a transport layer should answer with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.oauth_error_code() {
            OAuthErrorCode::InvalidClient => 401,
            OAuthErrorCode::ServerError => 500,
            _ => 400,
        }
    }

    /// Converts this error into its wire representation.
    ///
    /// The description is fixed per error code; the internal message is
    /// intentionally dropped.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::from_code(self.oauth_error_code())
    }
}

/// OAuth 2.0 error codes (RFC 6749 section 5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// `invalid_request`
    InvalidRequest,
    /// `invalid_client`
    InvalidClient,
    /// `invalid_grant`
    InvalidGrant,
    /// `unauthorized_client`
    UnauthorizedClient,
    /// `unsupported_grant_type`
    UnsupportedGrantType,
    /// `invalid_scope`
    InvalidScope,
    /// `server_error`
    ServerError,
}

impl OAuthErrorCode {
    /// Returns the error code as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the fixed public description for this code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request is missing a parameter or is malformed",
            Self::InvalidClient => "Client authentication failed",
            Self::InvalidGrant => "The provided grant is invalid, expired or revoked",
            Self::UnauthorizedClient => "The client is not authorized to use this grant type",
            Self::UnsupportedGrantType => "The grant type is not supported",
            Self::InvalidScope => "The requested scope is invalid",
            Self::ServerError => "The server encountered an unexpected condition",
        }
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token endpoint error body.
///
/// ```json
/// {
///   "error": "invalid_grant",
///   "error_description": "The provided grant is invalid, expired or revoked"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// OAuth 2.0 error code.
    pub error: OAuthErrorCode,

    /// Human-readable error description.
    pub error_description: String,
}

impl ErrorResponse {
    /// Builds the response for an error code with its fixed description.
    #[must_use]
    pub fn from_code(code: OAuthErrorCode) -> Self {
        Self {
            error: code,
            error_description: code.description().to_string(),
        }
    }
}

impl From<&AuthError> for ErrorResponse {
    fn from(err: &AuthError) -> Self {
        err.to_error_response()
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client authentication failures.
    Authentication,
    /// Code and refresh token failures.
    Grant,
    /// Scope and grant permission failures.
    Authorization,
    /// Malformed requests.
    Validation,
    /// Storage failures.
    Infrastructure,
    /// Signing and key failures.
    Crypto,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::Grant => "grant",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Infrastructure => "infrastructure",
            Self::Crypto => "crypto",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::invalid_client("client not found");
        assert_eq!(err.to_string(), "Invalid client: client not found");

        let err = AuthError::invalid_grant("authorization code already used");
        assert_eq!(
            err.to_string(),
            "Invalid grant: authorization code already used"
        );

        let err = AuthError::unsupported_grant_type("password");
        assert_eq!(err.to_string(), "Unsupported grant type: password");
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::invalid_client("test").is_client_error());
        assert!(AuthError::invalid_scope("test").is_client_error());
        assert!(!AuthError::invalid_grant("test").is_server_error());

        assert!(AuthError::storage("down").is_server_error());
        assert!(AuthError::signing("bad key").is_server_error());
        assert!(!AuthError::internal("oops").is_client_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::invalid_client("test").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::invalid_grant("test").category(),
            ErrorCategory::Grant
        );
        assert_eq!(
            AuthError::invalid_scope("test").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            AuthError::storage("test").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(AuthError::signing("test").category(), ErrorCategory::Crypto);
    }

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(
            AuthError::invalid_client("test").oauth_error_code().as_str(),
            "invalid_client"
        );
        assert_eq!(
            AuthError::invalid_grant("test").oauth_error_code().as_str(),
            "invalid_grant"
        );
        assert_eq!(
            AuthError::invalid_scope("test").oauth_error_code().as_str(),
            "invalid_scope"
        );
        assert_eq!(
            AuthError::storage("test").oauth_error_code().as_str(),
            "server_error"
        );
        assert_eq!(
            AuthError::signing("test").oauth_error_code().as_str(),
            "server_error"
        );
    }

    #[test]
    fn test_error_response_hides_internal_message() {
        let err = AuthError::storage("connection to 10.0.0.5:5432 refused");
        let response = err.to_error_response();
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"error\":\"server_error\""));
        assert!(!json.contains("10.0.0.5"));

        let unknown = AuthError::invalid_client("no client with id 'abc'");
        let bad_secret = AuthError::invalid_client("secret mismatch for 'abc'");
        assert_eq!(unknown.to_error_response(), bad_secret.to_error_response());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(AuthError::invalid_client("x").http_status(), 401);
        assert_eq!(AuthError::invalid_grant("x").http_status(), 400);
        assert_eq!(AuthError::internal("x").http_status(), 500);
    }
}
