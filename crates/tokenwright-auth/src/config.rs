//! Token core configuration.
//!
//! Lifetimes are written in humantime form (`"10m"`, `"1h"`, `"30d"`) and
//! every section falls back to its defaults when omitted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::token::keys::SigningAlgorithm;
use crate::types::MAX_TOKEN_LIFETIME_SECONDS;

/// Root configuration.
///
/// # Example (TOML)
///
/// ```toml
/// issuer = "https://auth.example.com"
/// audience = ["https://api.example.com"]
///
/// [tokens]
/// access_token_lifetime = "1h"
/// refresh_token_lifetime = "30d"
///
/// [signing]
/// algorithm = "ES384"
/// key_overlap = "1d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL placed in the `iss` claim of self-contained tokens.
    pub issuer: String,

    /// Default audience for clients that do not register one.
    pub audience: Vec<String>,

    /// Code and token lifetimes.
    pub tokens: TokenConfig,

    /// Token signing.
    pub signing: SigningConfig,

    /// Client authentication.
    pub client_auth: ClientAuthConfig,

    /// Introspection access control.
    pub introspection: IntrospectionConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            audience: Vec::new(),
            tokens: TokenConfig::default(),
            signing: SigningConfig::default(),
            client_auth: ClientAuthConfig::default(),
            introspection: IntrospectionConfig::default(),
        }
    }
}

/// Code and token lifetimes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime for clients without their own.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Upper bound for any access token lifetime, including overrides.
    #[serde(with = "humantime_serde")]
    pub max_access_token_lifetime: Duration,

    /// Refresh token lifetime for clients without their own.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Issue a new refresh token on every refresh and revoke the old one.
    pub refresh_token_rotation: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            max_access_token_lifetime: Duration::from_secs(24 * 3600),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
            refresh_token_rotation: true,
        }
    }
}

/// Token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Algorithm for generated keys.
    pub algorithm: SigningAlgorithm,

    /// PKCS#8 PEM private key. A fresh key is generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    /// Key ID for the key at `private_key_path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    /// How long a rotated-out key keeps verifying tokens.
    #[serde(with = "humantime_serde")]
    pub key_overlap: Duration,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::ES384,
            private_key_path: None,
            key_id: None,
            key_overlap: Duration::from_secs(24 * 3600),
        }
    }
}

/// Client authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientAuthConfig {
    /// Token endpoint URL expected in assertion `aud`. Defaults to
    /// `{issuer}/token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// Maximum remaining lifetime of a client assertion.
    #[serde(with = "humantime_serde")]
    pub assertion_max_lifetime: Duration,
}

impl Default for ClientAuthConfig {
    fn default() -> Self {
        Self {
            token_endpoint: None,
            assertion_max_lifetime: Duration::from_secs(300),
        }
    }
}

/// Introspection access control (RFC 7662 section 2.1).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntrospectionConfig {
    /// Allow a client to introspect tokens issued to itself.
    pub allow_owner: bool,

    /// Require privileged introspecting clients to be named in the token
    /// audience.
    pub require_audience_match: bool,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            allow_owner: true,
            require_audience_match: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::configuration(err.to_string())
    }
}

impl AuthConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML or `InvalidValue` if validation
    /// fails.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Token endpoint URL used as the expected assertion audience.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.client_auth
            .token_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/token", self.issuer.trim_end_matches('/')))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty or not an absolute URL
    /// - Any lifetime or the key overlap is zero or longer than ten years
    /// - The default access token lifetime exceeds the maximum
    /// - The key overlap is shorter than the maximum access token lifetime
    /// - A key ID is set without a key file
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }
        url::Url::parse(&self.issuer).map_err(|e| {
            ConfigError::InvalidValue(format!("issuer '{}' is not a URL: {e}", self.issuer))
        })?;

        let lifetimes = [
            (
                "authorization_code_lifetime",
                self.tokens.authorization_code_lifetime,
            ),
            ("access_token_lifetime", self.tokens.access_token_lifetime),
            (
                "max_access_token_lifetime",
                self.tokens.max_access_token_lifetime,
            ),
            ("refresh_token_lifetime", self.tokens.refresh_token_lifetime),
            (
                "assertion_max_lifetime",
                self.client_auth.assertion_max_lifetime,
            ),
            ("key_overlap", self.signing.key_overlap),
        ];
        for (name, value) in lifetimes {
            if value.as_secs() == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be at least one second"
                )));
            }
            if whole_seconds(value) > MAX_TOKEN_LIFETIME_SECONDS {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must not exceed ten years"
                )));
            }
        }

        if self.tokens.access_token_lifetime > self.tokens.max_access_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime exceeds max_access_token_lifetime".to_string(),
            ));
        }

        // A key must outlive every token it signed
        if self.signing.key_overlap < self.tokens.max_access_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "key_overlap must be at least max_access_token_lifetime".to_string(),
            ));
        }

        if self.signing.key_id.is_some() && self.signing.private_key_path.is_none() {
            return Err(ConfigError::Missing(
                "signing.private_key_path (required when key_id is set)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Whole seconds of a configured duration, saturating.
pub(crate) fn whole_seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}
