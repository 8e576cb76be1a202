//! Client authentication for the token, introspection and revocation
//! endpoints.
//!
//! # Authentication Methods
//!
//! - `none` - Public clients (client_id only)
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in the request body
//! - `private_key_jwt` - Signed client assertion (RFC 7523)
//! - `tls_client_auth` - Mutual TLS client certificate (RFC 8705)
//!
//! Each client is registered with exactly one method and must use it.
//!
//! # Uniform Failures
//!
//! Every rejection (unknown client, inactive client, wrong method, bad
//! secret, bad assertion, certificate mismatch) produces the same
//! `InvalidClient` error. The specific reason is only logged at `debug`.
//! For the secret methods an Argon2 verification runs even when the client
//! is unknown, so response timing does not reveal which client ids exist.

use std::fmt;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{Jwk, PublicKeyUse};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use super::client_assertion::{
    ClientAssertionConfig, ClientAssertionValidator, UnverifiedAssertion,
};
use super::client_secret::{generate_client_secret, hash_client_secret, verify_client_secret};
use super::token::{CLIENT_ASSERTION_TYPE_JWT_BEARER, TokenRequest};
use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::storage::{ClientStorage, JtiStorage};
use crate::types::{Client, TokenEndpointAuthMethod};

const REJECTED: &str = "client authentication failed";

// =============================================================================
// Credentials
// =============================================================================

/// A verified TLS client certificate as reported by the TLS terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    /// Subject distinguished name.
    pub subject_dn: String,

    /// Base64url SHA-256 of the DER certificate (`x5t#S256`).
    pub thumbprint: String,
}

impl ClientCertificate {
    /// Creates a certificate from an already computed thumbprint.
    #[must_use]
    pub fn new(subject_dn: impl Into<String>, thumbprint: impl Into<String>) -> Self {
        Self {
            subject_dn: subject_dn.into(),
            thumbprint: thumbprint.into(),
        }
    }

    /// Creates a certificate from its DER encoding.
    #[must_use]
    pub fn from_der(subject_dn: impl Into<String>, der: &[u8]) -> Self {
        Self::new(subject_dn, Self::thumbprint_of(der))
    }

    /// Computes the `x5t#S256` thumbprint of a DER certificate.
    #[must_use]
    pub fn thumbprint_of(der: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(der))
    }
}

/// Credentials presented by a client, tagged by authentication method.
#[derive(Clone)]
pub enum ClientCredentials {
    /// HTTP Basic credentials.
    ClientSecretBasic {
        /// Client identifier.
        client_id: String,
        /// Plaintext secret.
        client_secret: String,
    },
    /// Secret in the request body.
    ClientSecretPost {
        /// Client identifier.
        client_id: String,
        /// Plaintext secret.
        client_secret: String,
    },
    /// Signed client assertion.
    PrivateKeyJwt {
        /// The assertion JWT.
        assertion: String,
    },
    /// Mutual TLS.
    TlsClientAuth {
        /// Client identifier from the request body.
        client_id: String,
        /// Certificate presented on the connection.
        certificate: ClientCertificate,
    },
    /// Public client, identified only.
    None {
        /// Client identifier.
        client_id: String,
    },
}

impl ClientCredentials {
    /// The method these credentials use.
    #[must_use]
    pub fn method(&self) -> TokenEndpointAuthMethod {
        match self {
            Self::ClientSecretBasic { .. } => TokenEndpointAuthMethod::ClientSecretBasic,
            Self::ClientSecretPost { .. } => TokenEndpointAuthMethod::ClientSecretPost,
            Self::PrivateKeyJwt { .. } => TokenEndpointAuthMethod::PrivateKeyJwt,
            Self::TlsClientAuth { .. } => TokenEndpointAuthMethod::TlsClientAuth,
            Self::None { .. } => TokenEndpointAuthMethod::None,
        }
    }

    /// The claimed client_id, when it is known before verification.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        match self {
            Self::ClientSecretBasic { client_id, .. }
            | Self::ClientSecretPost { client_id, .. }
            | Self::TlsClientAuth { client_id, .. }
            | Self::None { client_id } => Some(client_id),
            Self::PrivateKeyJwt { .. } => None,
        }
    }

    /// Extracts credentials from a request.
    ///
    /// Sources are considered in this order: the `Authorization: Basic`
    /// header, a client assertion, a body secret, a TLS client
    /// certificate, and finally a bare `client_id`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if more than one secret-bearing mechanism is used
    ///   or the assertion type is not supported
    /// - `InvalidClient` if the Basic header is malformed, disagrees with
    ///   the body `client_id`, or no credentials are present
    pub fn from_request(
        authorization_header: Option<&str>,
        request: &TokenRequest,
        certificate: Option<ClientCertificate>,
    ) -> AuthResult<Self> {
        let has_body_secret = request.client_secret.is_some();
        let has_assertion = request.client_assertion.is_some();

        if let Some(header) = authorization_header {
            let (client_id, client_secret) = parse_basic_auth(header)
                .ok_or_else(|| AuthError::invalid_client("malformed Basic authorization"))?;
            if has_body_secret || has_assertion {
                return Err(AuthError::invalid_request(
                    "multiple client authentication methods used",
                ));
            }
            if request
                .client_id
                .as_deref()
                .is_some_and(|body_id| body_id != client_id)
            {
                return Err(AuthError::invalid_client(
                    "client_id in body differs from Basic credentials",
                ));
            }
            return Ok(Self::ClientSecretBasic {
                client_id,
                client_secret,
            });
        }

        if let Some(assertion) = &request.client_assertion {
            if request.client_assertion_type.as_deref() != Some(CLIENT_ASSERTION_TYPE_JWT_BEARER) {
                return Err(AuthError::invalid_request(
                    "unsupported or missing client_assertion_type",
                ));
            }
            if has_body_secret {
                return Err(AuthError::invalid_request(
                    "multiple client authentication methods used",
                ));
            }
            return Ok(Self::PrivateKeyJwt {
                assertion: assertion.clone(),
            });
        }

        let Some(client_id) = request.client_id.clone() else {
            return Err(AuthError::invalid_client("no client credentials provided"));
        };

        if let Some(client_secret) = request.client_secret.clone() {
            return Ok(Self::ClientSecretPost {
                client_id,
                client_secret,
            });
        }

        if let Some(certificate) = certificate {
            return Ok(Self::TlsClientAuth {
                client_id,
                certificate,
            });
        }

        Ok(Self::None { client_id })
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("method", &self.method())
            .field("client_id", &self.client_id())
            .finish_non_exhaustive()
    }
}

/// Parses an HTTP Basic Auth header value into `(client_id, client_secret)`.
///
/// Both halves are `application/x-www-form-urlencoded` before being joined
/// (RFC 6749 section 2.3.1), so each is decoded after the split.
///
/// ```
/// use tokenwright_auth::oauth::parse_basic_auth;
///
/// // "client_id:client_secret"
/// let parsed = parse_basic_auth("Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=");
/// assert_eq!(
///     parsed,
///     Some(("client_id".to_string(), "client_secret".to_string()))
/// );
///
/// // "my%3Aclient:p%40ss+word"
/// let parsed = parse_basic_auth("Basic bXklM0FjbGllbnQ6cCU0MHNzK3dvcmQ=");
/// assert_eq!(
///     parsed,
///     Some(("my:client".to_string(), "p@ss word".to_string()))
/// );
/// ```
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::engine::general_purpose::STANDARD;

    let (scheme, encoded) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // The secret may itself contain colons
    let (client_id, client_secret) = credentials.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }

    Some((form_decode(client_id), form_decode(client_secret)))
}

/// Decodes one form-urlencoded component (`+` is a space).
fn form_decode(component: &str) -> String {
    // Literal separators are data here, not pair delimiters
    let escaped = component.replace('&', "%26").replace('=', "%3D");
    form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Authenticator
// =============================================================================

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client.
    pub client: Client,

    /// The authentication method used.
    pub auth_method: TokenEndpointAuthMethod,
}

/// Verifies client credentials against the client registry.
pub struct ClientAuthenticator {
    clients: Arc<dyn ClientStorage>,
    assertions: ClientAssertionValidator,
    dummy_hash: String,
}

impl ClientAuthenticator {
    /// Creates an authenticator.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the timing-equalization hash cannot be built.
    pub fn new(
        clients: Arc<dyn ClientStorage>,
        jti_storage: Arc<dyn JtiStorage>,
        assertion_config: ClientAssertionConfig,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        Ok(Self {
            clients,
            assertions: ClientAssertionValidator::new(assertion_config, jti_storage, clock),
            dummy_hash: hash_client_secret(&generate_client_secret())?,
        })
    }

    /// Authenticates `credentials`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` with a fixed message for every rejection and
    /// propagates storage failures unchanged.
    pub async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<AuthenticatedClient> {
        match self.verify(credentials).await {
            Ok(client) => {
                tracing::debug!(
                    client_id = %client.client_id,
                    method = %credentials.method(),
                    "Client authenticated"
                );
                Ok(AuthenticatedClient {
                    client,
                    auth_method: credentials.method(),
                })
            }
            Err(err) if err.is_client_error() => {
                tracing::debug!(
                    client_id = credentials.client_id().unwrap_or("<assertion>"),
                    method = %credentials.method(),
                    reason = %err,
                    "Client authentication failed"
                );
                Err(AuthError::invalid_client(REJECTED))
            }
            Err(err) => {
                tracing::error!(error = %err, "Client authentication could not complete");
                Err(err)
            }
        }
    }

    async fn verify(&self, credentials: &ClientCredentials) -> AuthResult<Client> {
        match credentials {
            ClientCredentials::ClientSecretBasic {
                client_id,
                client_secret,
            }
            | ClientCredentials::ClientSecretPost {
                client_id,
                client_secret,
            } => {
                self.verify_secret(client_id, client_secret, credentials.method())
                    .await
            }
            ClientCredentials::PrivateKeyJwt { assertion } => self.verify_assertion(assertion).await,
            ClientCredentials::TlsClientAuth {
                client_id,
                certificate,
            } => {
                let client = self.registered(client_id, credentials.method()).await?;
                verify_certificate(&client, certificate)?;
                Ok(client)
            }
            ClientCredentials::None { client_id } => {
                self.registered(client_id, credentials.method()).await
            }
        }
    }

    /// Loads an active client registered for `method`.
    async fn registered(
        &self,
        client_id: &str,
        method: TokenEndpointAuthMethod,
    ) -> AuthResult<Client> {
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client '{client_id}'")))?;
        check_registration(&client, method)?;
        Ok(client)
    }

    async fn verify_secret(
        &self,
        client_id: &str,
        secret: &str,
        method: TokenEndpointAuthMethod,
    ) -> AuthResult<Client> {
        let client = self.clients.find_by_client_id(client_id).await?;

        let hash = client
            .as_ref()
            .and_then(|c| c.client_secret_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());
        let secret = secret.to_string();
        let secret_matches =
            tokio::task::spawn_blocking(move || verify_client_secret(&secret, &hash))
                .await
                .map_err(|e| AuthError::internal(format!("secret verification task failed: {e}")))?;

        let client = client
            .ok_or_else(|| AuthError::invalid_client(format!("unknown client '{client_id}'")))?;
        check_registration(&client, method)?;
        if client.client_secret_hash.is_none() {
            return Err(AuthError::invalid_client("client has no secret"));
        }
        if !secret_matches {
            return Err(AuthError::invalid_client("client secret mismatch"));
        }
        Ok(client)
    }

    async fn verify_assertion(&self, assertion: &str) -> AuthResult<Client> {
        let peeked = UnverifiedAssertion::peek(assertion)?;
        let client = self
            .registered(&peeked.client_id, TokenEndpointAuthMethod::PrivateKeyJwt)
            .await?;

        let jwk = select_jwk(&client, peeked.kid.as_deref())?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::invalid_client(format!("registered JWK unusable: {e}")))?;

        self.assertions
            .validate(assertion, &client.client_id, &key, peeked.algorithm)
            .await?;
        Ok(client)
    }
}

impl fmt::Debug for ClientAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuthenticator")
            .field("assertions", &self.assertions)
            .finish_non_exhaustive()
    }
}

fn check_registration(client: &Client, method: TokenEndpointAuthMethod) -> AuthResult<()> {
    if !client.active {
        return Err(AuthError::invalid_client("client is inactive"));
    }
    if client.token_endpoint_auth_method != method {
        return Err(AuthError::invalid_client(format!(
            "client is registered for {}, presented {method}",
            client.token_endpoint_auth_method
        )));
    }
    Ok(())
}

fn select_jwk<'a>(client: &'a Client, kid: Option<&str>) -> AuthResult<&'a Jwk> {
    let signing_keys: Vec<&Jwk> = client
        .jwks
        .iter()
        .flat_map(|set| set.keys.iter())
        .filter(|k| !matches!(k.common.public_key_use, Some(PublicKeyUse::Encryption)))
        .collect();

    match kid {
        Some(kid) => signing_keys
            .into_iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| AuthError::invalid_client(format!("no registered key with kid '{kid}'"))),
        None => match signing_keys.as_slice() {
            [only] => Ok(only),
            _ => Err(AuthError::invalid_client(
                "assertion has no kid and the client has several keys",
            )),
        },
    }
}

fn verify_certificate(client: &Client, certificate: &ClientCertificate) -> AuthResult<()> {
    let mut checked = false;

    if let Some(expected) = &client.tls_client_certificate_thumbprint {
        let matches: bool = expected
            .as_bytes()
            .ct_eq(certificate.thumbprint.as_bytes())
            .into();
        if !matches {
            return Err(AuthError::invalid_client("certificate thumbprint mismatch"));
        }
        checked = true;
    }

    if let Some(expected) = &client.tls_client_auth_subject_dn {
        if expected != &certificate.subject_dn {
            return Err(AuthError::invalid_client("certificate subject DN mismatch"));
        }
        checked = true;
    }

    if !checked {
        return Err(AuthError::invalid_client(
            "client has no registered certificate identity",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::jwk::JwkSet;
    use time::macros::datetime;

    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::{InMemoryClientStorage, InMemoryJtiStorage};
    use crate::token::keys::{SigningAlgorithm, SigningKeyPair};
    use crate::types::GrantType;

    const ENDPOINT: &str = "https://auth.example.com/token";

    struct Fixture {
        authenticator: ClientAuthenticator,
        clients: Arc<InMemoryClientStorage>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00 UTC)));
        let clients = Arc::new(InMemoryClientStorage::new());
        let authenticator = ClientAuthenticator::new(
            clients.clone(),
            Arc::new(InMemoryJtiStorage::new(clock.clone())),
            ClientAssertionConfig::new(ENDPOINT),
            clock.clone(),
        )
        .unwrap();
        Fixture {
            authenticator,
            clients,
            clock,
        }
    }

    async fn register_secret_client(f: &Fixture, method: TokenEndpointAuthMethod) {
        let client = Client::new("web-app", "Web App")
            .with_auth_method(method, Some(hash_client_secret("s3cret").unwrap()))
            .with_grant_types([GrantType::ClientCredentials]);
        f.clients.register(client).await.unwrap();
    }

    fn basic(id: &str, secret: &str) -> ClientCredentials {
        ClientCredentials::ClientSecretBasic {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
        }
    }

    #[tokio::test]
    async fn test_client_secret_basic() {
        let f = fixture();
        register_secret_client(&f, TokenEndpointAuthMethod::ClientSecretBasic).await;

        let auth = f
            .authenticator
            .authenticate(&basic("web-app", "s3cret"))
            .await
            .unwrap();
        assert_eq!(auth.client.client_id, "web-app");
        assert_eq!(auth.auth_method, TokenEndpointAuthMethod::ClientSecretBasic);
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let f = fixture();
        register_secret_client(&f, TokenEndpointAuthMethod::ClientSecretBasic).await;

        let wrong_secret = f
            .authenticator
            .authenticate(&basic("web-app", "nope"))
            .await
            .unwrap_err();
        let unknown = f
            .authenticator
            .authenticate(&basic("ghost", "s3cret"))
            .await
            .unwrap_err();
        let wrong_method = f
            .authenticator
            .authenticate(&ClientCredentials::ClientSecretPost {
                client_id: "web-app".to_string(),
                client_secret: "s3cret".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong_secret.to_string(), unknown.to_string());
        assert_eq!(unknown.to_string(), wrong_method.to_string());
        assert_eq!(wrong_secret.to_error_response(), unknown.to_error_response());
        assert!(matches!(unknown, AuthError::InvalidClient { .. }));
    }

    #[tokio::test]
    async fn test_inactive_client_rejected() {
        let f = fixture();
        let mut client = Client::new("web-app", "Web App")
            .with_auth_method(
                TokenEndpointAuthMethod::ClientSecretPost,
                Some(hash_client_secret("s3cret").unwrap()),
            )
            .with_grant_types([GrantType::ClientCredentials]);
        client.active = false;
        f.clients.register(client).await.unwrap();

        let result = f
            .authenticator
            .authenticate(&ClientCredentials::ClientSecretPost {
                client_id: "web-app".to_string(),
                client_secret: "s3cret".to_string(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_public_client() {
        let f = fixture();
        f.clients
            .register(
                Client::new("spa", "SPA")
                    .with_grant_types([GrantType::AuthorizationCode])
                    .with_redirect_uris(["https://spa.example.com/cb"]),
            )
            .await
            .unwrap();

        let auth = f
            .authenticator
            .authenticate(&ClientCredentials::None {
                client_id: "spa".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(auth.auth_method, TokenEndpointAuthMethod::None);

        // A confidential client cannot downgrade to public
        register_secret_client(&f, TokenEndpointAuthMethod::ClientSecretBasic).await;
        assert!(
            f.authenticator
                .authenticate(&ClientCredentials::None {
                    client_id: "web-app".to_string(),
                })
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_tls_client_auth() {
        let f = fixture();
        let cert = ClientCertificate::from_der("CN=billing,O=Example", b"fake der bytes");
        f.clients
            .register(
                Client::new("billing", "Billing")
                    .with_auth_method(TokenEndpointAuthMethod::TlsClientAuth, None)
                    .with_tls_identity(None, Some(cert.thumbprint.clone()))
                    .with_grant_types([GrantType::ClientCredentials]),
            )
            .await
            .unwrap();

        let ok = ClientCredentials::TlsClientAuth {
            client_id: "billing".to_string(),
            certificate: cert,
        };
        assert!(f.authenticator.authenticate(&ok).await.is_ok());

        let other = ClientCredentials::TlsClientAuth {
            client_id: "billing".to_string(),
            certificate: ClientCertificate::from_der("CN=billing,O=Example", b"other der"),
        };
        assert!(f.authenticator.authenticate(&other).await.is_err());
    }

    #[tokio::test]
    async fn test_private_key_jwt() {
        let f = fixture();
        let key = SigningKeyPair::generate(SigningAlgorithm::ES384)
            .unwrap()
            .with_kid("backend-key");
        let jwks: JwkSet =
            serde_json::from_value(serde_json::json!({ "keys": [key.to_jwk()] })).unwrap();
        f.clients
            .register(
                Client::new("backend", "Backend")
                    .with_auth_method(TokenEndpointAuthMethod::PrivateKeyJwt, None)
                    .with_jwks(jwks)
                    .with_grant_types([GrantType::ClientCredentials]),
            )
            .await
            .unwrap();

        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::ES384);
        header.kid = Some("backend-key".to_string());
        let assertion = jsonwebtoken::encode(
            &header,
            &serde_json::json!({
                "iss": "backend",
                "sub": "backend",
                "aud": ENDPOINT,
                "exp": f.clock.unix_timestamp() + 60,
                "jti": "assertion-1",
            }),
            key.encoding_key(),
        )
        .unwrap();

        let credentials = ClientCredentials::PrivateKeyJwt { assertion };
        let auth = f.authenticator.authenticate(&credentials).await.unwrap();
        assert_eq!(auth.client.client_id, "backend");

        // Replay
        let err = f.authenticator.authenticate(&credentials).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Invalid client: {REJECTED}"));
    }

    #[test]
    fn test_from_request_priority() {
        let mut request = TokenRequest::client_credentials(None);
        request.client_id = Some("web-app".to_string());

        let creds = ClientCredentials::from_request(
            Some("Basic d2ViLWFwcDpzM2NyZXQ="),
            &request,
            None,
        )
        .unwrap();
        assert_eq!(creds.method(), TokenEndpointAuthMethod::ClientSecretBasic);

        request.client_secret = Some("s3cret".to_string());
        let creds = ClientCredentials::from_request(None, &request, None).unwrap();
        assert_eq!(creds.method(), TokenEndpointAuthMethod::ClientSecretPost);

        let err = ClientCredentials::from_request(
            Some("Basic d2ViLWFwcDpzM2NyZXQ="),
            &request,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));

        request.client_secret = None;
        let cert = ClientCertificate::new("CN=web", "thumb");
        let creds = ClientCredentials::from_request(None, &request, Some(cert)).unwrap();
        assert_eq!(creds.method(), TokenEndpointAuthMethod::TlsClientAuth);

        let creds = ClientCredentials::from_request(None, &request, None).unwrap();
        assert_eq!(creds.method(), TokenEndpointAuthMethod::None);

        request.client_id = None;
        assert!(ClientCredentials::from_request(None, &request, None).is_err());
    }

    #[test]
    fn test_from_request_assertion_type_checked() {
        let mut request = TokenRequest::client_credentials(None);
        request.client_assertion = Some("a.b.c".to_string());
        request.client_assertion_type = Some("urn:example:unknown".to_string());
        assert!(matches!(
            ClientCredentials::from_request(None, &request, None),
            Err(AuthError::InvalidRequest { .. })
        ));

        request.client_assertion_type = Some(CLIENT_ASSERTION_TYPE_JWT_BEARER.to_string());
        let creds = ClientCredentials::from_request(None, &request, None).unwrap();
        assert_eq!(creds.method(), TokenEndpointAuthMethod::PrivateKeyJwt);
        assert_eq!(creds.client_id(), None);
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth("Basic d2ViLWFwcDpzM2M6cmV0"),
            Some(("web-app".to_string(), "s3c:ret".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
    }

    #[test]
    fn test_parse_basic_auth_form_decodes_both_halves() {
        use base64::engine::general_purpose::STANDARD;

        let header = format!("Basic {}", STANDARD.encode("svc%3Aone:a%2Bb+c%25d"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("svc:one".to_string(), "a+b c%d".to_string()))
        );

        // Unencoded separators survive as-is
        let header = format!("Basic {}", STANDARD.encode("web-app:x=y&z"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("web-app".to_string(), "x=y&z".to_string()))
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let debug = format!("{:?}", basic("web-app", "hunter2"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("web-app"));
    }
}
