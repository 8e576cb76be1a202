use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokenwright_auth::oauth::client_secret::hash_client_secret;
use tokenwright_auth::prelude::*;

/// Configuration file as the CLI reads it: the token core settings plus a
/// static client registry.
#[derive(Debug, Deserialize, Default)]
pub struct CliConfig {
    #[serde(flatten)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub clients: Vec<ClientEntry>,
}

/// A `[[clients]]` entry. `secret` is plaintext and replaced by its hash at
/// load; `client_secret_hash` may be given directly instead.
#[derive(Debug, Deserialize)]
pub struct ClientEntry {
    #[serde(flatten)]
    pub client: Client,

    #[serde(default)]
    pub secret: Option<String>,
}

/// A registry client ready for [`InMemoryClientStorage`], with the plaintext
/// secret kept only when the file carried one.
pub struct RegisteredClient {
    pub client: Client,
    pub secret: Option<String>,
}

pub struct LoadedConfig {
    pub auth: AuthConfig,
    pub clients: Vec<RegisteredClient>,
}

pub fn parse(content: &str) -> Result<LoadedConfig> {
    let raw: CliConfig = toml::from_str(content).context("Invalid configuration file")?;
    raw.auth.validate()?;

    let clients = raw
        .clients
        .into_iter()
        .map(|entry| {
            let mut client = entry.client;
            if let Some(secret) = &entry.secret {
                anyhow::ensure!(
                    client.client_secret_hash.is_none(),
                    "client '{}' sets both secret and client_secret_hash",
                    client.client_id
                );
                client.client_secret_hash = Some(hash_client_secret(secret)?);
            }
            client
                .validate()
                .with_context(|| format!("client '{}' is invalid", client.client_id))?;
            Ok(RegisteredClient {
                client,
                secret: entry.secret,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LoadedConfig {
        auth: raw.auth,
        clients,
    })
}

pub fn load(path: &Path) -> Result<LoadedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to load {}", path.display()))
}

/// Loads `path`, or falls back to the built-in demo registry.
pub fn load_or_demo(path: Option<&Path>) -> Result<LoadedConfig> {
    match path {
        Some(path) => load(path),
        None => parse(DEMO_CONFIG),
    }
}

const DEMO_CONFIG: &str = r#"
issuer = "https://auth.example.com"

[[clients]]
client_id = "web"
name = "Demo Web App"
token_endpoint_auth_method = "client_secret_basic"
secret = "web-secret"
grant_types = ["authorization_code", "refresh_token"]
redirect_uris = ["https://app.example.com/callback"]
scopes = "openid profile"

[[clients]]
client_id = "api"
name = "Demo Resource Server"
token_endpoint_auth_method = "client_secret_post"
secret = "api-secret"
grant_types = ["client_credentials"]
scopes = "jobs.read"
introspection_allowed = true
"#;

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn demo_registry_loads() {
        let loaded = load_or_demo(None).unwrap();
        assert_eq!(loaded.auth.issuer, "https://auth.example.com");
        assert_eq!(loaded.clients.len(), 2);

        let web = &loaded.clients[0];
        assert_eq!(web.secret.as_deref(), Some("web-secret"));
        let hash = web.client.client_secret_hash.as_deref().unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(loaded.clients[1].client.introspection_allowed);
    }

    #[test]
    fn secret_and_hash_together_is_rejected() {
        let content = r#"
issuer = "https://auth.example.com"

[[clients]]
client_id = "x"
name = "X"
token_endpoint_auth_method = "client_secret_basic"
secret = "s"
client_secret_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
grant_types = ["client_credentials"]
"#;
        let err = parse(content).err().unwrap();
        assert!(format!("{err:#}").contains("both secret and client_secret_hash"));
    }

    #[test]
    fn invalid_core_settings_fail_before_clients() {
        let err = parse("issuer = \"\"").err().unwrap();
        assert!(format!("{err:#}").contains("issuer"));
    }

    #[test]
    fn load_reads_lifetimes_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "issuer = \"https://auth.example.com\"\n\n[tokens]\naccess_token_lifetime = \"15m\""
        )
        .unwrap();

        let loaded = load(file.path()).unwrap();
        assert_eq!(
            loaded.auth.tokens.access_token_lifetime,
            std::time::Duration::from_secs(900)
        );
        assert!(loaded.clients.is_empty());
    }
}
