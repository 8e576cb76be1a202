use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokenwright_auth::prelude::SigningAlgorithm;

#[derive(Parser)]
#[command(name = "tokenwright")]
#[command(about = "Tokenwright CLI: inspect configuration, manage keys and exercise the token core")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "TOKENWRIGHT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect configuration
    Config(ConfigArgs),
    /// Manage signing keys
    Keys(KeysArgs),
    /// Manage client registrations
    Client(ClientArgs),
    /// Run every grant against the configured clients in-process
    Demo(DemoArgs),
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Load, validate and summarise the configuration file
    Check,
}

#[derive(clap::Args)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommands,
}

#[derive(Subcommand)]
pub enum KeysCommands {
    /// Generate a signing key and print its public JWK
    Generate(GenerateKeyArgs),
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum KeyAlgorithm {
    Rs256,
    Rs384,
    #[default]
    Es384,
}

impl From<KeyAlgorithm> for SigningAlgorithm {
    fn from(value: KeyAlgorithm) -> Self {
        match value {
            KeyAlgorithm::Rs256 => Self::RS256,
            KeyAlgorithm::Rs384 => Self::RS384,
            KeyAlgorithm::Es384 => Self::ES384,
        }
    }
}

#[derive(clap::Args)]
pub struct GenerateKeyArgs {
    /// Signing algorithm
    #[arg(long, default_value = "es384")]
    pub algorithm: KeyAlgorithm,
    /// Key ID (random when omitted)
    #[arg(long)]
    pub kid: Option<String>,
    /// Write the private key PEM here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ClientArgs {
    #[command(subcommand)]
    pub command: ClientCommands,
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Hash a client secret for the `secret_hash` field of a registry entry
    HashSecret(HashSecretArgs),
}

#[derive(clap::Args)]
pub struct HashSecretArgs {
    /// Secret to hash (a new one is generated when omitted)
    pub secret: Option<String>,
}

#[derive(clap::Args)]
pub struct DemoArgs {
    /// Resource owner the demo authorization code is issued for
    #[arg(long, default_value = "alice")]
    pub subject: String,
}
