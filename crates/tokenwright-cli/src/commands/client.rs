use anyhow::Result;
use serde_json::json;
use tokenwright_auth::oauth::client_secret::{generate_client_secret, hash_client_secret};

use crate::cli::{HashSecretArgs, OutputFormat};
use crate::output::print_value;

pub fn hash_secret(args: &HashSecretArgs, format: OutputFormat) -> Result<()> {
    let generated = args.secret.is_none();
    let secret = args.secret.clone().unwrap_or_else(generate_client_secret);
    let hash = hash_client_secret(&secret)?;

    // Only echo the secret back when we made it up
    let value = if generated {
        json!({ "client_secret": secret, "client_secret_hash": hash })
    } else {
        json!({ "client_secret_hash": hash })
    };
    print_value(&value, format);
    Ok(())
}
