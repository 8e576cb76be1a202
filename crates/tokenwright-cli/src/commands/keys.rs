use std::fs;

use anyhow::{Context, Result};
use tokenwright_auth::prelude::*;

use crate::cli::{GenerateKeyArgs, OutputFormat};
use crate::output::{print_success, print_value};

pub fn generate(args: &GenerateKeyArgs, format: OutputFormat) -> Result<()> {
    let mut key = SigningKeyPair::generate(args.algorithm.into())?;
    if let Some(kid) = &args.kid {
        key = key.with_kid(kid.as_str());
    }

    match &args.out {
        Some(path) => {
            fs::write(path, key.private_key_pem())
                .with_context(|| format!("Cannot write {}", path.display()))?;
            print_success(&format!(
                "Wrote {} private key '{}' to {}",
                key.algorithm,
                key.kid,
                path.display()
            ));
        }
        None => print!("{}", key.private_key_pem()),
    }

    print_value(&serde_json::to_value(key.to_jwk())?, format);
    Ok(())
}
