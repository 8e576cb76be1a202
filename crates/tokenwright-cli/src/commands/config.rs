use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config;
use crate::output::{print_rows, print_success, print_value};

pub fn check(path: &Path, format: OutputFormat) -> Result<()> {
    let loaded = config::load(path)?;
    let auth = &loaded.auth;

    match format {
        OutputFormat::Json => {
            let clients: Vec<_> = loaded
                .clients
                .iter()
                .map(|c| {
                    json!({
                        "client_id": c.client.client_id,
                        "auth_method": c.client.token_endpoint_auth_method,
                        "grant_types": c.client.grant_types,
                        "scopes": c.client.scopes,
                        "introspection_allowed": c.client.introspection_allowed,
                    })
                })
                .collect();
            print_value(
                &json!({
                    "valid": true,
                    "issuer": auth.issuer,
                    "token_endpoint": auth.token_endpoint(),
                    "tokens": auth.tokens,
                    "signing": auth.signing,
                    "introspection": auth.introspection,
                    "clients": clients,
                }),
                format,
            );
        }
        OutputFormat::Table => {
            print_success(&format!("{} is valid", path.display()));
            println!("{}: {}", "Issuer".cyan(), auth.issuer);
            println!("{}: {}", "Token endpoint".cyan(), auth.token_endpoint());
            println!(
                "{}: {:?} (max {:?})",
                "Access token lifetime".cyan(),
                auth.tokens.access_token_lifetime,
                auth.tokens.max_access_token_lifetime
            );
            println!(
                "{}: {} with {:?} overlap",
                "Signing".cyan(),
                auth.signing.algorithm,
                auth.signing.key_overlap
            );

            let rows: Vec<Vec<String>> = loaded
                .clients
                .iter()
                .map(|c| {
                    vec![
                        c.client.client_id.clone(),
                        c.client.token_endpoint_auth_method.to_string(),
                        c.client
                            .grant_types
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" "),
                        c.client.scopes.to_scope_string(),
                    ]
                })
                .collect();
            if rows.is_empty() {
                println!("No clients registered.");
            } else {
                print_rows(&["Client", "Auth method", "Grants", "Scopes"], &rows, format);
            }
        }
    }
    Ok(())
}
