use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokenwright_auth::prelude::*;

use crate::cli::{DemoArgs, OutputFormat};
use crate::config::{self, RegisteredClient};
use crate::output::{print_rows, print_step, print_success};

/// Walks every grant against an in-process server built from the registry.
pub async fn run(config_path: Option<&Path>, args: &DemoArgs, format: OutputFormat) -> Result<()> {
    let loaded = config::load_or_demo(config_path)?;
    let clients = InMemoryClientStorage::with_clients(
        loaded.clients.iter().map(|c| c.client.clone()),
    )?;
    let server = AuthorizationServer::builder(loaded.auth)
        .with_clients(Arc::new(clients))
        .build()?;

    let app = loaded
        .clients
        .iter()
        .find(|c| {
            c.client.is_grant_type_allowed(GrantType::AuthorizationCode)
                && !c.client.redirect_uris.is_empty()
                && credentials_for(c).is_some()
        })
        .context("registry has no authorization_code client with usable credentials")?;
    let app_credentials = credentials_for(app).context("app credentials")?;
    let redirect_uri = app.client.redirect_uris[0].as_str();

    let mut report = Vec::new();

    print_step(&format!(
        "Authorization code for {} as {}",
        app.client.client_id.cyan(),
        args.subject
    ));
    let verifier = PkceVerifier::generate();
    let code = server
        .issue_authorization_code(
            &app.client.client_id,
            &args.subject,
            &app.client.scopes,
            redirect_uri,
            Some(&PkceChallenge::from_verifier(&verifier)),
            None,
        )
        .await?;
    let request = TokenRequest::authorization_code(
        &code.code,
        redirect_uri,
        Some(verifier.as_str().to_string()),
    );
    let tokens = server.token(&app_credentials, &request).await?;
    report.push(row("authorization_code", &app.client.client_id, &tokens.scope));

    match resource_server(&loaded.clients) {
        Some((rs, rs_credentials)) => {
            print_step(&format!("Introspection by {}", rs.client.client_id.cyan()));
            let introspection = IntrospectionRequest {
                token: tokens.access_token.clone(),
                token_type_hint: Some(TokenTypeHint::AccessToken),
            };
            let response = server.introspect(&rs_credentials, &introspection).await?;
            report.push(row("introspect", &rs.client.client_id, &active(response.active)));
        }
        None => report.push(row("introspect", "-", "skipped: no resource server")),
    }

    let mut latest_access = tokens.access_token.clone();
    if let Some(refresh_token) = &tokens.refresh_token {
        print_step("Refresh");
        let refreshed = server
            .token(&app_credentials, &TokenRequest::refresh(refresh_token, None))
            .await?;
        report.push(row("refresh_token", &app.client.client_id, &refreshed.scope));
        latest_access = refreshed.access_token;
    }

    let service = loaded.clients.iter().find(|c| {
        c.client.is_grant_type_allowed(GrantType::ClientCredentials) && credentials_for(c).is_some()
    });
    if let Some(service) = service {
        print_step(&format!("Client credentials for {}", service.client.client_id.cyan()));
        let credentials = credentials_for(service).context("service credentials")?;
        let response = server
            .token(&credentials, &TokenRequest::client_credentials(None))
            .await?;
        report.push(row("client_credentials", &service.client.client_id, &response.scope));
    }

    print_step("Revocation");
    server
        .revoke(&app_credentials, &RevocationRequest::new(&latest_access))
        .await?;
    let after = server
        .introspection()
        .introspect(&latest_access, &app.client)
        .await?;
    report.push(row("revoke", &app.client.client_id, &active(after.active)));

    let swept = server.revoke_client_tokens(&app.client.client_id).await?;
    report.push(row(
        "revoke_client_tokens",
        &app.client.client_id,
        &format!("{swept} tokens"),
    ));

    print_rows(&["Step", "Client", "Result"], &report, format);
    print_success("Demo completed");
    Ok(())
}

/// Credentials the demo can present for a registry entry.
fn credentials_for(entry: &RegisteredClient) -> Option<ClientCredentials> {
    let client_id = entry.client.client_id.clone();
    match entry.client.token_endpoint_auth_method {
        TokenEndpointAuthMethod::ClientSecretBasic => Some(ClientCredentials::ClientSecretBasic {
            client_id,
            client_secret: entry.secret.clone()?,
        }),
        TokenEndpointAuthMethod::ClientSecretPost => Some(ClientCredentials::ClientSecretPost {
            client_id,
            client_secret: entry.secret.clone()?,
        }),
        TokenEndpointAuthMethod::None => Some(ClientCredentials::None { client_id }),
        // Needs key material or a certificate the registry does not hold
        TokenEndpointAuthMethod::PrivateKeyJwt | TokenEndpointAuthMethod::TlsClientAuth => None,
    }
}

fn resource_server(clients: &[RegisteredClient]) -> Option<(&RegisteredClient, ClientCredentials)> {
    clients
        .iter()
        .filter(|c| c.client.introspection_allowed)
        .find_map(|c| credentials_for(c).map(|creds| (c, creds)))
}

fn active(active: bool) -> String {
    let state = if active { "active" } else { "inactive" };
    state.to_string()
}

fn row(step: &str, client_id: &str, result: &str) -> Vec<String> {
    vec![step.to_string(), client_id.to_string(), result.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_runs_against_builtin_registry() {
        let args = DemoArgs {
            subject: "alice".to_string(),
        };
        run(None, &args, OutputFormat::Json).await.unwrap();
    }

    #[test]
    fn secretless_entries_have_no_credentials() {
        let loaded = config::load_or_demo(None).unwrap();
        let mut web = RegisteredClient {
            client: loaded.clients[0].client.clone(),
            secret: None,
        };
        assert!(credentials_for(&web).is_none());

        web.secret = Some("web-secret".to_string());
        assert!(matches!(
            credentials_for(&web),
            Some(ClientCredentials::ClientSecretBasic { .. })
        ));
    }
}
