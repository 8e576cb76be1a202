mod common;

use std::sync::Arc;

use time::Duration;
use tokenwright_auth::prelude::*;

use common::{REDIRECT, authenticated_c1, c1, harness, resource_server};

fn code_for_c1(now: time::OffsetDateTime, value: &str) -> AuthorizationCode {
    AuthorizationCode {
        code: value.to_string(),
        client_id: "c1".to_string(),
        subject: "alice".to_string(),
        scopes: ScopeSet::parse("openid profile"),
        redirect_uri: REDIRECT.to_string(),
        code_challenge: None,
        nonce: None,
        created_at: now,
        expires_at: now + Duration::minutes(10),
    }
}

#[tokio::test]
async fn scope_outside_client_set_is_invalid_scope() {
    let h = harness();

    let err = h
        .server
        .factory()
        .create_access_token(&c1(), Some("alice"), &ScopeSet::parse("openid email"), None)
        .expect_err("email is not allowed for c1");

    assert!(matches!(err, AuthError::InvalidScope { .. }));
    assert_eq!(err.to_error_response().error, OAuthErrorCode::InvalidScope);
}

#[tokio::test]
async fn code_exchanged_twice_is_invalid_grant() {
    let h = harness();
    let store = h.server.token_store();
    store
        .put_code(&code_for_c1(h.clock.now(), "abc123"))
        .await
        .expect("store code");

    let request = TokenRequest::authorization_code("abc123", REDIRECT, None);
    let first = h
        .server
        .token_service()
        .handle(&request, &authenticated_c1())
        .await
        .expect("first exchange succeeds");
    assert_eq!(first.scope, "openid profile");

    h.clock.advance(Duration::seconds(1));
    let err = h
        .server
        .token_service()
        .handle(&request, &authenticated_c1())
        .await
        .expect_err("second exchange fails");
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exchange_has_one_winner() {
    let h = harness();
    h.server
        .token_store()
        .put_code(&code_for_c1(h.clock.now(), "contested"))
        .await
        .expect("store code");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let server = Arc::clone(&h.server);
        tasks.push(tokio::spawn(async move {
            let request = TokenRequest::authorization_code("contested", REDIRECT, None);
            server
                .token_service()
                .handle(&request, &authenticated_c1())
                .await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.expect("task completes") {
            Ok(_) => winners += 1,
            Err(err) => assert!(matches!(err, AuthError::InvalidGrant { .. })),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn token_past_its_window_is_inactive() {
    let h = harness();
    let issued = h
        .server
        .factory()
        .create_access_token(&c1(), Some("alice"), &ScopeSet::parse("openid"), Some(3600))
        .expect("token issued");
    h.server
        .token_store()
        .put_token(&issued.token)
        .await
        .expect("store token");

    let rs = resource_server();
    let engine = h.server.introspection();

    h.clock.advance(Duration::seconds(3599));
    assert!(engine.introspect(&issued.value, &rs).await.expect("introspect").active);

    h.clock.advance(Duration::seconds(2));
    let response = engine.introspect(&issued.value, &rs).await.expect("introspect");
    assert_eq!(response, IntrospectionResponse::inactive());
}

#[tokio::test]
async fn created_token_round_trips_through_introspection() {
    let h = harness();

    for format in [AccessTokenFormat::Jwt, AccessTokenFormat::Opaque] {
        let client = c1().with_access_token_format(format);
        let scopes = ScopeSet::parse("profile openid");
        let issued = h
            .server
            .factory()
            .create_access_token(&client, Some("alice"), &scopes, None)
            .expect("token issued");
        h.server
            .token_store()
            .put_token(&issued.token)
            .await
            .expect("store token");

        let response = h
            .server
            .introspection()
            .introspect(&issued.value, &client)
            .await
            .expect("introspect");
        assert!(response.active);
        assert_eq!(response.sub.as_deref(), Some("alice"));
        assert_eq!(
            response.scopes().into_iter().collect::<ScopeSet>(),
            scopes,
            "{format:?} token lost its scopes"
        );
    }
}

#[tokio::test]
async fn full_flow_through_the_server() {
    let h = harness();
    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::from_verifier(&verifier);

    let code = h
        .server
        .issue_authorization_code(
            "c1",
            "alice",
            &ScopeSet::parse("openid"),
            REDIRECT,
            Some(&challenge),
            None,
        )
        .await
        .expect("code issued");

    let c1_credentials = ClientCredentials::ClientSecretBasic {
        client_id: "c1".to_string(),
        client_secret: common::SECRET.to_string(),
    };
    let request = TokenRequest::authorization_code(
        &code.code,
        REDIRECT,
        Some(verifier.as_str().to_string()),
    );
    let tokens = h
        .server
        .token(&c1_credentials, &request)
        .await
        .expect("code exchanged");
    let refresh_token = tokens.refresh_token.clone().expect("refresh token issued");

    let rs_credentials = ClientCredentials::ClientSecretPost {
        client_id: "rs".to_string(),
        client_secret: "rs-secret".to_string(),
    };
    let introspection = IntrospectionRequest {
        token: tokens.access_token.clone(),
        token_type_hint: Some(TokenTypeHint::AccessToken),
    };
    let response = h
        .server
        .introspect(&rs_credentials, &introspection)
        .await
        .expect("introspected");
    assert!(response.active);
    assert_eq!(response.client_id.as_deref(), Some("c1"));

    // Refresh, then revoke everything the client holds
    let refreshed = h
        .server
        .token(&c1_credentials, &TokenRequest::refresh(&refresh_token, None))
        .await
        .expect("refreshed");
    assert_ne!(refreshed.access_token, tokens.access_token);

    h.server
        .revoke(&c1_credentials, &RevocationRequest::new(&tokens.access_token))
        .await
        .expect("revoked");
    let response = h
        .server
        .introspect(&rs_credentials, &introspection)
        .await
        .expect("introspected");
    assert!(!response.active);

    let revoked = h
        .server
        .revoke_client_tokens("c1")
        .await
        .expect("bulk revoke");
    assert!(revoked >= 2);
}
