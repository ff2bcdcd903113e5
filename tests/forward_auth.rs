//! Router-level tests for the forward-auth decision endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use hostgate::gateway::{GatewayConfig, X_AUTH_USER_ID};
use hostgate::session::MemoryBackend;

mod common;
use common::{
    BrokenRegistry, BrokenSettings, DownBackend, Harness, LOGIN, StuckRegistry, cookie, directory,
    location, verify,
};

#[tokio::test]
async fn subdomain_without_session_starts_handshake() {
    let harness = Harness::new();

    let response = harness
        .send(verify("app1.login.example", "/dashboard", None))
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "https://login.example/sso/init?target=https%3A%2F%2Fapp1.login.example%2Fdashboard"
    );
    assert!(
        response.headers()[CACHE_CONTROL]
            .to_str()
            .unwrap()
            .contains("no-store")
    );
}

#[tokio::test]
async fn public_app_on_custom_domain_passes_without_session() {
    let harness = Harness::new();

    let response = harness.send(verify("docs.customer.com", "/guide", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(X_AUTH_USER_ID).is_none());
    assert!(response.headers().contains_key(CACHE_CONTROL));
}

#[tokio::test]
async fn public_app_on_subdomain_passes_without_session() {
    let harness = Harness::new();
    let response = harness.send(verify("docs.login.example", "/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn registered_private_custom_domain_starts_handshake() {
    let harness = Harness::new();

    let response = harness.send(verify("shop.customer.com", "/cart?id=3", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "https://login.example/sso/init?target=https%3A%2F%2Fshop.customer.com%2Fcart%3Fid%3D3"
    );
}

#[tokio::test]
async fn unregistered_custom_domain_goes_to_login() {
    let harness = Harness::new();

    let response = harness.send(verify("evil.example", "/", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "https://login.example/login?redirect=https%3A%2F%2Fevil.example%2F"
    );
}

#[tokio::test]
async fn login_host_without_session_goes_to_login() {
    let harness = Harness::new();

    let response = harness.send(verify(LOGIN, "/settings", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("https://login.example/login?redirect="));
}

#[tokio::test]
async fn public_paths_pass_on_any_host() {
    let harness = Harness::new();

    for uri in ["/login", "/sso/check", "/health", "/assets/app.css", "/favicon.ico"] {
        let response = harness.send(verify("app1.login.example", uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn traversal_out_of_public_prefix_needs_a_session() {
    let harness = Harness::new();

    for uri in ["/sso/../admin", "/sso/%2e%2e/admin", "/sso/..%2fadmin", "/favicon.ico/../admin"] {
        let response = harness.send(verify("app1.login.example", uri, None)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{uri}");
        assert!(response.headers().get(X_AUTH_USER_ID).is_none(), "{uri}");
    }
}

#[tokio::test]
async fn dev_paths_pass_only_outside_production() {
    let production = Harness::new();
    let response = production
        .send(verify("app1.login.example", "/@vite/client", None))
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let development = Harness::with(
        GatewayConfig::new(LOGIN).with_production(false),
        MemoryBackend::new(),
    );
    let response = development
        .send(verify("app1.login.example", "/@vite/client", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn valid_session_is_allowed_with_user_header() {
    let harness = Harness::new();
    let session = harness.session().await;

    let response = harness
        .send(verify("app1.login.example", "/dashboard", Some(&cookie(&session))))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[X_AUTH_USER_ID], "1");
}

#[tokio::test]
async fn any_matching_cookie_may_carry_the_session() {
    let harness = Harness::new();
    let session = harness.session().await;
    let header = format!("hostgate_session=stale; {}", cookie(&session));

    let response = harness
        .send(verify("shop.customer.com", "/", Some(&header)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_session_is_redirected() {
    let harness = Harness::new();

    let response = harness
        .send(verify("app1.login.example", "/", Some("hostgate_session=forged")))
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn session_in_query_is_ignored() {
    let harness = Harness::new();
    let session = harness.session().await;
    let uri = format!("/dashboard?hostgate_session={}", session.as_str());

    let response = harness.send(verify("app1.login.example", &uri, None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn deleted_sessions_are_rejected() {
    let harness = Harness::new();
    let session = harness.session().await;
    harness.sessions.delete_all_for_user(hostgate::UserId(1)).await;

    let response = harness
        .send(verify("app1.login.example", "/", Some(&cookie(&session))))
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn cache_outage_falls_back_to_local_sessions() {
    let harness = Harness::with(GatewayConfig::new(LOGIN), DownBackend);
    let session = harness.session().await;

    let response = harness
        .send(verify("app1.login.example", "/", Some(&cookie(&session))))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[X_AUTH_USER_ID], "1");
}

#[tokio::test]
async fn registry_failure_fails_closed() {
    let users = Arc::new(directory());
    let harness = Harness::with_collaborators(
        GatewayConfig::new(LOGIN),
        MemoryBackend::new(),
        users,
        BrokenRegistry,
    );
    let session = harness.session().await;

    let response = harness
        .send(verify("shop.customer.com", "/", Some(&cookie(&session))))
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("https://login.example/login?redirect="));
}

#[tokio::test]
async fn settings_failure_fails_closed() {
    let domains = Arc::new(directory());
    let harness = Harness::with_collaborators(
        GatewayConfig::new(LOGIN),
        MemoryBackend::new(),
        BrokenSettings,
        domains,
    );

    let response = harness.send(verify("docs.customer.com", "/", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("https://login.example/login?redirect="));
}

#[tokio::test(start_paused = true)]
async fn deadline_fails_closed() {
    let users = Arc::new(directory());
    let harness = Harness::with_collaborators(
        GatewayConfig::new(LOGIN).with_forward_auth_deadline(Duration::from_millis(100)),
        MemoryBackend::new(),
        users,
        StuckRegistry,
    );

    let response = harness.send(verify("shop.customer.com", "/", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("https://login.example/login?redirect="));
}

#[tokio::test]
async fn plain_http_login_redirect_when_https_not_required() {
    let harness = Harness::with(
        GatewayConfig::new(LOGIN).with_https_required(false),
        MemoryBackend::new(),
    );
    let request = axum::http::Request::builder()
        .uri("/auth/verify")
        .header("x-forwarded-host", "evil.example")
        .header("x-forwarded-uri", "/")
        .header("x-forwarded-proto", "http")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = harness.send(request).await;

    assert_eq!(
        location(&response),
        "http://login.example/login?redirect=http%3A%2F%2Fevil.example%2F"
    );
}
