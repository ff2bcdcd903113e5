#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use argon2::Params;
use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST, SET_COOKIE};
use axum::http::{Request, Response};
use hostgate::directory::hash_password_with;
use hostgate::gateway::{
    AppSettings, BoxError, DomainRegistry, GatewayConfig, User, gateway_routes,
};
use hostgate::session::{BackendError, MemoryBackend, SessionBackend, SessionRecord, SessionStore};
use hostgate::{SessionId, StaticDirectory, UserId};
use tower::ServiceExt;

pub const LOGIN: &str = "login.example";
pub const COOKIE_NAME: &str = "hostgate_session";
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn directory() -> StaticDirectory {
    let hash = hash_password_with(PASSWORD, Params::new(1024, 1, 1, None).unwrap()).unwrap();
    StaticDirectory::new()
        .with_user(
            User {
                id: UserId(1),
                username: USERNAME.into(),
                display_name: Some("Alice".into()),
            },
            hash,
        )
        .with_public_app("docs")
        .with_custom_domain("docs.customer.com", "docs")
        .with_custom_domain("shop.customer.com", "shop")
}

pub struct Harness {
    pub app: Router,
    pub sessions: Arc<SessionStore>,
    pub directory: Arc<StaticDirectory>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(GatewayConfig::new(LOGIN), MemoryBackend::new())
    }

    pub fn with(config: GatewayConfig, primary: impl SessionBackend) -> Self {
        let directory = Arc::new(directory());
        Self::with_collaborators(config, primary, directory.clone(), directory)
    }

    /// Real user store; custom app settings and domain registry.
    pub fn with_collaborators<A: AppSettings, D: DomainRegistry>(
        config: GatewayConfig,
        primary: impl SessionBackend,
        apps: A,
        domains: D,
    ) -> Self {
        let directory = Arc::new(directory());
        let sessions = Arc::new(
            SessionStore::new(primary, Arc::new(MemoryBackend::new()))
                .with_cache_timeout(Duration::from_millis(50)),
        );
        let app = gateway_routes(
            config,
            sessions.clone(),
            directory.clone(),
            apps,
            domains,
        );
        Self {
            app,
            sessions,
            directory,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// A live session for the test user.
    pub async fn session(&self) -> SessionId {
        self.sessions
            .create(UserId(1), LOGIN, "test-agent")
            .await
            .session_id
    }
}

pub fn cookie(session_id: &SessionId) -> String {
    format!("{COOKIE_NAME}={}", session_id.as_str())
}

/// Forward-auth request as the proxy would send it.
pub fn verify(host: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/auth/verify")
        .header("x-forwarded-host", host)
        .header("x-forwarded-uri", uri)
        .header("x-forwarded-proto", "https");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn get(host: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .header(HOST, host)
        .header("x-forwarded-proto", "https");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(host: &str, uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(HOST, host)
        .header("x-forwarded-proto", "https")
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get("location")
        .expect("location header")
        .to_str()
        .unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Cache that is always down.
pub struct DownBackend;

impl SessionBackend for DownBackend {
    async fn get(&self, _: &SessionId) -> Result<Option<SessionRecord>, BackendError> {
        Err(BackendError::Timeout)
    }

    async fn put(&self, _: &SessionRecord, _: Duration) -> Result<(), BackendError> {
        Err(BackendError::Timeout)
    }

    async fn replace(&self, _: &SessionRecord, _: Duration) -> Result<(), BackendError> {
        Err(BackendError::Timeout)
    }

    async fn delete(&self, _: &SessionId) -> Result<(), BackendError> {
        Err(BackendError::Timeout)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Err(BackendError::Timeout)
    }
}

/// Registry whose lookups always fail.
pub struct BrokenRegistry;

impl DomainRegistry for BrokenRegistry {
    async fn resolve_owner(&self, _: &str) -> Result<Option<String>, BoxError> {
        Err("registry unavailable".into())
    }
}

/// Registry whose lookups never finish.
pub struct StuckRegistry;

impl DomainRegistry for StuckRegistry {
    async fn resolve_owner(&self, _: &str) -> Result<Option<String>, BoxError> {
        std::future::pending().await
    }
}

/// App settings whose lookups always fail.
pub struct BrokenSettings;

impl AppSettings for BrokenSettings {
    async fn is_app_public(&self, _: &str) -> Result<bool, BoxError> {
        Err("settings unavailable".into())
    }
}

