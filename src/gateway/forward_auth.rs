//! Forward-auth decision endpoint.
//!
//! The reverse proxy calls this before forwarding any request to a hosted app.
//! `200` means forward; a `307` is returned to the browser as-is. Every path
//! that cannot positively establish access ends in a redirect to the login page.

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use url::Url;

use super::extractor::{self, X_FORWARDED_URI};
use super::state::GatewayState;
use super::traits::{AppSettings, BoxError, DomainRegistry, UserStore};
use crate::domain::HostKind;
use crate::types::{SessionId, UserId};

/// Header carrying the authenticated user to the upstream app.
pub const X_AUTH_USER_ID: &str = "x-auth-user-id";

const PUBLIC_PATHS: &[&str] = &[
    super::LOGIN_PATH,
    super::LOGOUT_PATH,
    super::HEALTH_PATH,
    "/healthz",
    "/favicon.ico",
    "/robots.txt",
];

const PUBLIC_PREFIXES: &[&str] = &["/sso/"];

/// Percent-encoded `/` and `\`. Upstreams disagree on decoding these.
const ENCODED_SEPARATORS: &[&str] = &["%2f", "%5c"];

const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2",
    "ttf", "eot",
];

/// Dev-server tooling; only public outside production.
const DEV_PREFIXES: &[&str] = &[
    "/@vite/",
    "/@fs/",
    "/@id/",
    "/node_modules/",
    "/__webpack_hmr",
    "/_next/webpack-hmr",
];

/// Outcome of one gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Decision {
    Allow { user_id: Option<UserId> },
    Redirect(String),
}

/// What the proxy forwarded about the original request.
#[derive(Debug)]
pub(super) struct ForwardedRequest {
    pub(super) host: String,
    pub(super) uri: String,
    pub(super) proto: Option<String>,
    pub(super) session_ids: Vec<SessionId>,
}

impl ForwardedRequest {
    fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        Self {
            host: extractor::request_host(headers).unwrap_or_default(),
            uri: extractor::header_str(headers, X_FORWARDED_URI)
                .filter(|u| !u.is_empty())
                .unwrap_or("/")
                .to_string(),
            proto: extractor::forwarded_proto(headers).map(str::to_string),
            session_ids: extractor::session_ids(headers, cookie_name),
        }
    }

    fn path(&self) -> &str {
        let end = self.uri.find(['?', '#']).unwrap_or(self.uri.len());
        &self.uri[..end]
    }

    /// The URL the browser originally asked for.
    fn original_url(&self) -> String {
        let proto = self
            .proto
            .as_deref()
            .and_then(|p| p.split(',').next())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or("https");
        let uri = if self.uri.starts_with('/') {
            self.uri.clone()
        } else {
            format!("/{}", self.uri)
        };
        format!("{proto}://{}{uri}", self.host)
    }
}

pub(super) async fn verify<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    headers: HeaderMap,
) -> Response
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let request = ForwardedRequest::from_headers(&headers, &state.config.session_cookie_name);
    let decision = decide(&state, &request).await;

    let mut response = match &decision {
        Decision::Allow { user_id } => {
            let mut response = StatusCode::OK.into_response();
            if let Some(user_id) = user_id {
                if let Ok(value) = HeaderValue::from_str(&user_id.to_string()) {
                    response.headers_mut().insert(X_AUTH_USER_ID, value);
                }
            }
            response
        }
        Decision::Redirect(location) => Redirect::temporary(location).into_response(),
    };

    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache, must-revalidate, private"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    response
}

/// Run the gate for one forwarded request.
pub(super) async fn decide<U, A, D>(
    state: &GatewayState<U, A, D>,
    request: &ForwardedRequest,
) -> Decision
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    if is_public_path(request.path(), state.config.production) {
        tracing::debug!(host = %request.host, path = %request.path(), "Public path");
        return Decision::Allow { user_id: None };
    }

    let deadline = state.config.forward_auth_deadline;
    match tokio::time::timeout(deadline, authorize(state, request)).await {
        Ok(Ok(decision)) => decision,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, host = %request.host, "Forward auth collaborator failed; denying");
            login_redirect(state, request)
        }
        Err(_) => {
            tracing::warn!(
                host = %request.host,
                deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                "Forward auth deadline exceeded; denying"
            );
            login_redirect(state, request)
        }
    }
}

async fn authorize<U, A, D>(
    state: &GatewayState<U, A, D>,
    request: &ForwardedRequest,
) -> Result<Decision, BoxError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let classification = state.classify(&request.host).await?;

    if let Some(app) = &classification.app {
        if state.apps.is_app_public(app).await? {
            tracing::debug!(host = %request.host, app = %app, "Public app");
            return Ok(Decision::Allow { user_id: None });
        }
    }

    for session_id in &request.session_ids {
        if let Some(record) = state.sessions.validate(session_id).await {
            let user_id = record.user_id;
            let sessions = state.sessions.clone();
            // Activity is recorded off the proxy's request path.
            tokio::spawn(async move { sessions.touch(&record).await });
            tracing::debug!(host = %request.host, user_id = %user_id, "Session accepted");
            return Ok(Decision::Allow {
                user_id: Some(user_id),
            });
        }
    }

    let needs_handshake = match classification.kind {
        HostKind::Subdomain => true,
        HostKind::CustomDomain => classification.app.is_some(),
        HostKind::LoginHost => false,
    };
    if needs_handshake {
        let location = state.sso_init_url(request.proto.as_deref(), &request.original_url());
        return Ok(Decision::Redirect(location));
    }
    Ok(login_redirect(state, request))
}

fn login_redirect<U, A, D>(state: &GatewayState<U, A, D>, request: &ForwardedRequest) -> Decision {
    Decision::Redirect(state.login_url(request.proto.as_deref(), &request.original_url()))
}

/// Paths that never need a session.
///
/// Matching runs on the path with dot segments resolved, so `/sso/../admin`
/// is judged as `/admin`.
pub(super) fn is_public_path(path: &str, production: bool) -> bool {
    let Some(path) = normalize_path(path) else {
        return false;
    };
    let path = path.as_str();
    if PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    if !production && DEV_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    has_static_extension(path)
}

/// Resolve `.` and `..` segments (plain or percent-encoded) the way an
/// upstream server would. `None` when the path hides a separator behind
/// percent-encoding.
fn normalize_path(path: &str) -> Option<String> {
    let lower = path.to_ascii_lowercase();
    if ENCODED_SEPARATORS.iter().any(|s| lower.contains(s)) {
        return None;
    }
    let mut url = Url::parse("http://gate.invalid/").ok()?;
    url.set_path(path);
    Some(url.path().to_string())
}

fn has_static_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths() {
        for path in ["/login", "/logout", "/health", "/sso/init", "/sso/check", "/favicon.ico"] {
            assert!(is_public_path(path, true), "{path}");
        }
        for path in ["/", "/dashboard", "/login/admin", "/api/users", "/ssox"] {
            assert!(!is_public_path(path, true), "{path}");
        }
    }

    #[test]
    fn dot_segments_are_resolved_before_matching() {
        for path in [
            "/sso/../admin",
            "/sso/%2e%2e/admin",
            "/sso/.%2E/admin",
            "/sso/..\\admin",
            "/assets/../admin",
            "/login/..",
        ] {
            assert!(!is_public_path(path, true), "{path}");
        }
        assert!(is_public_path("/admin/../sso/check", true));
        assert!(is_public_path("/sso/./check", true));
    }

    #[test]
    fn encoded_separators_are_never_public() {
        for path in ["/sso/..%2fadmin", "/sso/..%2Fadmin", "/sso/..%5cadmin", "/assets%2fapp.css"] {
            assert!(!is_public_path(path, true), "{path}");
        }
    }

    #[test]
    fn static_assets_are_public() {
        assert!(is_public_path("/assets/app.css", true));
        assert!(is_public_path("/static/js/main.JS", true));
        assert!(is_public_path("/img/logo.svg", true));
        assert!(!is_public_path("/assets/.css", true));
        assert!(!is_public_path("/download.exe", true));
        assert!(!is_public_path("/report.css/data", true));
    }

    #[test]
    fn dev_paths_only_outside_production() {
        assert!(!is_public_path("/@vite/client", true));
        assert!(is_public_path("/@vite/client", false));
        assert!(is_public_path("/node_modules/.vite/deps/react.js", false));
        assert!(!is_public_path("/__webpack_hmr", true));
    }

    #[test]
    fn path_ignores_query() {
        let request = ForwardedRequest {
            host: "app1.login.example".into(),
            uri: "/login?next=/admin".into(),
            proto: Some("https".into()),
            session_ids: Vec::new(),
        };
        assert_eq!(request.path(), "/login");
    }

    #[test]
    fn original_url_defaults_to_https() {
        let request = ForwardedRequest {
            host: "app1.login.example".into(),
            uri: "/dashboard?tab=1".into(),
            proto: None,
            session_ids: Vec::new(),
        };
        assert_eq!(request.original_url(), "https://app1.login.example/dashboard?tab=1");
    }
}
