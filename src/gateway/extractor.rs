use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{COOKIE, HOST, USER_AGENT};
use axum::http::request::Parts;
use axum_extra::extract::cookie::Cookie;

use super::error::GatewayError;
use super::state::GatewayState;
use super::traits::{AppSettings, DomainRegistry, UserStore};
use crate::session::{SessionRecord, SessionStore};
use crate::types::SessionId;

pub(super) const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub(super) const X_FORWARDED_URI: &str = "x-forwarded-uri";
pub(super) const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Caps how many same-named cookies are tried per request.
const MAX_SESSION_COOKIES: usize = 4;

/// Authenticated session extracted from the session cookie.
///
/// Rejects with `401 Unauthorized` if no valid session exists.
#[derive(Debug, Clone)]
pub(super) struct AuthSession(pub(super) SessionRecord);

impl<U, A, D> FromRequestParts<GatewayState<U, A, D>> for AuthSession
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState<U, A, D>,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(
            &state.sessions,
            &parts.headers,
            &state.config.session_cookie_name,
        )
        .await
        .map(AuthSession)
        .ok_or(GatewayError::Unauthenticated)
    }
}

/// Resolve the caller's session from its cookies, if any is valid.
///
/// Several cookies may share the session name (login-host and host-only
/// copies); the first one that validates wins.
pub(super) async fn resolve_session(
    sessions: &SessionStore,
    headers: &HeaderMap,
    cookie_name: &str,
) -> Option<SessionRecord> {
    for session_id in session_ids(headers, cookie_name) {
        if let Some(record) = sessions.validate(&session_id).await {
            return Some(record);
        }
    }
    None
}

/// Session IDs carried in `Cookie` headers under `cookie_name`.
pub(super) fn session_ids(headers: &HeaderMap, cookie_name: &str) -> Vec<SessionId> {
    let mut ids: Vec<SessionId> = Vec::new();
    let values = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok());
    for value in values {
        for cookie in Cookie::split_parse(value).filter_map(Result::ok) {
            if cookie.name() == cookie_name && !cookie.value().is_empty() {
                let id = SessionId::from(cookie.value().to_string());
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids.truncate(MAX_SESSION_COOKIES);
    ids
}

/// Host the browser addressed: `X-Forwarded-Host` when proxied, else `Host`.
pub(super) fn request_host(headers: &HeaderMap) -> Option<String> {
    header_str(headers, X_FORWARDED_HOST)
        .or_else(|| header_str(headers, HOST.as_str()))
        .and_then(|h| h.split(',').next())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

pub(super) fn forwarded_proto(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, X_FORWARDED_PROTO)
}

pub(super) fn user_agent(headers: &HeaderMap) -> String {
    header_str(headers, USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string()
}

pub(super) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
