//! Cross-domain SSO handshake.
//!
//! App subdomains share the login host's cookie domain, so a round trip through
//! [`sso_init`] is enough. Customer-owned domains cannot read that cookie: the
//! bridge page on the custom domain embeds [`sso_check`] from the login host in
//! a hidden iframe, receives the session over `postMessage`, and hands it to
//! [`sso_session`] to get a cookie of its own.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, ORIGIN};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use super::cookies;
use super::error::GatewayError;
use super::extractor;
use super::state::GatewayState;
use super::traits::{AppSettings, DomainRegistry, UserStore};
use super::types::{SessionHandoff, SsoCheckMessage};
use crate::domain::{self, Classification, HostKind};

const CHECK_RESULT: &str = "sso-check-result";

/// How long the bridge waits for the login host before giving up.
const BRIDGE_TIMEOUT_MS: u64 = 5000;

#[derive(Deserialize)]
pub(super) struct TargetParams {
    target: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct CheckParams {
    origin: Option<String>,
}

// ── Init ───────────────────────────────────────────────────────────

/// `GET /sso/init?target=` on the login host.
pub(super) async fn sso_init<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    Query(params): Query<TargetParams>,
    headers: HeaderMap,
) -> Result<Redirect, GatewayError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let raw = params
        .target
        .ok_or_else(|| GatewayError::BadRequest("missing target".into()))?;
    let (target, classification) = state
        .served_url(&raw)
        .await
        .map_err(GatewayError::internal)?
        .ok_or_else(|| GatewayError::BadRequest("invalid target".into()))?;

    let proto = extractor::forwarded_proto(&headers);
    let session = extractor::resolve_session(
        &state.sessions,
        &headers,
        &state.config.session_cookie_name,
    )
    .await;

    let Some(record) = session else {
        tracing::debug!(url = %target, "SSO init without session; sending to login");
        return Ok(Redirect::temporary(&state.login_url(proto, target.as_str())));
    };

    if classification.kind == HostKind::CustomDomain {
        let bridge = bridge_url(&target);
        tracing::debug!(user_id = %record.user_id, host = %classification.host, "SSO init via bridge");
        return Ok(Redirect::temporary(&bridge));
    }

    tracing::debug!(user_id = %record.user_id, host = %classification.host, "SSO init complete");
    Ok(Redirect::temporary(target.as_str()))
}

fn bridge_url(target: &Url) -> String {
    format!(
        "{}{}?target={}",
        target.origin().ascii_serialization(),
        super::SSO_BRIDGE_PATH,
        urlencoding::encode(target.as_str())
    )
}

// ── Check ──────────────────────────────────────────────────────────

/// `GET /sso/check` on the login host, loaded in a hidden iframe.
pub(super) async fn sso_check<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    Query(params): Query<CheckParams>,
    headers: HeaderMap,
) -> Result<Response, GatewayError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let presented = extractor::header_str(&headers, ORIGIN.as_str())
        .map(str::to_string)
        .or(params.origin);

    let origin = match presented {
        Some(raw) => Some(validate_origin(&state, &raw).await?),
        None => None,
    };

    let session = extractor::resolve_session(
        &state.sessions,
        &headers,
        &state.config.session_cookie_name,
    )
    .await;

    let message = SsoCheckMessage {
        kind: CHECK_RESULT,
        authenticated: session.is_some(),
        // An unknown parent never receives the session.
        session_id: origin
            .as_ref()
            .and(session.as_ref())
            .map(|record| &record.session_id),
    };
    let target_origin = origin.as_ref().map_or("*", |(o, _)| o.as_str());

    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body><script>\
         window.parent.postMessage({message}, {target});\
         </script></body></html>",
        message = script_json(&message)?,
        target = script_json(&target_origin)?,
    );
    let mut response = no_store(Html(body));

    if let Some((origin, classification)) = &origin {
        let csp = HeaderValue::from_str(&format!("frame-ancestors {origin}"))
            .map_err(GatewayError::internal)?;
        response.headers_mut().insert(CONTENT_SECURITY_POLICY, csp);

        if let (Some(record), HostKind::CustomDomain) = (&session, classification.kind) {
            let secure = origin.starts_with("https://") || state.cookies.https_required();
            let cookie = cookies::cross_site_domain_cookie(
                &state.config.session_cookie_name,
                &record.session_id,
                &classification.host,
                secure,
                state.sessions.lifetime(),
            );
            cookies::append(response.headers_mut(), &cookie)?;
        }
    }

    tracing::debug!(
        origin = origin.as_ref().map_or("*", |(o, _)| o.as_str()),
        authenticated = session.is_some(),
        "SSO check"
    );
    Ok(response)
}

/// Accept `raw` only if it is the origin of a host this platform serves.
async fn validate_origin<U, A, D: DomainRegistry>(
    state: &GatewayState<U, A, D>,
    raw: &str,
) -> Result<(String, Classification), GatewayError> {
    match state.served_url(raw).await.map_err(GatewayError::internal)? {
        Some((url, classification)) => Ok((url.origin().ascii_serialization(), classification)),
        None => {
            tracing::warn!(origin = %raw, "SSO check from unknown origin");
            Err(GatewayError::ForbiddenOrigin)
        }
    }
}

// ── Bridge ─────────────────────────────────────────────────────────

/// `GET /sso/bridge?target=` on a custom domain.
pub(super) async fn sso_bridge<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    Query(params): Query<TargetParams>,
    headers: HeaderMap,
) -> Result<Response, GatewayError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let raw = params
        .target
        .ok_or_else(|| GatewayError::BadRequest("missing target".into()))?;
    let host = extractor::request_host(&headers)
        .map(|h| domain::normalize_host(&h))
        .ok_or_else(|| GatewayError::BadRequest("missing host".into()))?;
    let (target, classification) = state
        .served_url(&raw)
        .await
        .map_err(GatewayError::internal)?
        .ok_or_else(|| GatewayError::BadRequest("invalid target".into()))?;
    if classification.host != host {
        return Err(GatewayError::BadRequest("target not on this host".into()));
    }

    let proto = extractor::forwarded_proto(&headers);
    let own_origin = target.origin().ascii_serialization();
    let login_origin = state.login_origin(proto);

    let page = BridgePage {
        login_origin: &login_origin,
        check_url: format!(
            "{login_origin}{}?origin={}",
            super::SSO_CHECK_PATH,
            urlencoding::encode(&own_origin)
        ),
        session_url: super::SSO_SESSION_PATH,
        target: target.as_str(),
        login_url: state.login_url(proto, target.as_str()),
        timeout_ms: BRIDGE_TIMEOUT_MS,
    };

    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Signing in</title></head><body>\
         <script>\
         (function () {{\
           var cfg = {cfg};\
           var done = false;\
           function go(url) {{ if (!done) {{ done = true; window.location.replace(url); }} }}\
           window.addEventListener('message', function (event) {{\
             if (event.origin !== cfg.loginOrigin) return;\
             var data = event.data || {{}};\
             if (data.type !== '{CHECK_RESULT}') return;\
             if (!data.authenticated || !data.sessionID) {{ go(cfg.loginUrl); return; }}\
             fetch(cfg.sessionUrl, {{\
               method: 'POST',\
               credentials: 'same-origin',\
               headers: {{ 'Content-Type': 'application/json' }},\
               body: JSON.stringify({{ sessionID: data.sessionID }})\
             }}).then(function (r) {{ go(r.ok ? cfg.target : cfg.loginUrl); }},\
                      function () {{ go(cfg.loginUrl); }});\
           }});\
           var frame = document.createElement('iframe');\
           frame.style.display = 'none';\
           frame.src = cfg.checkUrl;\
           document.body.appendChild(frame);\
           setTimeout(function () {{ go(cfg.loginUrl); }}, cfg.timeoutMs);\
         }})();\
         </script></body></html>",
        cfg = script_json(&page)?,
    );

    tracing::debug!(host = %host, "Serving SSO bridge");
    Ok(no_store(Html(body)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BridgePage<'a> {
    login_origin: &'a str,
    check_url: String,
    session_url: &'static str,
    target: &'a str,
    login_url: String,
    timeout_ms: u64,
}

// ── Session handoff ────────────────────────────────────────────────

/// `POST /sso/session` on a custom domain or subdomain.
pub(super) async fn sso_session<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    headers: HeaderMap,
    Json(handoff): Json<SessionHandoff>,
) -> Result<Response, GatewayError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let host = extractor::request_host(&headers).ok_or(GatewayError::ForbiddenOrigin)?;
    let classification = state
        .served_host(&host)
        .await
        .map_err(GatewayError::internal)?
        .filter(|c| c.kind != HostKind::LoginHost)
        .ok_or(GatewayError::ForbiddenOrigin)?;

    let record = state
        .sessions
        .validate(&handoff.session_id)
        .await
        .ok_or(GatewayError::Unauthenticated)?;
    state.sessions.touch(&record).await;

    let proto = extractor::forwarded_proto(&headers);
    let policy = state.cookies.policy(&classification.host, proto, false);
    let remaining = record.expires_at - time::OffsetDateTime::now_utc();
    let cookie = cookies::session_cookie(
        &state.config.session_cookie_name,
        &record.session_id,
        &policy,
        remaining.max(time::Duration::ZERO),
    );

    let mut response = no_store(StatusCode::NO_CONTENT);
    cookies::append(response.headers_mut(), &cookie)?;

    tracing::info!(
        user_id = %record.user_id,
        host = %classification.host,
        session = %record.session_id.redacted(),
        "SSO session handed off"
    );
    Ok(response)
}

// ── Helpers ────────────────────────────────────────────────────────

fn no_store(response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// JSON for embedding inside an inline `<script>`.
fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String, GatewayError> {
    let json = serde_json::to_string(value).map_err(GatewayError::internal)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_json_cannot_close_the_script() {
        let out = script_json("</script><script>alert(1)</script>").unwrap();
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        let back: String = serde_json::from_str(&out).unwrap();
        assert_eq!(back, "</script><script>alert(1)</script>");
    }

    #[test]
    fn bridge_url_stays_on_target_origin() {
        let target = Url::parse("https://shop.customer.com:8443/cart?id=1").unwrap();
        assert_eq!(
            bridge_url(&target),
            "https://shop.customer.com:8443/sso/bridge?target=https%3A%2F%2Fshop.customer.com%3A8443%2Fcart%3Fid%3D1"
        );
    }

    #[test]
    fn check_message_shape() {
        let id = crate::types::SessionId::from("abc".to_string());
        let json = serde_json::to_value(SsoCheckMessage {
            kind: CHECK_RESULT,
            authenticated: true,
            session_id: Some(&id),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "sso-check-result", "authenticated": true, "sessionID": "abc" })
        );

        let json = serde_json::to_value(SsoCheckMessage {
            kind: CHECK_RESULT,
            authenticated: false,
            session_id: None,
        })
        .unwrap();
        assert!(json.get("sessionID").is_none());
    }
}
