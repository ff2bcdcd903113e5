use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::Serialize;

use super::config::GatewayConfig;
use super::cookies;
use super::error::GatewayError;
use super::extractor;
use super::forward_auth;
use super::sso;
use super::state::GatewayState;
use super::traits::{AppSettings, DomainRegistry, UserStore};
use super::types::{LoginRequest, LoginResponse};
use crate::domain::{self, HostKind};
use crate::session::SessionStore;

/// Create the gateway router.
///
/// `sessions` is shared so the caller can also hand its fallback map to the
/// sweeper.
pub fn gateway_routes<U, A, D>(
    config: GatewayConfig,
    sessions: Arc<SessionStore>,
    users: U,
    apps: A,
    domains: D,
) -> Router
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    #[cfg(feature = "oauth")]
    let linker = config
        .oauth
        .clone()
        .map(|oauth| Arc::new(crate::oauth::LinkClient::new(oauth)));

    let state = GatewayState {
        cookies: config.cookie_policy(),
        config: Arc::new(config),
        sessions,
        users: Arc::new(users),
        apps: Arc::new(apps),
        domains: Arc::new(domains),
        #[cfg(feature = "oauth")]
        linker,
    };

    let router = Router::new()
        .route(super::VERIFY_PATH, any(forward_auth::verify::<U, A, D>))
        .route(super::LOGIN_PATH, post(login::<U, A, D>))
        .route(super::LOGOUT_PATH, post(logout::<U, A, D>))
        .route(super::HEALTH_PATH, get(health::<U, A, D>))
        .route(super::SSO_INIT_PATH, get(sso::sso_init::<U, A, D>))
        .route(super::SSO_CHECK_PATH, get(sso::sso_check::<U, A, D>))
        .route(super::SSO_BRIDGE_PATH, get(sso::sso_bridge::<U, A, D>))
        .route(super::SSO_SESSION_PATH, post(sso::sso_session::<U, A, D>));

    // Unconfigured linking answers 404 through the router fallback.
    #[cfg(feature = "oauth")]
    let router = if state.linker.is_some() {
        router
            .route(super::OAUTH_LINK_START_PATH, get(link::start::<U, A, D>))
            .route(super::OAUTH_LINK_CALLBACK_PATH, get(link::callback::<U, A, D>))
    } else {
        router
    };

    router.with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, GatewayError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let Some(user) = state
        .users
        .get_user_by_username(&request.username)
        .await
        .map_err(GatewayError::internal)?
    else {
        state.users.verify_unknown_password(&request.password).await;
        tracing::info!("Login rejected: unknown user");
        return Err(GatewayError::InvalidCredentials);
    };

    let verified = state
        .users
        .verify_password(&user, &request.password)
        .await
        .map_err(GatewayError::internal)?;
    if !verified {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(GatewayError::InvalidCredentials);
    }

    let host = extractor::request_host(&headers)
        .map(|h| domain::normalize_host(&h))
        .unwrap_or_else(|| domain::normalize_host(&state.config.login_host));
    let proto = extractor::forwarded_proto(&headers);

    let record = state
        .sessions
        .create(user.id, &host, &extractor::user_agent(&headers))
        .await;
    let max_age = state.sessions.lifetime();
    let cookie_name = &state.config.session_cookie_name;

    let redirect = match request.redirect.as_deref() {
        Some(raw) => state.served_url(raw).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Redirect target lookup failed; using /");
            None
        }),
        None => None,
    };

    let mut set_cookies = vec![
        cookies::session_cookie(
            cookie_name,
            &record.session_id,
            &state.cookies.policy(&host, proto, false),
            max_age,
        ),
        cookies::session_cookie(
            cookie_name,
            &record.session_id,
            &state.cookies.policy(&state.config.login_host, proto, true),
            max_age,
        ),
    ];
    if let Some((url, classification)) = &redirect {
        if classification.kind == HostKind::CustomDomain && classification.host != host {
            let secure = url.scheme() == "https" || state.cookies.https_required();
            set_cookies.push(cookies::cross_site_domain_cookie(
                cookie_name,
                &record.session_id,
                &classification.host,
                secure,
                max_age,
            ));
        }
    }

    tracing::info!(
        user_id = %user.id,
        host = %host,
        session = %record.session_id.redacted(),
        "Login successful"
    );

    let body = LoginResponse {
        session_id: record.session_id,
        user,
        redirect: redirect.map_or_else(|| "/".to_string(), |(url, _)| url.to_string()),
    };
    let mut response = Json(body).into_response();
    for cookie in &set_cookies {
        cookies::append(response.headers_mut(), cookie)?;
    }
    Ok(response)
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<U, A, D>(
    State(state): State<GatewayState<U, A, D>>,
    headers: HeaderMap,
) -> Result<Response, GatewayError>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let cookie_name = &state.config.session_cookie_name;
    let session = extractor::resolve_session(&state.sessions, &headers, cookie_name).await;

    if let Some(record) = &session {
        let removed = state.sessions.delete_all_for_user(record.user_id).await;
        // The cookie's own session may live only in the cache.
        state.sessions.delete(&record.session_id).await;
        tracing::info!(user_id = %record.user_id, removed, "Logged out everywhere");
    }

    let host = extractor::request_host(&headers).unwrap_or_else(|| state.config.login_host.clone());
    let proto = extractor::forwarded_proto(&headers);

    let mut response = Json(serde_json::json!({
        "status": "logged_out",
        "authenticated": false,
    }))
    .into_response();
    cookies::append(
        response.headers_mut(),
        &cookies::clear_session_cookie(cookie_name, &state.cookies.policy(&host, proto, false)),
    )?;
    cookies::append(
        response.headers_mut(),
        &cookies::clear_session_cookie(
            cookie_name,
            &state.cookies.policy(&state.config.login_host, proto, true),
        ),
    )?;
    Ok(response)
}

// ── Health ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Health {
    status: &'static str,
    cache: &'static str,
}

async fn health<U, A, D>(State(state): State<GatewayState<U, A, D>>) -> Json<Health>
where
    U: UserStore,
    A: AppSettings,
    D: DomainRegistry,
{
    let cache = if state.sessions.primary_available().await {
        "up"
    } else {
        "down"
    };
    Json(Health { status: "ok", cache })
}

// ── OAuth account linking ──────────────────────────────────────────

#[cfg(feature = "oauth")]
mod link {
    use axum::extract::{Query, State};
    use axum::response::Redirect;
    use serde::Deserialize;

    use super::super::error::GatewayError;
    use super::super::extractor::AuthSession;
    use super::super::state::GatewayState;
    use super::super::traits::{AppSettings, DomainRegistry, UserStore};
    use super::super::types::LinkedAccount;
    use crate::csrf;

    pub(super) async fn start<U, A, D>(
        State(state): State<GatewayState<U, A, D>>,
        AuthSession(session): AuthSession,
    ) -> Result<Redirect, GatewayError>
    where
        U: UserStore,
        A: AppSettings,
        D: DomainRegistry,
    {
        let linker = state.linker.as_ref().ok_or(GatewayError::NotFound)?;
        let oauth_state = csrf::issue_state(session.user_id);
        tracing::debug!(user_id = %session.user_id, provider = linker.config().provider(), "Starting account link");
        Ok(Redirect::temporary(&linker.authorization_url(&oauth_state)))
    }

    #[derive(Deserialize)]
    pub(super) struct CallbackParams {
        code: Option<String>,
        state: Option<String>,
        error: Option<String>,
        error_description: Option<String>,
    }

    pub(super) async fn callback<U, A, D>(
        State(state): State<GatewayState<U, A, D>>,
        AuthSession(session): AuthSession,
        Query(params): Query<CallbackParams>,
    ) -> Result<Redirect, GatewayError>
    where
        U: UserStore,
        A: AppSettings,
        D: DomainRegistry,
    {
        let linker = state.linker.as_ref().ok_or(GatewayError::NotFound)?;

        let oauth_state = params.state.as_deref().unwrap_or_default();
        if let Err(e) = csrf::validate_state(oauth_state, session.user_id) {
            tracing::warn!(user_id = %session.user_id, "OAuth state rejected");
            return Err(e.into());
        }

        if let Some(error) = &params.error {
            let desc = params.error_description.as_deref().unwrap_or("Unknown error");
            tracing::warn!(error = %error, description = %desc, "OAuth2 error from provider");
            return Err(GatewayError::BadRequest("authorization was not granted".into()));
        }

        let code = params
            .code
            .ok_or_else(|| GatewayError::BadRequest("missing code".into()))?;

        let token = linker.exchange_code(&code).await.map_err(|e| {
            tracing::error!(error = %e, "Token exchange failed");
            GatewayError::internal(e)
        })?;

        let account = LinkedAccount {
            provider: linker.config().provider().to_string(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        };
        state
            .users
            .link_oauth_account(session.user_id, account)
            .await
            .map_err(GatewayError::internal)?;

        tracing::info!(
            user_id = %session.user_id,
            provider = linker.config().provider(),
            "Account linked"
        );
        Ok(Redirect::to("/"))
    }
}
