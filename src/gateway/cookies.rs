use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use super::error::GatewayError;
use crate::cookie_policy::CookiePolicy;
use crate::types::SessionId;

/// Create session cookie with the computed policy.
pub(super) fn session_cookie(
    name: &str,
    session_id: &SessionId,
    policy: &CookiePolicy,
    max_age: Duration,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), session_id.as_str().to_string()))
        .http_only(true)
        .secure(policy.secure)
        .same_site(policy.same_site)
        .path("/")
        .max_age(max_age);
    if let Some(domain) = &policy.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

/// Host-only-overriding cookie for a custom domain set from a cross-site response.
///
/// Always `SameSite=Lax`: the one place the generic policy is overridden.
pub(super) fn cross_site_domain_cookie(
    name: &str,
    session_id: &SessionId,
    host: &str,
    secure: bool,
    max_age: Duration,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .domain(host.to_string())
        .path("/")
        .max_age(max_age)
        .build()
}

/// Create removal cookie for session, scoped like the one it replaces.
pub(super) fn clear_session_cookie(name: &str, policy: &CookiePolicy) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), ""))
        .http_only(true)
        .secure(policy.secure)
        .same_site(policy.same_site)
        .path("/")
        .max_age(Duration::ZERO);
    if let Some(domain) = &policy.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

/// Append a `Set-Cookie` header.
///
/// Headers are appended directly rather than through a cookie jar: the same
/// cookie name is emitted for several domains in one response.
pub(super) fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<(), GatewayError> {
    let value = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
        tracing::error!(error = %e, cookie = cookie.name(), "Malformed Set-Cookie value");
        GatewayError::internal("malformed Set-Cookie value")
    })?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(domain: Option<&str>, same_site: SameSite, secure: bool) -> CookiePolicy {
        CookiePolicy {
            domain: domain.map(str::to_string),
            same_site,
            secure,
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let id = SessionId::from("abc".to_string());
        let c = session_cookie(
            "sid",
            &id,
            &policy(Some(".login.example"), SameSite::None, true),
            Duration::hours(24),
        );
        assert_eq!(c.value(), "abc");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::None));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.domain(), Some("login.example"));
        assert_eq!(c.max_age(), Some(Duration::hours(24)));
    }

    #[test]
    fn host_only_cookie_has_no_domain() {
        let id = SessionId::from("abc".to_string());
        let c = session_cookie("sid", &id, &policy(None, SameSite::Lax, false), Duration::hours(1));
        assert_eq!(c.domain(), None);
        assert!(!c.to_string().contains("Domain="));
    }

    #[test]
    fn cross_site_cookie_is_lax() {
        let id = SessionId::from("abc".to_string());
        let c = cross_site_domain_cookie("sid", &id, "shop.customer.com", true, Duration::hours(1));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.domain(), Some("shop.customer.com"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let c = clear_session_cookie("sid", &policy(Some(".login.example"), SameSite::Lax, false));
        assert_eq!(c.value(), "");
        assert_eq!(c.max_age(), Some(Duration::ZERO));
        assert_eq!(c.domain(), Some("login.example"));
    }

    #[test]
    fn append_keeps_duplicates() {
        let id = SessionId::from("abc".to_string());
        let mut headers = HeaderMap::new();
        let a = session_cookie("sid", &id, &policy(None, SameSite::Lax, false), Duration::hours(1));
        let b = session_cookie(
            "sid",
            &id,
            &policy(Some(".login.example"), SameSite::Lax, false),
            Duration::hours(1),
        );
        append(&mut headers, &a).unwrap();
        append(&mut headers, &b).unwrap();
        assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 2);
    }
}
