//! Session cookie attributes per response.
//!
//! A pure decision table keyed by `(host kind, login-host cookie, loopback, https required)`,
//! followed by two adjustments: an HTTPS request observed by the proxy forces `Secure`,
//! and `SameSite=None` is only ever emitted together with `Secure`.

use axum_extra::extract::cookie::SameSite;

use crate::domain::{self, HostKind};

/// Attributes for one `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    /// `Domain` attribute; `None` means host-only.
    pub domain: Option<String>,
    pub same_site: SameSite,
    pub secure: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    HostOnly,
    LoginDomain,
}

/// Computes cookie attributes for the configured login host.
#[derive(Debug, Clone)]
pub struct CookiePolicyEngine {
    login_domain: String,
    https_required: bool,
}

impl CookiePolicyEngine {
    #[must_use]
    pub fn new(login_host: &str, https_required: bool) -> Self {
        Self {
            login_domain: domain::normalize_host(login_host),
            https_required,
        }
    }

    #[must_use]
    pub fn login_domain(&self) -> &str {
        &self.login_domain
    }

    #[must_use]
    pub fn https_required(&self) -> bool {
        self.https_required
    }

    /// Policy for a cookie set on a response to `host`.
    ///
    /// `for_login_host` selects the cookie that must stay readable from an embedded
    /// cross-site iframe on the login host.
    #[must_use]
    pub fn policy(
        &self,
        host: &str,
        forwarded_proto: Option<&str>,
        for_login_host: bool,
    ) -> CookiePolicy {
        let host = domain::normalize_host(host);
        let kind = domain::classify(&host, &self.login_domain).kind;
        let (scope, same_site, secure) =
            decide(kind, for_login_host, is_loopback(&host), self.https_required);

        let secure = secure || (!is_loopback(&host) && is_https(forwarded_proto));
        let same_site = if same_site == SameSite::None && !secure {
            SameSite::Lax
        } else {
            same_site
        };

        CookiePolicy {
            domain: match scope {
                Scope::HostOnly => None,
                Scope::LoginDomain => Some(format!(".{}", self.login_domain)),
            },
            same_site,
            secure,
        }
    }
}

fn decide(
    kind: HostKind,
    for_login_host: bool,
    loopback: bool,
    https_required: bool,
) -> (Scope, SameSite, bool) {
    let relaxed = if https_required {
        SameSite::None
    } else {
        SameSite::Lax
    };
    match (kind, for_login_host, loopback) {
        (_, _, true) => (Scope::HostOnly, SameSite::Lax, false),
        (_, true, false) => (Scope::LoginDomain, SameSite::None, https_required),
        (HostKind::CustomDomain, false, false) => (Scope::HostOnly, relaxed, https_required),
        (HostKind::LoginHost | HostKind::Subdomain, false, false) => {
            (Scope::LoginDomain, relaxed, https_required)
        }
    }
}

/// Development loopback: any `localhost` label, or a loopback literal.
#[must_use]
pub fn is_loopback(host: &str) -> bool {
    let host = domain::normalize_host(host);
    host == "127.0.0.1" || host == "[::1]" || host.split('.').any(|label| label == "localhost")
}

pub(crate) fn is_https(forwarded_proto: Option<&str>) -> bool {
    forwarded_proto
        .and_then(|p| p.split(',').next())
        .is_some_and(|p| p.trim().eq_ignore_ascii_case("https"))
}
