//! Host classification.
//!
//! Maps a request host to the login host, one of its app subdomains, or a
//! customer-owned domain. Pure string logic; resolving a custom domain's owner
//! is left to the caller's registry.

/// Which side of the cookie boundary a host sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    /// The login host itself, or `www.` in front of it.
    LoginHost,
    /// `<app>.<login host>`.
    Subdomain,
    /// Anything else.
    CustomDomain,
}

/// Result of classifying a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Normalized host (lowercase, no port, no trailing dot).
    pub host: String,
    pub kind: HostKind,
    /// Owning application. Filled for subdomains here; for custom domains only
    /// after a registry lookup.
    pub app: Option<String>,
}

impl Classification {
    /// Host to hand to the custom-domain registry, if this is a custom domain
    /// that can be looked up as an exact string.
    #[must_use]
    pub fn registry_key(&self) -> Option<&str> {
        match self.kind {
            HostKind::CustomDomain if is_registry_safe(&self.host) => Some(&self.host),
            _ => None,
        }
    }

    #[must_use]
    pub fn with_app(mut self, app: Option<String>) -> Self {
        self.app = app;
        self
    }
}

/// Lowercase, drop any `:port` and a trailing dot.
#[must_use]
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let without_port = if raw.starts_with('[') {
        // [::1]:8080
        match raw.find(']') {
            Some(end) => &raw[..=end],
            None => raw,
        }
    } else {
        match raw.rsplit_once(':') {
            Some((host, port)) if port.bytes().all(|b| b.is_ascii_digit()) => host,
            _ => raw,
        }
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}

/// Only `[a-z0-9.-]` may reach the registry; everything else (wildcards,
/// escapes, underscores) has no owner.
#[must_use]
pub fn is_registry_safe(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
}

/// Classify `host` relative to `login_host`. Total: every input maps to exactly one kind.
#[must_use]
pub fn classify(host: &str, login_host: &str) -> Classification {
    let host = normalize_host(host);
    let login = normalize_host(login_host);

    if host == login || host.strip_prefix("www.") == Some(login.as_str()) {
        return Classification {
            host,
            kind: HostKind::LoginHost,
            app: None,
        };
    }

    let app = host
        .strip_suffix(login.as_str())
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|label| is_app_label(label))
        .map(str::to_owned);

    match app {
        Some(app) => Classification {
            host,
            kind: HostKind::Subdomain,
            app: Some(app),
        },
        None => Classification {
            host,
            kind: HostKind::CustomDomain,
            app: None,
        },
    }
}

fn is_app_label(label: &str) -> bool {
    !label.is_empty()
        && label != "www"
        && !label.contains('.')
        && is_registry_safe(label)
        && !label.starts_with('-')
        && !label.ends_with('-')
}
