use std::env::VarError;
use std::net::SocketAddr;
use std::time::Duration;

#[cfg(feature = "oauth")]
use url::Url;

use crate::cookie_policy::CookiePolicyEngine;
use crate::domain;
#[cfg(feature = "oauth")]
use crate::oauth::OAuthConfig;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Gateway configuration.
///
/// Required field (`login_host`) is a constructor parameter, so there is no runtime "missing field" error.
///
/// Use [`from_env()`](GatewayConfig::from_env) for convention-based setup,
/// or [`new()`](GatewayConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub(crate) login_host: String,
    pub(crate) https_required: bool,
    pub(crate) production: bool,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl: time::Duration,
    pub(crate) redis_url: String,
    pub(crate) cache_timeout: Duration,
    pub(crate) forward_auth_deadline: Duration,
    pub(crate) sweep_interval: Duration,
    pub(crate) listen_addr: SocketAddr,
    #[cfg(feature = "oauth")]
    pub(crate) oauth: Option<OAuthConfig>,
}

impl GatewayConfig {
    /// Create config for `login_host` (may carry a `:port` in development).
    ///
    /// All optional fields use production defaults. Override with `with_*` methods.
    #[must_use]
    pub fn new(login_host: impl Into<String>) -> Self {
        Self {
            login_host: login_host.into(),
            https_required: true,
            production: true,
            session_cookie_name: "hostgate_session".into(),
            session_ttl: time::Duration::hours(24),
            redis_url: "redis://127.0.0.1:6379".into(),
            cache_timeout: Duration::from_millis(250),
            forward_auth_deadline: Duration::from_secs(2),
            sweep_interval: crate::session::DEFAULT_SWEEP_INTERVAL,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            #[cfg(feature = "oauth")]
            oauth: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Required env vars
    /// - `LOGIN_HOST`
    ///
    /// # Optional env vars
    /// - `HTTPS_REQUIRED` (default `true`)
    /// - `APP_ENV` (anything but `production` enables development-only public paths)
    /// - `SESSION_COOKIE_NAME`, `SESSION_TTL_SECS`
    /// - `REDIS_URL`, `CACHE_TIMEOUT_MS`
    /// - `FORWARD_AUTH_DEADLINE_MS`, `SWEEP_INTERVAL_SECS`, `LISTEN_ADDR`
    /// - `OAUTH_CLIENT_ID`, `OAUTH_AUTH_URL`, `OAUTH_TOKEN_URL`, `OAUTH_REDIRECT_URI`
    ///   (all four or none), `OAUTH_CLIENT_SECRET`, `OAUTH_PROVIDER`, `OAUTH_SCOPES`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let login_host =
            reader("LOGIN_HOST").map_err(|_| ConfigError::MissingVar("LOGIN_HOST".into()))?;
        if domain::normalize_host(&login_host).is_empty() {
            return Err(ConfigError::InvalidValue(
                "LOGIN_HOST".into(),
                "must not be empty".into(),
            ));
        }

        let mut config = Self::new(login_host)
            .with_https_required(parse_or(&reader, "HTTPS_REQUIRED", true)?)
            .with_production(reader("APP_ENV").map_or(true, |env| env == "production"));

        if let Ok(name) = reader("SESSION_COOKIE_NAME") {
            config = config.with_session_cookie_name(name);
        }
        if let Ok(url) = reader("REDIS_URL") {
            config = config.with_redis_url(url);
        }

        let ttl_secs: i64 = parse_or(&reader, "SESSION_TTL_SECS", 24 * 60 * 60)?;
        if ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_SECS".into(),
                "must be positive".into(),
            ));
        }

        config = config
            .with_session_ttl(time::Duration::seconds(ttl_secs))
            .with_cache_timeout(Duration::from_millis(parse_or(&reader, "CACHE_TIMEOUT_MS", 250)?))
            .with_forward_auth_deadline(Duration::from_millis(parse_or(
                &reader,
                "FORWARD_AUTH_DEADLINE_MS",
                2000,
            )?))
            .with_sweep_interval(Duration::from_secs(parse_or(
                &reader,
                "SWEEP_INTERVAL_SECS",
                300,
            )?))
            .with_listen_addr(parse_or(
                &reader,
                "LISTEN_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?);

        #[cfg(feature = "oauth")]
        let config = match oauth_from_reader(&reader)? {
            Some(oauth) => config.with_oauth(oauth),
            None => config,
        };

        Ok(config)
    }

    #[must_use]
    pub fn with_https_required(mut self, required: bool) -> Self {
        self.https_required = required;
        self
    }

    /// Production disables development-only public paths.
    #[must_use]
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: time::Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    #[must_use]
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_forward_auth_deadline(mut self, deadline: Duration) -> Self {
        self.forward_auth_deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = every;
        self
    }

    #[must_use]
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    #[cfg(feature = "oauth")]
    #[must_use]
    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    #[must_use]
    pub fn login_host(&self) -> &str {
        &self.login_host
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    #[must_use]
    pub fn session_ttl(&self) -> time::Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    #[must_use]
    pub fn cache_timeout(&self) -> Duration {
        self.cache_timeout
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.production
    }

    #[must_use]
    pub fn cookie_policy(&self) -> CookiePolicyEngine {
        CookiePolicyEngine::new(&self.login_host, self.https_required)
    }
}

fn parse_or<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(feature = "oauth")]
fn oauth_from_reader<F>(reader: &F) -> Result<Option<OAuthConfig>, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    const REQUIRED: [&str; 4] = [
        "OAUTH_CLIENT_ID",
        "OAUTH_AUTH_URL",
        "OAUTH_TOKEN_URL",
        "OAUTH_REDIRECT_URI",
    ];
    let values: Vec<Option<String>> = REQUIRED.iter().map(|key| reader(key).ok()).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if let Some(missing) = REQUIRED.iter().zip(&values).find(|(_, v)| v.is_none()) {
        return Err(ConfigError::MissingVar((*missing.0).into()));
    }

    let url = |key: &str, raw: &Option<String>| -> Result<Url, ConfigError> {
        raw.as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: url::ParseError| ConfigError::InvalidValue(key.into(), e.to_string()))
    };
    let client_id = values[0].clone().unwrap_or_default();
    let auth_url = url(REQUIRED[1], &values[1])?;
    let token_url = url(REQUIRED[2], &values[2])?;
    let redirect_uri = url(REQUIRED[3], &values[3])?;
    let provider = reader("OAUTH_PROVIDER").unwrap_or_else(|_| "oauth".into());

    let mut oauth = OAuthConfig::new(provider, client_id, auth_url, token_url, redirect_uri);
    if let Ok(secret) = reader("OAUTH_CLIENT_SECRET") {
        oauth = oauth.with_client_secret(secret);
    }
    if let Ok(scopes) = reader("OAUTH_SCOPES") {
        oauth = oauth.with_scopes(
            scopes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    Ok(Some(oauth))
}
