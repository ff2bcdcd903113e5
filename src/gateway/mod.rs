//! Cross-domain authentication gateway for Axum.
//!
//! Mounts the forward-auth endpoint the reverse proxy consults, the login and
//! logout endpoints, and the SSO handshake that carries a login-host session
//! over to app subdomains and customer-owned domains.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hostgate::gateway::{GatewayConfig, gateway_routes};
//! use hostgate::session::{MemoryBackend, RedisBackend, SessionStore};
//!
//! // 1. Implement UserStore, AppSettings and DomainRegistry for your platform
//! // 2. Configure from environment
//! let config = GatewayConfig::from_env()?;
//!
//! // 3. Build the session store over the shared cache
//! let sessions = Arc::new(SessionStore::new(
//!     RedisBackend::open(config.redis_url())?,
//!     Arc::new(MemoryBackend::default()),
//! ));
//!
//! // 4. Mount the gateway and point the proxy's forward-auth at /auth/verify
//! let app = axum::Router::new().merge(gateway_routes(config, sessions, users, apps, domains));
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod forward_auth;
mod routes;
mod sso;
mod state;
mod traits;
mod types;

pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use forward_auth::X_AUTH_USER_ID;
pub use routes::gateway_routes;
pub use traits::{AppSettings, BoxError, DomainRegistry, UserStore};
pub use types::{LinkedAccount, User};

/// Forward-auth endpoint the reverse proxy calls for every request.
pub const VERIFY_PATH: &str = "/auth/verify";
pub const LOGIN_PATH: &str = "/login";
pub const LOGOUT_PATH: &str = "/logout";
pub const HEALTH_PATH: &str = "/health";
/// Handshake entry point on the login host.
pub const SSO_INIT_PATH: &str = "/sso/init";
/// Iframe page reporting the login-host session to its parent.
pub const SSO_CHECK_PATH: &str = "/sso/check";
/// Page on a custom domain that hosts the check iframe.
pub const SSO_BRIDGE_PATH: &str = "/sso/bridge";
/// Endpoint on a custom domain that turns a handed-off session into a cookie.
pub const SSO_SESSION_PATH: &str = "/sso/session";
#[cfg(feature = "oauth")]
pub const OAUTH_LINK_START_PATH: &str = "/oauth/link/start";
#[cfg(feature = "oauth")]
pub const OAUTH_LINK_CALLBACK_PATH: &str = "/oauth/link/callback";
