//! Cross-domain authentication gateway for multi-tenant app hosting.
//!
//! One login host issues sessions; hosted apps live on its subdomains or on
//! customer-owned domains. The reverse proxy asks [`gateway`]'s forward-auth
//! endpoint whether each request may pass, and the SSO handshake carries the
//! login-host session to hosts that cannot read its cookie.
//!
//! - [`domain`]: classify a request host
//! - [`session`]: dual-store sessions (Redis primary, in-process fallback)
//! - [`cookie_policy`]: `Domain`/`SameSite`/`Secure` per response
//! - [`csrf`]: stateless OAuth state tokens
//! - [`directory`]: in-memory collaborator tables

pub mod cookie_policy;
pub mod csrf;
pub mod directory;
pub mod domain;
pub mod error;
pub mod gateway;
#[cfg(feature = "oauth")]
pub mod oauth;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use cookie_policy::{CookiePolicy, CookiePolicyEngine};
pub use directory::StaticDirectory;
pub use domain::{Classification, HostKind, classify};
pub use error::Error;
pub use gateway::{GatewayConfig, GatewayError, gateway_routes};
#[cfg(feature = "oauth")]
pub use oauth::{LinkClient, OAuthConfig, TokenResponse};
pub use session::{SessionRecord, SessionStore};
pub use types::{SessionId, UserId};
