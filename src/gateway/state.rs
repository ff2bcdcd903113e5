use std::sync::Arc;

use url::Url;

use super::config::GatewayConfig;
use super::traits::{BoxError, DomainRegistry};
use crate::cookie_policy::{self, CookiePolicyEngine};
use crate::domain::{self, Classification, HostKind};
#[cfg(feature = "oauth")]
use crate::oauth::LinkClient;
use crate::session::SessionStore;

/// Shared state for gateway route handlers.
pub(super) struct GatewayState<U, A, D> {
    pub(super) config: Arc<GatewayConfig>,
    pub(super) cookies: CookiePolicyEngine,
    pub(super) sessions: Arc<SessionStore>,
    pub(super) users: Arc<U>,
    pub(super) apps: Arc<A>,
    pub(super) domains: Arc<D>,
    #[cfg(feature = "oauth")]
    pub(super) linker: Option<Arc<LinkClient>>,
}

// Manual Clone: avoid derive adding `U: Clone, A: Clone, D: Clone` bounds.
impl<U, A, D> Clone for GatewayState<U, A, D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            cookies: self.cookies.clone(),
            sessions: self.sessions.clone(),
            users: self.users.clone(),
            apps: self.apps.clone(),
            domains: self.domains.clone(),
            #[cfg(feature = "oauth")]
            linker: self.linker.clone(),
        }
    }
}

impl<U, A, D: DomainRegistry> GatewayState<U, A, D> {
    /// Classify `host` and resolve a custom domain's owner through the registry.
    pub(super) async fn classify(&self, host: &str) -> Result<Classification, BoxError> {
        let classification = domain::classify(host, &self.config.login_host);
        match classification.registry_key() {
            Some(key) => {
                let owner = self.domains.resolve_owner(key).await?;
                Ok(classification.with_app(owner))
            }
            None => Ok(classification),
        }
    }

    /// Classification of `host` if the platform serves it: the login host, an
    /// app subdomain, or a registered custom domain.
    pub(super) async fn served_host(&self, host: &str) -> Result<Option<Classification>, BoxError> {
        let classification = self.classify(host).await?;
        let served = match classification.kind {
            HostKind::LoginHost | HostKind::Subdomain => true,
            HostKind::CustomDomain => classification.app.is_some(),
        };
        Ok(served.then_some(classification))
    }

    /// Parse an absolute `http(s)` URL on a served host.
    pub(super) async fn served_url(
        &self,
        raw: &str,
    ) -> Result<Option<(Url, Classification)>, BoxError> {
        let Ok(url) = Url::parse(raw) else {
            return Ok(None);
        };
        if !matches!(url.scheme(), "http" | "https") || !url.username().is_empty() {
            return Ok(None);
        }
        let Some(host) = url.host_str() else {
            return Ok(None);
        };
        Ok(self.served_host(host).await?.map(|c| (url, c)))
    }
}

impl<U, A, D> GatewayState<U, A, D> {
    /// Scheme for URLs we build, trusting the proxy when it saw HTTPS.
    pub(super) fn scheme(&self, forwarded_proto: Option<&str>) -> &'static str {
        if self.config.https_required || cookie_policy::is_https(forwarded_proto) {
            "https"
        } else {
            "http"
        }
    }

    pub(super) fn login_origin(&self, forwarded_proto: Option<&str>) -> String {
        format!("{}://{}", self.scheme(forwarded_proto), self.config.login_host)
    }

    /// Absolute login-page URL that returns to `target` afterwards.
    pub(super) fn login_url(&self, forwarded_proto: Option<&str>, target: &str) -> String {
        format!(
            "{}{}?redirect={}",
            self.login_origin(forwarded_proto),
            super::LOGIN_PATH,
            urlencoding::encode(target)
        )
    }

    /// Absolute handshake URL on the login host that returns to `target`.
    pub(super) fn sso_init_url(&self, forwarded_proto: Option<&str>, target: &str) -> String {
        format!(
            "{}{}?target={}",
            self.login_origin(forwarded_proto),
            super::SSO_INIT_PATH,
            urlencoding::encode(target)
        )
    }
}
