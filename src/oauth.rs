use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// Third-party `OAuth2` provider used to link an external account to a platform user.
///
/// Required fields are constructor parameters; optional ones use `with_*` methods.
///
/// ```rust,ignore
/// use hostgate::oauth::OAuthConfig;
///
/// let config = OAuthConfig::new(
///     "github",
///     "my-client-id",
///     "https://github.com/login/oauth/authorize".parse()?,
///     "https://github.com/login/oauth/access_token".parse()?,
///     "https://login.example/oauth/link/callback".parse()?,
/// )
/// .with_client_secret("s3cret");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) provider: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a provider configuration.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        client_id: impl Into<String>,
        auth_url: Url,
        token_url: Url,
        redirect_uri: Url,
    ) -> Self {
        Self {
            provider: provider.into(),
            client_id: client_id.into(),
            client_secret: None,
            auth_url,
            token_url,
            redirect_uri,
            scopes: Vec::new(),
        }
    }

    /// Client secret sent with the token exchange.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Override the requested scopes (default: none).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Provider name recorded with the linked account.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorization endpoint URL.
    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Token exchange endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// `OAuth2` redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Requested `OAuth2` scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// `OAuth2` authorization-code client for account linking.
pub struct LinkClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl LinkClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the default HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Authorization URL carrying the caller-issued `state`.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.config.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", self.config.redirect_uri.as_str())
                .append_pair("state", state);
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
        }
        url.into()
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, or
    /// [`Error::OAuth`] if the token endpoint returns an error.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, Error> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.config.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Maps a non-2xx provider response to [`Error::OAuth`] carrying the status and body.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "github",
            "test-client",
            "https://provider.example/authorize".parse().unwrap(),
            "https://provider.example/token".parse().unwrap(),
            "https://login.example/oauth/link/callback".parse().unwrap(),
        )
    }

    #[test]
    fn authorization_url_carries_state() {
        let client = LinkClient::new(test_config());
        let url = client.authorization_url("user_1_1700000000_abc");

        assert!(url.starts_with("https://provider.example/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("state=user_1_1700000000_abc"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Flogin.example%2Foauth%2Flink%2Fcallback"));
        assert!(!url.contains("scope="));
    }

    #[test]
    fn authorization_url_with_scopes() {
        let client = LinkClient::new(test_config().with_scopes(vec!["repo".into(), "read:user".into()]));
        let url = client.authorization_url("s");
        assert!(url.contains("scope=repo+read%3Auser"));
    }

    #[test]
    fn config_accessors() {
        let config = test_config().with_client_secret("shh");
        assert_eq!(config.provider(), "github");
        assert_eq!(config.client_id(), "test-client");
        assert_eq!(config.client_secret.as_deref(), Some("shh"));
        assert_eq!(config.token_url().as_str(), "https://provider.example/token");
    }
}
