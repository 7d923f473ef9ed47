//! OAuth 2.0 refresh-token grant.
//!
//! Only token refresh is handled here; obtaining the first token set (the
//! consent flow) happens outside the engine and ends up in the stored
//! credential key.

use std::time::Duration;

use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::http;
use crate::provider::BoxFuture;
use crate::tokens::{RefreshedToken, TokenRefresher};

/// OAuth client registration of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

impl OAuthApp {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
        }
    }

    /// Returns an error if the client credentials are missing.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

/// How the client authenticates against the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// `client_id` and `client_secret` in the form body.
    #[default]
    Form,
    /// HTTP basic authentication.
    Basic,
}

/// Refreshes tokens with a `refresh_token` grant against a token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthRefresher {
    app: OAuthApp,
    http_client: reqwest::Client,
    client_auth: ClientAuth,
    scope: Option<String>,
}

impl OAuthRefresher {
    pub fn new(app: OAuthApp, timeout: Duration) -> ProviderResult<Self> {
        app.validate()?;
        Ok(Self {
            app,
            http_client: http::build_client(timeout)?,
            client_auth: ClientAuth::Form,
            scope: None,
        })
    }

    #[must_use]
    pub fn with_client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Sends `scope` with every refresh, as Microsoft identity requires.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.as_str()));
        }

        let mut request = self.http_client.post(&self.app.token_url);
        request = match self.client_auth {
            ClientAuth::Form => {
                params.push(("client_id", self.app.client_id.as_str()));
                params.push(("client_secret", self.app.client_secret.as_str()));
                request
            }
            ClientAuth::Basic => request.basic_auth(&self.app.client_id, Some(&self.app.client_secret)),
        };

        let response = request
            .form(&params)
            .send()
            .await
            .map_err(http::send_error)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::unavailable(format!(
                "token endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::auth_expired(format!(
                "token refresh rejected ({}): {}",
                status, body
            )));
        }

        let token: RefreshedToken = http::read_json(response).await?;
        debug!(expires_in = ?token.expires_in, "token endpoint issued access token");
        Ok(token)
    }
}

impl TokenRefresher for OAuthRefresher {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>> {
        Box::pin(self.refresh_token(refresh_token))
    }
}
