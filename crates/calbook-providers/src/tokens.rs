//! OAuth access tokens and their per-credential cache.
//!
//! Each adapter owns one [`TokenCache`]. The cache refreshes lazily when the
//! stored expiry has passed, and concurrent callers on the same credential
//! share a single in-flight refresh: the first caller refreshes while holding
//! the lock, the others wait and then read the new token.
//!
//! A cache with a [`TokenStore`] hands every refreshed token set back to it,
//! so rotated refresh tokens outlive the process.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use calbook_core::ProviderType;

use crate::error::{ProviderError, ProviderErrorCode, ProviderResult};
use crate::provider::BoxFuture;

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Information about an OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires, as epoch milliseconds.
    #[serde(default, rename = "expiry_date", with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenInfo {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Reads the token fields of a stored credential key.
    pub fn from_key(key: &serde_json::Value) -> ProviderResult<Self> {
        Self::deserialize(key).map_err(|e| {
            ProviderError::configuration(format!("credential key is not an OAuth token set: {}", e))
                .with_source(e)
        })
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            // Tokens without an expiry are used until the provider rejects them.
            None => false,
        }
    }

    /// Updates the access token after a refresh.
    pub fn apply(&mut self, refreshed: RefreshedToken) {
        self.access_token = refreshed.access_token;
        self.expires_at = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated);
        }
    }
}

/// A token returned by a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Providers that rotate refresh tokens return a new one.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchanges a refresh token for a new access token.
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<RefreshedToken>>;
}

/// Persists the token set of a credential after a refresh.
pub trait TokenStore: Send + Sync {
    fn save<'a>(&'a self, credential_id: i64, token: &'a TokenInfo) -> BoxFuture<'a, ProviderResult<()>>;
}

/// Lazily refreshed access token of one credential.
pub struct TokenCache {
    provider: ProviderType,
    token: Mutex<TokenInfo>,
    refresher: Arc<dyn TokenRefresher>,
    store: Option<(i64, Arc<dyn TokenStore>)>,
}

impl TokenCache {
    pub fn new(provider: ProviderType, token: TokenInfo, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            provider,
            token: Mutex::new(token),
            refresher,
            store: None,
        }
    }

    /// Builder: save refreshed tokens of `credential_id` to `store`.
    pub fn with_store(mut self, credential_id: i64, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some((credential_id, store));
        self
    }

    /// Returns a valid access token, refreshing it first if it has expired.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderErrorCode::AuthExpired`] when the token cannot be
    /// refreshed, or the refresher's transient error code when the token
    /// endpoint is unreachable.
    pub async fn access_token(&self) -> ProviderResult<String> {
        let mut token = self.token.lock().await;
        if !token.is_expired() {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token.refresh_token.clone().ok_or_else(|| {
            ProviderError::auth_expired("access token expired and no refresh token is stored")
                .with_provider(self.provider.as_str())
        })?;

        debug!(provider = %self.provider, "refreshing access token");
        let refreshed = self.refresher.refresh(&refresh_token).await.map_err(|e| {
            if e.is_retryable() {
                e.with_provider(self.provider.as_str())
            } else {
                ProviderError::new(
                    ProviderErrorCode::AuthExpired,
                    format!("token refresh failed: {}", e.message()),
                )
                .with_provider(self.provider.as_str())
            }
        })?;

        token.apply(refreshed);
        info!(provider = %self.provider, "refreshed access token");

        // The new token is usable even if saving it fails.
        if let Some((credential_id, store)) = &self.store
            && let Err(e) = store.save(*credential_id, &token).await
        {
            warn!(provider = %self.provider, credential_id, error = %e, "failed to save refreshed token");
        }
        Ok(token.access_token.clone())
    }

    /// Tags a failed API call with the provider and drops the token if the
    /// provider rejected it.
    pub async fn observe<T>(&self, result: ProviderResult<T>) -> ProviderResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.code() == ProviderErrorCode::AuthExpired {
                    self.mark_expired().await;
                }
                Err(e.with_provider(self.provider.as_str()))
            }
        }
    }

    /// Forces the next [`access_token`](Self::access_token) call to refresh.
    ///
    /// Called when the provider rejects a token before its recorded expiry.
    pub async fn mark_expired(&self) {
        self.token.lock().await.expires_at = Some(DateTime::<Utc>::MIN_UTC);
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("provider", &self.provider)
            .field("persisted", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
