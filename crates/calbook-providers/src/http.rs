//! Shared HTTP plumbing for the REST adapters.
//!
//! Maps transport failures and HTTP status codes onto [`ProviderErrorCode`]s
//! so every adapter reports failures the same way:
//!
//! | Status            | Code                  |
//! |-------------------|-----------------------|
//! | 401, 403          | `AuthExpired`         |
//! | 404, 410          | `NotFound`            |
//! | 429               | `RateLimited`         |
//! | 403 quota reasons | `RateLimited`         |
//! | 5xx               | `ProviderUnavailable` |
//! | other 4xx         | `BadRequest`          |
//!
//! [`ProviderErrorCode`]: crate::ProviderErrorCode

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, ProviderResult};

/// Error reasons Google reports with a 403 when a quota, not the token, is
/// the problem.
const QUOTA_REASONS: [&str; 5] = [
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
    "quotaExceeded",
    "usageLimits",
];

pub(crate) fn build_client(timeout: Duration) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))
}

/// Classifies an error raised while sending a request.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::timeout("request timeout").with_source(e)
    } else if e.is_connect() {
        ProviderError::unavailable(format!("connection failed: {}", e)).with_source(e)
    } else {
        ProviderError::unavailable(format!("request failed: {}", e)).with_source(e)
    }
}

/// Passes successful responses through and turns failures into errors.
pub(crate) async fn check(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }

    let body = response.text().await.unwrap_or_default();
    let err = match status {
        StatusCode::FORBIDDEN if is_quota_error(&body) => {
            ProviderError::rate_limited(format!("quota exceeded ({}): {}", status, body))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::auth_expired(format!("access token rejected ({})", status))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            ProviderError::not_found(format!("resource not found ({})", status))
        }
        s if s.is_server_error() => {
            ProviderError::unavailable(format!("API error ({}): {}", status, body))
        }
        _ => ProviderError::bad_request(format!("API error ({}): {}", status, body)),
    };
    Err(err)
}

/// Reads and parses a JSON response body.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::unavailable(format!("failed to read response: {}", e)))?;
    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {}", e)).with_source(e)
    })
}

fn is_quota_error(body: &str) -> bool {
    QUOTA_REASONS.iter().any(|reason| body.contains(reason))
}
