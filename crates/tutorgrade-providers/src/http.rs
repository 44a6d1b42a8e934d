//! Status handling shared by the HTTP backends.

use std::time::Duration;

use tutorgrade_core::error::ProviderError;

pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("failed to build HTTP client")
}

pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(e.to_string())
    }
}

/// Map non-success statuses to provider errors.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            .saturating_mul(1000);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after,
        });
    }
    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::AuthenticationFailed(body));
    }
    if status == 404 {
        return Err(ProviderError::ModelNotFound(model.to_string()));
    }
    if status >= 400 {
        let message = response.text().await.unwrap_or_default();
        return Err(ProviderError::ApiError { status, message });
    }
    Ok(response)
}

pub(crate) fn parse_error(e: reqwest::Error) -> ProviderError {
    ProviderError::ApiError {
        status: 0,
        message: format!("failed to parse response: {e}"),
    }
}
