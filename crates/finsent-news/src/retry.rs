//! Retry loop for NewsAPI requests.

use std::future::Future;

use finsent_core::RetrySettings;

use crate::error::NewsError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// Retriable: timeouts, connection failures, 429, and 5xx. API-level errors
/// such as an invalid key and malformed bodies are returned immediately.
pub(crate) fn is_retriable(err: &NewsError) -> bool {
    match err {
        NewsError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        NewsError::RateLimited => true,
        NewsError::UnexpectedStatus { status } => *status >= 500,
        NewsError::Api { .. } | NewsError::Deserialize { .. } | NewsError::InvalidBaseUrl { .. } => {
            false
        }
    }
}

/// Runs `operation`, retrying transient failures up to `settings.max_retries`
/// times. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    settings: RetrySettings,
    mut operation: F,
) -> Result<T, NewsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NewsError>>,
{
    let mut retry = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retriable(&err) && retry < settings.max_retries => err,
            Err(err) => return Err(err),
        };
        retry += 1;
        let delay = settings.delay_for(retry);
        tracing::warn!(
            retry,
            max_retries = settings.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "NewsAPI request failed, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
