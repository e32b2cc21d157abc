use std::time::Duration;

use reqwest::{RequestBuilder, Response};

use crate::error::{AiError, Result};

#[derive(Debug, Clone)]
pub struct LlmRetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for LlmRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl LlmRetryConfig {
    /// No retries at all; used by tests that assert on the first failure.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after_secs {
            return Duration::from_secs(seconds);
        }

        let multiplier = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

pub fn parse_retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
}

pub async fn response_to_error(response: Response, provider: &str) -> AiError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();

    // Keep error bodies short; providers sometimes echo the whole prompt.
    const MAX_ERROR_BODY: usize = 512;
    let message = if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|idx| body.is_char_boundary(*idx))
            .unwrap_or(0);
        format!("{}... [truncated]", &body[..cut])
    } else {
        body
    };

    AiError::LlmHttp {
        provider: provider.to_string(),
        status,
        message,
        retry_after_secs: retry_after,
    }
}

/// Send a request built by `build`, retrying transient failures with backoff.
///
/// Returns the first successful response; non-retryable failures and the
/// last retryable failure are returned as errors.
pub async fn send_with_retry<F>(
    config: &LlmRetryConfig,
    provider: &str,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let response = match build().send().await {
            Ok(resp) => resp,
            Err(e) => {
                let error = AiError::Http(e);
                if !error.is_retryable() || attempt == config.max_retries {
                    return Err(error);
                }
                let delay = config.delay_for(attempt + 1, None);
                tracing::warn!(
                    provider,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after connection error"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(error);
                continue;
            }
        };

        if response.status().is_success() {
            return Ok(response);
        }

        let error = response_to_error(response, provider).await;
        if !error.is_retryable() || attempt == config.max_retries {
            return Err(error);
        }

        let delay = config.delay_for(attempt + 1, error.retry_after());
        tracing::warn!(
            provider,
            attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
        last_error = Some(error);
    }

    Err(last_error
        .unwrap_or_else(|| AiError::Llm(format!("{provider} request failed after retries"))))
}
