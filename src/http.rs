//! JSON-over-HTTP calls to hosted providers, with timeout and retry.
//!
//! Both the embedding and the completion providers speak the OpenAI wire
//! format, so they share [`post_json`].
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! When every attempt timed out the error is [`QaError::Timeout`].

use std::time::Duration;

use crate::config::HttpSettings;
use crate::error::QaError;

/// Which provider a request belongs to; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Completion,
}

impl Service {
    fn label(self) -> &'static str {
        match self {
            Service::Embedding => "embedding",
            Service::Completion => "completion",
        }
    }

    pub(crate) fn error(self, message: String) -> QaError {
        match self {
            Service::Embedding => QaError::EmbeddingProvider(message),
            Service::Completion => QaError::LanguageModel(message),
        }
    }
}

/// Build a client whose every request is bounded by `timeout_secs`.
pub fn build_client(settings: &HttpSettings, service: Service) -> Result<reqwest::Client, QaError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| service.error(format!("failed to build HTTP client: {}", e)))
}

/// Delay before retry `attempt` (1-based; `0` is treated as the first).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// POST `body` to `url` with bearer auth and return the parsed JSON reply.
pub async fn post_json(
    client: &reqwest::Client,
    settings: &HttpSettings,
    service: Service,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value, QaError> {
    let mut last_err = None;

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::warn!(
                service = service.label(),
                attempt,
                delay_secs = delay.as_secs(),
                "retrying provider request"
            );
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json::<serde_json::Value>().await.map_err(|e| {
                        service.error(format!("invalid JSON response: {}", e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(service.error(format!("API error {}: {}", status, body_text)));
                    continue;
                }

                return Err(service.error(format!("API error {}: {}", status, body_text)));
            }
            Err(e) if e.is_timeout() => {
                last_err = Some(QaError::Timeout {
                    service: service.label(),
                    secs: settings.timeout_secs,
                });
            }
            Err(e) => {
                last_err = Some(service.error(format!("request failed: {}", e)));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| service.error("request failed after retries".to_string())))
}
