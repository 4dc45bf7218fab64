//! Remote OCR over a Hugging Face inference endpoint.
//!
//! ## Retry Strategy
//!
//! Each page gets `retries + 1` attempts. Transient failures (408/429/5xx
//! gateway statuses, connection errors, timeouts, empty responses) are
//! retried after `min(0.5 * 2^attempt, 8)` seconds, so the default four
//! retries wait 0.5 s → 1 s → 2 s → 4 s, under 8 s of backoff per page.
//! Everything else fails the page immediately.

pub mod client;
pub mod response;
pub mod retry;

use crate::backend::OcrBackend;
use crate::config::{EndpointConfig, Environment};
use crate::error::{ConfigError, InferenceError};
use async_trait::async_trait;
use client::{ClientError, HttpInferenceClient, InferenceClient};
use response::extract_generated_text;
use retry::backoff_delay;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, warn};

const NO_PROVIDER_ADVICE: &str = "No inference provider is available for the configured model. \
Try setting HF_ENDPOINT_URL for a dedicated endpoint or choose a model \
supported by the Hugging Face Inference API.";

const HOSTED_NOT_FOUND_ADVICE: &str = "The hosted Inference API does not serve this model. \
Set HF_ENDPOINT_URL for a dedicated endpoint or choose a model \
with an available inference provider.";

/// [`OcrBackend`] that posts page images to a remote endpoint.
pub struct EndpointBackend {
    config: EndpointConfig,
    client: Arc<dyn InferenceClient>,
}

impl EndpointBackend {
    /// Resolve settings from `env` and build the HTTP client.
    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        Self::new(EndpointConfig::from_environment(env)?)
    }

    pub fn new(config: EndpointConfig) -> Result<Self, ConfigError> {
        let client = HttpInferenceClient::new(&config)?;
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    /// Use a caller-supplied transport.
    pub fn with_client(config: EndpointConfig, client: Arc<dyn InferenceClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    async fn attempt(&self, image_bytes: &[u8]) -> Result<String, ClientError> {
        let response = self.client.infer(image_bytes).await?;
        let text = extract_generated_text(&response);
        if text.is_empty() {
            return Err(ClientError::EmptyText);
        }
        Ok(text)
    }
}

#[async_trait]
impl OcrBackend for EndpointBackend {
    fn name(&self) -> &'static str {
        "endpoint"
    }

    async fn ocr_page(&self, image_bytes: &[u8], page_index: usize) -> Result<String, InferenceError> {
        let retries = self.config.retries;
        let mut attempt: u32 = 0;

        loop {
            let err = match self.attempt(image_bytes).await {
                Ok(text) => {
                    debug!(page_index, attempt, chars = text.len(), "Endpoint OCR succeeded");
                    return Ok(text);
                }
                Err(err) => err,
            };

            if let ClientError::NoProvider { .. } = err {
                return Err(InferenceError::UnsupportedModel {
                    reason: NO_PROVIDER_ADVICE.to_string(),
                });
            }
            if err.status() == Some(404) && !self.config.is_dedicated() {
                return Err(InferenceError::UnsupportedModel {
                    reason: HOSTED_NOT_FOUND_ADVICE.to_string(),
                });
            }

            if attempt >= retries || !err.is_retryable() {
                return Err(InferenceError::EndpointFailed {
                    status: err.status(),
                    detail: err.detail(),
                });
            }

            let delay = backoff_delay(attempt);
            warn!(
                page_index,
                "Endpoint attempt {}/{} failed: {} (retrying in {:?})",
                attempt + 1,
                retries + 1,
                err,
                delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Scripted {
        replies: Mutex<VecDeque<Result<Value, ClientError>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Value, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl InferenceClient for Scripted {
        async fn infer(&self, _image_bytes: &[u8]) -> Result<Value, ClientError> {
            *self.calls.lock().unwrap() += 1;
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ClientError::InvalidResponse("script exhausted".into())))
        }
    }

    fn status(code: u16) -> Result<Value, ClientError> {
        Err(ClientError::Status {
            status: code,
            body: format!("error {code}"),
        })
    }

    fn hosted(retries: u32) -> EndpointConfig {
        EndpointConfig::new("t").model_id("org/model").retries(retries)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success() {
        let client = Scripted::new(vec![status(503), Ok(json!([{"generated_text": "ok"}]))]);
        let backend = EndpointBackend::with_client(hosted(4), client.clone());

        let started = tokio::time::Instant::now();
        let text = backend.ocr_page(b"png", 0).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(client.calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_last_status() {
        let client = Scripted::new(vec![status(503), status(502), status(504)]);
        let backend = EndpointBackend::with_client(hosted(2), client.clone());

        let started = tokio::time::Instant::now();
        let err = backend.ocr_page(b"png", 3).await.unwrap_err();
        assert_eq!(client.calls(), 3);
        assert_eq!(err.status(), Some(504));
        assert_eq!(err.to_string(), "Endpoint OCR failed (status 504): error 504");
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_status_is_not_retried() {
        let client = Scripted::new(vec![status(401)]);
        let backend = EndpointBackend::with_client(hosted(4), client.clone());

        let err = backend.ocr_page(b"png", 0).await.unwrap_err();
        assert_eq!(client.calls(), 1);
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_text_is_retried() {
        let client = Scripted::new(vec![Ok(json!([])), Ok(json!({"text": "second try"}))]);
        let backend = EndpointBackend::with_client(hosted(1), client.clone());

        assert_eq!(backend.ocr_page(b"png", 0).await.unwrap(), "second try");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_one_attempt() {
        let client = Scripted::new(vec![Ok(json!(""))]);
        let backend = EndpointBackend::with_client(hosted(0), client.clone());

        let err = backend.ocr_page(b"png", 0).await.unwrap_err();
        assert_eq!(client.calls(), 1);
        assert_eq!(
            err.to_string(),
            "Endpoint OCR failed: Empty response from endpoint OCR."
        );
    }

    #[tokio::test]
    async fn missing_provider_is_fatal_advice() {
        let client = Scripted::new(vec![Err(ClientError::NoProvider {
            model: "org/model".into(),
        })]);
        let backend = EndpointBackend::with_client(hosted(4), client.clone());

        let err = backend.ocr_page(b"png", 0).await.unwrap_err();
        assert_eq!(client.calls(), 1);
        assert!(matches!(err, InferenceError::UnsupportedModel { .. }));
        assert!(err.to_string().contains("HF_ENDPOINT_URL"));
    }

    #[tokio::test]
    async fn hosted_404_is_fatal_advice() {
        let client = Scripted::new(vec![status(404)]);
        let backend = EndpointBackend::with_client(hosted(4), client.clone());

        let err = backend.ocr_page(b"png", 0).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("The hosted Inference API does not serve this model."));
    }

    #[tokio::test]
    async fn dedicated_404_is_plain_failure() {
        let client = Scripted::new(vec![status(404)]);
        let config = EndpointConfig::new("t").endpoint_url("https://e.example");
        let backend = EndpointBackend::with_client(config, client.clone());

        let err = backend.ocr_page(b"png", 0).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(client.calls(), 1);
    }
}
