//! HTTP transport for endpoint OCR.
//!
//! [`InferenceClient`] is the seam between the retry loop in
//! [`super::EndpointBackend`] and the network: the backend only sees parsed
//! response bodies and classified [`ClientError`]s.

use super::retry::IsKnownTransient;
use crate::config::EndpointConfig;
use crate::error::ConfigError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

/// Provider name of the serverless Hugging Face inference service.
pub const HF_INFERENCE_PROVIDER: &str = "hf-inference";

/// Error bodies longer than this are cut before they end up in messages.
const MAX_DETAIL_CHARS: usize = 500;

/// Sends one page image and returns the parsed response body.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, image_bytes: &[u8]) -> Result<Value, ClientError>;
}

/// A single failed request, before retry policy is applied.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a usable response.
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    /// The hosted service has no provider able to run the model.
    #[error("no inference provider serves model '{model}'")]
    NoProvider { model: String },

    /// The response could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The response parsed but held no text.
    #[error("Empty response from endpoint OCR.")]
    EmptyText,
}

impl ClientError {
    /// HTTP status of the failure, if the server sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Worth another attempt?
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => StatusCode::from_u16(*status)
                .map(|s| s.is_known_transient())
                .unwrap_or(false),
            ClientError::Network(e) => e.is_known_transient(),
            ClientError::EmptyText => true,
            ClientError::NoProvider { .. } | ClientError::InvalidResponse(_) => false,
        }
    }

    /// Human-readable description without the status prefix.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Status { status, body } => {
                let body = body.trim();
                if body.is_empty() {
                    StatusCode::from_u16(*status)
                        .ok()
                        .and_then(|s| s.canonical_reason())
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    truncate(body, MAX_DETAIL_CHARS)
                }
            }
            other => other.to_string(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Target {
    Dedicated { url: String },
    Hosted { model_id: String, url: String },
}

/// [`InferenceClient`] over `reqwest`.
///
/// Requests carry the token as a bearer credential and the PNG bytes as the
/// raw body. On the hosted path the model's provider mapping is checked once,
/// before the first inference request.
pub struct HttpInferenceClient {
    http: reqwest::Client,
    target: Target,
    token: String,
    hub_url: String,
    provider_checked: OnceCell<()>,
}

impl HttpInferenceClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pdf2md-ocr/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let target = match (config.endpoint_url.as_deref(), config.model_id.as_deref()) {
            (Some(url), _) if !url.trim().is_empty() => Target::Dedicated {
                url: url.trim().to_string(),
            },
            (_, Some(model_id)) => {
                let model_id = model_id.trim().to_string();
                Target::Hosted {
                    url: format!(
                        "{}/{}/models/{}",
                        config.router_url.trim_end_matches('/'),
                        HF_INFERENCE_PROVIDER,
                        model_id
                    ),
                    model_id,
                }
            }
            _ => return Err(ConfigError::MissingEndpoint),
        };

        Ok(Self {
            http,
            target,
            token: config.token.clone(),
            hub_url: config.hub_url.trim_end_matches('/').to_string(),
            provider_checked: OnceCell::new(),
        })
    }

    /// URL page images are posted to.
    pub fn request_url(&self) -> &str {
        match &self.target {
            Target::Dedicated { url } | Target::Hosted { url, .. } => url,
        }
    }

    async fn ensure_provider(&self, model_id: &str) -> Result<(), ClientError> {
        self.provider_checked
            .get_or_try_init(|| self.check_provider_mapping(model_id))
            .await
            .map(|_| ())
    }

    async fn check_provider_mapping(&self, model_id: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/models/{}", self.hub_url, model_id);
        debug!(%url, "Checking inference provider mapping");

        let resp = self
            .http
            .get(&url)
            .query(&[("expand[]", "inferenceProviderMapping")])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let info: Value = serde_json::from_slice(&body)
            .map_err(|e| ClientError::InvalidResponse(format!("model info: {e}")))?;
        if serves_hf_inference(&info["inferenceProviderMapping"]) {
            Ok(())
        } else {
            Err(ClientError::NoProvider {
                model: model_id.to_string(),
            })
        }
    }
}

/// The mapping is either keyed by provider name or a list of entries with a
/// `provider` field, depending on the Hub API version.
fn serves_hf_inference(mapping: &Value) -> bool {
    match mapping {
        Value::Object(map) => map.contains_key(HF_INFERENCE_PROVIDER),
        Value::Array(entries) => entries
            .iter()
            .any(|e| e["provider"].as_str() == Some(HF_INFERENCE_PROVIDER)),
        _ => false,
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn infer(&self, image_bytes: &[u8]) -> Result<Value, ClientError> {
        if let Target::Hosted { model_id, .. } = &self.target {
            self.ensure_provider(model_id).await?;
        }

        let resp = self
            .http
            .post(self.request_url())
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "image/png")
            .header(ACCEPT, "application/json")
            .body(image_bytes.to_vec())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Some servers answer with plain text rather than JSON.
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(body)),
        }
    }
}
