//! OCR backends: turn one encoded page image into text.
//!
//! ```text
//! PDF2MD_BACKEND ──▶ BackendKind::parse ──▶ create_backend
//!                                             ├─ endpoint → EndpointBackend (HTTP, retries)
//!                                             └─ local    → LocalBackend    (candle, feature `local`)
//! ```
//!
//! Only the selected variant is constructed. The local backend's runtime
//! stack is compiled in only with the `local` cargo feature; selecting it in
//! a build without that feature is a configuration error, never a silent
//! fallback to the endpoint.

pub mod endpoint;
#[cfg(feature = "local")]
pub mod local;

use crate::config::{ConversionConfig, Environment, ENV_BACKEND};
use crate::error::{ConfigError, InferenceError};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub use endpoint::EndpointBackend;
#[cfg(feature = "local")]
pub use local::LocalBackend;

/// Something that can read a page image.
///
/// `page_index` is 0-based and increases monotonically within one
/// conversion. Backends use it only for log context.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Short identifier used in logs and stats.
    fn name(&self) -> &'static str;

    /// Prepare heavyweight resources before the first page.
    ///
    /// Must be idempotent. Backends with nothing to prepare keep the default.
    async fn load(&self) -> Result<(), InferenceError> {
        Ok(())
    }

    /// Recognise the text on one page.
    async fn ocr_page(&self, image_bytes: &[u8], page_index: usize) -> Result<String, InferenceError>;
}

/// Which backend `PDF2MD_BACKEND` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Endpoint,
    Local,
}

impl BackendKind {
    /// Parse a backend name. Case and surrounding whitespace are ignored;
    /// unset or blank means [`BackendKind::Endpoint`].
    pub fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("endpoint") => Ok(BackendKind::Endpoint),
            Some("local") => Ok(BackendKind::Local),
            Some(_) => Err(ConfigError::UnknownBackend {
                value: raw.unwrap_or_default().trim().to_string(),
            }),
        }
    }

    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        Self::parse(env.get(ENV_BACKEND))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Endpoint => "endpoint",
            BackendKind::Local => "local",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(Some(s))
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the backend selected by the configuration's environment.
///
/// A pre-built backend in `config.backend` is returned as-is.
pub fn create_backend(config: &ConversionConfig) -> Result<Arc<dyn OcrBackend>, ConfigError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let env = config.resolved_environment();
    let kind = BackendKind::from_environment(&env)?;
    info!(backend = %kind, "Selecting OCR backend");

    match kind {
        BackendKind::Endpoint => Ok(Arc::new(EndpointBackend::from_environment(&env)?)),
        BackendKind::Local => create_local(&env),
    }
}

#[cfg(feature = "local")]
fn create_local(env: &Environment) -> Result<Arc<dyn OcrBackend>, ConfigError> {
    Ok(Arc::new(LocalBackend::from_environment(env)?))
}

#[cfg(not(feature = "local"))]
fn create_local(_env: &Environment) -> Result<Arc<dyn OcrBackend>, ConfigError> {
    Err(ConfigError::LocalBackendUnavailable)
}
