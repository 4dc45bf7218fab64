//! Configuration types for PDF-to-Markdown conversion.
//!
//! Two kinds of configuration flow through the library:
//!
//! * [`ConversionConfig`]:  per-run knobs (render DPI, PDF password, progress
//!   callback, pre-built collaborators), built via [`ConversionConfigBuilder`].
//! * [`Environment`]:  a snapshot of environment-style key/value settings
//!   (`PDF2MD_BACKEND`, `HF_TOKEN`, …). Backends are constructed from an
//!   explicit snapshot rather than reading `std::env` themselves, so tests can
//!   exercise every configuration path without touching the process
//!   environment.
//!
//! [`EndpointConfig`] is resolved from an [`Environment`] once per endpoint
//! backend and is immutable afterwards.

use crate::backend::OcrBackend;
use crate::error::{ConfigError, Pdf2MdError};
use crate::pipeline::render::PageRasterizer;
use crate::progress::ProgressCallback;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// ── Environment keys ─────────────────────────────────────────────────────

/// Selects the OCR backend: `endpoint` (default) or `local`.
pub const ENV_BACKEND: &str = "PDF2MD_BACKEND";
/// Dedicated inference endpoint URL.
pub const ENV_ENDPOINT_URL: &str = "HF_ENDPOINT_URL";
/// Hosted model identifier, used when no dedicated endpoint is configured.
pub const ENV_MODEL_ID: &str = "HF_MODEL_ID";
/// Hugging Face access token.
pub const ENV_TOKEN: &str = "HF_TOKEN";
/// Per-request timeout in seconds (float).
pub const ENV_TIMEOUT: &str = "HF_TIMEOUT_S";
/// Number of retries after the first failed attempt.
pub const ENV_RETRIES: &str = "HF_RETRIES";
/// Hub repository of the model used by the local backend.
pub const ENV_LOCAL_MODEL: &str = "PDF2MD_LOCAL_MODEL";
/// Directory holding an already-downloaded local model.
pub const ENV_LOCAL_MODEL_DIR: &str = "PDF2MD_LOCAL_MODEL_DIR";
/// Overrides the local backend's generation cap.
pub const ENV_MAX_NEW_TOKENS: &str = "PDF2MD_MAX_NEW_TOKENS";
/// Path to a pdfium shared library.
pub const ENV_PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";

// ── Environment ──────────────────────────────────────────────────────────

/// An explicit snapshot of environment-style configuration.
///
/// ```rust
/// use pdf2md_ocr::Environment;
///
/// let env = Environment::from_pairs([("PDF2MD_BACKEND", " Local ")]);
/// assert_eq!(env.get_non_blank("PDF2MD_BACKEND"), Some("Local"));
/// assert_eq!(env.get("HF_TOKEN"), None);
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// An empty environment: every key resolves to its default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build an environment from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value of `key`, exactly as set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Trimmed value of `key`; blank values count as unset.
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Set (or override) a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Builder-style [`Environment::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

// Values may hold credentials, so only the keys are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Environment").field("keys", &keys).finish()
    }
}

// ── Endpoint configuration ───────────────────────────────────────────────

/// Settings for the remote endpoint backend.
///
/// Valid only when a token is present and at least one of `endpoint_url` /
/// `model_id` is set; [`EndpointConfig::from_environment`] enforces this.
#[derive(Clone, PartialEq)]
pub struct EndpointConfig {
    /// Dedicated inference endpoint. Takes precedence over `model_id`.
    pub endpoint_url: Option<String>,
    /// Hosted model served through the `hf-inference` provider.
    pub model_id: Option<String>,
    /// Bearer token sent with every request.
    pub token: String,
    /// Per-request timeout. Default: 120 s.
    pub timeout: Duration,
    /// Retries after the first attempt. Default: 4 (five attempts in total).
    pub retries: u32,
    /// Hugging Face Hub base URL (provider-mapping lookups).
    pub hub_url: String,
    /// Inference router base URL (hosted inference requests).
    pub router_url: String,
}

impl EndpointConfig {
    pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;
    pub const DEFAULT_RETRIES: u32 = 4;
    pub const DEFAULT_HUB_URL: &'static str = "https://huggingface.co";
    pub const DEFAULT_ROUTER_URL: &'static str = "https://router.huggingface.co";

    /// A config with the given token and defaults for everything else.
    ///
    /// Still needs an endpoint URL or model id before it is usable.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint_url: None,
            model_id: None,
            token: token.into(),
            timeout: Duration::from_secs_f64(Self::DEFAULT_TIMEOUT_SECS),
            retries: Self::DEFAULT_RETRIES,
            hub_url: Self::DEFAULT_HUB_URL.to_string(),
            router_url: Self::DEFAULT_ROUTER_URL.to_string(),
        }
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn hub_url(mut self, url: impl Into<String>) -> Self {
        self.hub_url = url.into();
        self
    }

    pub fn router_url(mut self, url: impl Into<String>) -> Self {
        self.router_url = url.into();
        self
    }

    /// Resolve the endpoint settings from an environment snapshot.
    ///
    /// Checks run in a fixed order (token, target, timeout, retries) so the
    /// first problem reported is stable.
    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        let token = env
            .get_non_blank(ENV_TOKEN)
            .ok_or(ConfigError::MissingToken)?;
        let endpoint_url = env.get_non_blank(ENV_ENDPOINT_URL).map(str::to_string);
        let model_id = env.get_non_blank(ENV_MODEL_ID).map(str::to_string);
        if endpoint_url.is_none() && model_id.is_none() {
            return Err(ConfigError::MissingEndpoint);
        }

        Ok(Self {
            endpoint_url,
            model_id,
            token: token.to_string(),
            timeout: parse_timeout(env.get(ENV_TIMEOUT))?,
            retries: parse_retries(env.get(ENV_RETRIES))?,
            ..Self::new(token)
        })
    }

    /// Re-check the invariants for configs assembled by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if blank(&self.endpoint_url) && blank(&self.model_id) {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                raw: format!("{:?}", self.timeout),
            });
        }
        Ok(())
    }

    /// True when requests go to a dedicated endpoint rather than the hosted API.
    pub fn is_dedicated(&self) -> bool {
        self.endpoint_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty())
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("model_id", &self.model_id)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

/// Parse `HF_TIMEOUT_S`. Unset means the default; anything set must be a
/// positive, finite number of seconds.
fn parse_timeout(raw: Option<&str>) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs_f64(EndpointConfig::DEFAULT_TIMEOUT_SECS));
    };
    let invalid = || ConfigError::InvalidTimeout {
        raw: raw.to_string(),
    };
    let secs: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// Parse `HF_RETRIES`. Unset means the default; negative values are rejected.
fn parse_retries(raw: Option<&str>) -> Result<u32, ConfigError> {
    let Some(raw) = raw else {
        return Ok(EndpointConfig::DEFAULT_RETRIES);
    };
    let value: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidRetries {
        raw: raw.to_string(),
    })?;
    if value < 0 {
        return Err(ConfigError::NegativeRetries { value });
    }
    u32::try_from(value).map_err(|_| ConfigError::InvalidRetries {
        raw: raw.to_string(),
    })
}

// ── Conversion configuration ─────────────────────────────────────────────

/// Configuration for one PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2md_ocr::{ConversionConfig, Environment};
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .environment(Environment::from_pairs([("PDF2MD_BACKEND", "endpoint")]))
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// Pages are rendered at `dpi / 72` times their native PDF size.
    pub dpi: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Settings snapshot used to select and configure the backend.
    /// If None, the process environment is captured at conversion time.
    pub environment: Option<Environment>,

    /// Pre-constructed OCR backend. Takes precedence over the environment.
    pub backend: Option<Arc<dyn OcrBackend>>,

    /// Pre-constructed rasteriser. If None, pages are rendered with pdfium.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,

    /// Receives conversion progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            password: None,
            environment: None,
            backend: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn PageRasterizer>"))
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The environment to resolve backend settings from.
    pub fn resolved_environment(&self) -> Environment {
        self.environment.clone().unwrap_or_else(Environment::capture)
    }

    /// Render scale relative to the PDF's native 72-DPI coordinate space.
    pub fn render_scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.config.environment = Some(env);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MdError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConfigError::Invalid(format!("DPI must be 72–600, got {}", c.dpi)).into());
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        Environment::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn endpoint_config_defaults() {
        let cfg = EndpointConfig::from_environment(&env(&[
            ("HF_TOKEN", "hf_abc"),
            ("HF_MODEL_ID", "lightonai/LightOnOCR-2-1B"),
        ]))
        .unwrap();
        assert_eq!(cfg.timeout, Duration::from_secs(120));
        assert_eq!(cfg.retries, 4);
        assert_eq!(cfg.endpoint_url, None);
        assert!(!cfg.is_dedicated());
        assert_eq!(cfg.hub_url, EndpointConfig::DEFAULT_HUB_URL);
    }

    #[test]
    fn endpoint_config_requires_token() {
        let err = EndpointConfig::from_environment(&env(&[("HF_ENDPOINT_URL", "https://x")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);

        let err = EndpointConfig::from_environment(&env(&[
            ("HF_TOKEN", "   "),
            ("HF_ENDPOINT_URL", "https://x"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);
    }

    #[test]
    fn endpoint_config_requires_url_or_model() {
        let err = EndpointConfig::from_environment(&env(&[("HF_TOKEN", "t")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingEndpoint);

        let err = EndpointConfig::from_environment(&env(&[
            ("HF_TOKEN", "t"),
            ("HF_ENDPOINT_URL", ""),
            ("HF_MODEL_ID", " "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingEndpoint);
    }

    #[test]
    fn endpoint_config_parses_numbers() {
        let cfg = EndpointConfig::from_environment(&env(&[
            ("HF_TOKEN", "t"),
            ("HF_ENDPOINT_URL", "https://example.com"),
            ("HF_TIMEOUT_S", "2.5"),
            ("HF_RETRIES", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.timeout, Duration::from_millis(2500));
        assert_eq!(cfg.retries, 0);
        assert!(cfg.is_dedicated());
    }

    #[test]
    fn endpoint_config_rejects_bad_numbers() {
        let base = [("HF_TOKEN", "t"), ("HF_MODEL_ID", "m")];
        let with = |k: &'static str, v: &'static str| {
            let mut pairs = base.to_vec();
            pairs.push((k, v));
            EndpointConfig::from_environment(&env(&pairs)).unwrap_err()
        };

        assert_eq!(
            with("HF_TIMEOUT_S", "soon"),
            ConfigError::InvalidTimeout { raw: "soon".into() }
        );
        assert_eq!(
            with("HF_TIMEOUT_S", "-1"),
            ConfigError::InvalidTimeout { raw: "-1".into() }
        );
        assert_eq!(
            with("HF_TIMEOUT_S", "inf"),
            ConfigError::InvalidTimeout { raw: "inf".into() }
        );
        assert_eq!(
            with("HF_RETRIES", "three"),
            ConfigError::InvalidRetries {
                raw: "three".into()
            }
        );
        assert_eq!(
            with("HF_RETRIES", "-2"),
            ConfigError::NegativeRetries { value: -2 }
        );
    }

    #[test]
    fn endpoint_config_debug_redacts_token() {
        let cfg = EndpointConfig::new("hf_secret").model_id("m");
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("hf_secret"), "got: {dbg}");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn environment_debug_hides_values() {
        let e = env(&[("HF_TOKEN", "hf_secret")]);
        let dbg = format!("{e:?}");
        assert!(dbg.contains("HF_TOKEN"));
        assert!(!dbg.contains("hf_secret"));
    }

    #[test]
    fn builder_validates_dpi() {
        assert!(ConversionConfig::builder().dpi(50).build().is_err());
        let cfg = ConversionConfig::builder().dpi(144).build().unwrap();
        assert_eq!(cfg.render_scale(), 2.0);
        assert_eq!(ConversionConfig::default().render_scale(), 300.0 / 72.0);
    }
}
