//! In-process OCR with LightOnOCR on candle.
//!
//! The backend starts unloaded. The first `load()` (or the first page)
//! resolves the model directory, opens the device and builds the model;
//! every later call reuses that state. Loading and generation are
//! CPU/GPU-bound and run on the blocking pool.

pub mod device;
pub mod hub;
pub mod model;

use crate::backend::OcrBackend;
use crate::config::{
    EndpointConfig, Environment, ENV_LOCAL_MODEL, ENV_LOCAL_MODEL_DIR, ENV_MAX_NEW_TOKENS,
    ENV_TOKEN,
};
use crate::error::{ConfigError, InferenceError};
use async_trait::async_trait;
use device::{select_device, DeviceChoice, SystemProbe};
use hub::{resolve_model_files, HubSettings, ModelFiles, ModelSource, DEFAULT_LOCAL_MODEL};
use model::{read_json, GenerationSettings, PageRecognizer};
use oar_ocr_vl::LightOnOcr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Settings for the local backend.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    pub source: ModelSource,
    pub hub: HubSettings,
    /// Overrides the generation cap from `generation_config.json`.
    pub max_new_tokens: Option<usize>,
}

impl LocalConfig {
    /// `PDF2MD_LOCAL_MODEL_DIR` wins over `PDF2MD_LOCAL_MODEL`; `HF_TOKEN`
    /// is optional and only used for downloads.
    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        let source = match env.get_non_blank(ENV_LOCAL_MODEL_DIR) {
            Some(dir) => ModelSource::Directory(PathBuf::from(dir)),
            None => ModelSource::Hub {
                repo: env
                    .get_non_blank(ENV_LOCAL_MODEL)
                    .unwrap_or(DEFAULT_LOCAL_MODEL)
                    .to_string(),
            },
        };

        let max_new_tokens = match env.get_non_blank(ENV_MAX_NEW_TOKENS) {
            None => None,
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        key: ENV_MAX_NEW_TOKENS,
                        raw: raw.to_string(),
                    })
                }
            },
        };

        Ok(Self {
            source,
            hub: HubSettings {
                hub_url: EndpointConfig::DEFAULT_HUB_URL.to_string(),
                token: env.get_non_blank(ENV_TOKEN).map(str::to_string),
                cache_dir: None,
            },
            max_new_tokens,
        })
    }
}

/// Model and stopping rules, ready to serve pages.
pub struct LoadedModel {
    pub recognizer: Box<dyn PageRecognizer>,
    pub settings: GenerationSettings,
}

impl LoadedModel {
    /// Blocking: decode the PNG, then transcribe it.
    fn recognise(&self, image_bytes: &[u8], page_index: usize) -> Result<String, InferenceError> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| InferenceError::Local {
                stage: "image decode",
                detail: e.to_string(),
            })?
            .to_rgb8();

        let (width, height) = image.dimensions();
        let text = self
            .recognizer
            .recognize(image, self.settings.max_new_tokens)?;
        debug!(page_index, width, height, chars = text.len(), "Local generation done");
        Ok(text)
    }
}

/// Produces a [`LoadedModel`]. Swappable so the lifecycle can be tested
/// without weights.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, device: DeviceChoice) -> Result<LoadedModel, InferenceError>;
}

/// Builds LightOnOCR from a local or downloaded model directory.
pub struct LightOnOcrLoader {
    config: LocalConfig,
}

impl LightOnOcrLoader {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelLoader for LightOnOcrLoader {
    async fn load(&self, choice: DeviceChoice) -> Result<LoadedModel, InferenceError> {
        let files = resolve_model_files(&self.config.source, &self.config.hub).await?;
        let max_new_tokens = self.config.max_new_tokens;

        tokio::task::spawn_blocking(move || build_model(&files, choice, max_new_tokens))
            .await
            .map_err(|e| InferenceError::Local {
                stage: "load",
                detail: format!("load task panicked: {e}"),
            })?
    }
}

fn build_model(
    files: &ModelFiles,
    choice: DeviceChoice,
    max_new_tokens: Option<usize>,
) -> Result<LoadedModel, InferenceError> {
    let load_err = |detail: String| InferenceError::Local {
        stage: "load",
        detail,
    };

    let generation_config = files.generation_config.as_deref().map(read_json).transpose()?;
    let settings = GenerationSettings::resolve(generation_config.as_ref(), max_new_tokens);

    let device = choice
        .device()
        .map_err(|e| load_err(format!("cannot open {} device: {e}", choice.kind)))?;
    let model = LightOnOcr::from_dir(&files.dir, device)
        .map_err(|e| load_err(format!("{}: {e}", files.dir.display())))?;
    debug!(max_new_tokens = settings.max_new_tokens, "LightOnOCR built");

    Ok(LoadedModel {
        recognizer: Box::new(model),
        settings,
    })
}

/// [`OcrBackend`] running the model inside this process.
pub struct LocalBackend {
    config: LocalConfig,
    device: DeviceChoice,
    loader: Option<Arc<dyn ModelLoader>>,
    state: OnceCell<Arc<LoadedModel>>,
}

impl LocalBackend {
    pub fn from_environment(env: &Environment) -> Result<Self, ConfigError> {
        Ok(Self::new(LocalConfig::from_environment(env)?))
    }

    /// Create an unloaded backend. The device is probed here, once.
    pub fn new(config: LocalConfig) -> Self {
        Self {
            config,
            device: select_device(&SystemProbe),
            loader: None,
            state: OnceCell::new(),
        }
    }

    /// Replace the LightOnOCR loader.
    pub fn with_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn device(&self) -> DeviceChoice {
        self.device
    }

    pub fn is_loaded(&self) -> bool {
        self.state.initialized()
    }

    async fn loaded(&self) -> Result<Arc<LoadedModel>, InferenceError> {
        self.state
            .get_or_try_init(|| async {
                let loader: Arc<dyn ModelLoader> = match &self.loader {
                    Some(loader) => Arc::clone(loader),
                    None => Arc::new(LightOnOcrLoader::new(self.config.clone())),
                };
                let start = Instant::now();
                info!(model = %self.config.source.label(), device = %self.device.kind, "Loading local model");
                let loaded = loader.load(self.device).await?;
                info!("Local model ready in {}ms", start.elapsed().as_millis());
                Ok::<_, InferenceError>(Arc::new(loaded))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl OcrBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn load(&self) -> Result<(), InferenceError> {
        self.loaded().await.map(|_| ())
    }

    async fn ocr_page(&self, image_bytes: &[u8], page_index: usize) -> Result<String, InferenceError> {
        let loaded = self.loaded().await?;
        let bytes = image_bytes.to_vec();
        tokio::task::spawn_blocking(move || loaded.recognise(&bytes, page_index))
            .await
            .map_err(|e| InferenceError::Local {
                stage: "generate",
                detail: format!("generation task panicked: {e}"),
            })?
    }
}
