//! The recognition model and its generation cap.
//!
//! Pages are read by LightOnOCR, built from a model directory with
//! `oar-ocr-vl`. Tokenisation, image preprocessing, the prompt template and
//! greedy decoding all live inside that model; this module only decides how
//! many tokens a page may produce.

use crate::error::InferenceError;
use image::RgbImage;
use oar_ocr_vl::LightOnOcr;
use serde_json::Value;
use std::path::Path;

/// Default cap on generated tokens per page.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 4096;

/// Reads one page image and returns its text. Called from a blocking thread.
pub trait PageRecognizer: Send + Sync {
    fn recognize(&self, page: RgbImage, max_new_tokens: usize) -> Result<String, InferenceError>;
}

impl PageRecognizer for LightOnOcr {
    fn recognize(&self, page: RgbImage, max_new_tokens: usize) -> Result<String, InferenceError> {
        // An empty instruction asks for plain transcription.
        match self.generate(&[page], &[""], max_new_tokens).into_iter().next() {
            Some(Ok(text)) => Ok(text.trim().to_string()),
            Some(Err(e)) => Err(InferenceError::Local {
                stage: "generate",
                detail: e.to_string(),
            }),
            None => Err(InferenceError::Local {
                stage: "generate",
                detail: "model returned no output for the page".to_string(),
            }),
        }
    }
}

/// Stopping rules for one generation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub max_new_tokens: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

impl GenerationSettings {
    /// Layered resolution: defaults, then `generation_config.json`, then an
    /// explicit cap.
    pub fn resolve(generation_config: Option<&Value>, max_new_tokens_override: Option<usize>) -> Self {
        let mut settings = Self::default();

        if let Some(max) = generation_config
            .and_then(|g| g["max_new_tokens"].as_u64())
            .filter(|&m| m > 0)
        {
            settings.max_new_tokens = max as usize;
        }
        if let Some(max) = max_new_tokens_override {
            settings.max_new_tokens = max;
        }
        settings
    }
}

/// Parse a JSON model asset.
pub(crate) fn read_json(path: &Path) -> Result<Value, InferenceError> {
    let raw = std::fs::read(path).map_err(|e| InferenceError::Local {
        stage: "load",
        detail: format!("{}: {e}", path.display()),
    })?;
    serde_json::from_slice(&raw).map_err(|e| InferenceError::Local {
        stage: "load",
        detail: format!("{}: {e}", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_layering() {
        let defaults = GenerationSettings::resolve(None, None);
        assert_eq!(defaults.max_new_tokens, DEFAULT_MAX_NEW_TOKENS);

        let gen = json!({"max_new_tokens": 1024, "eos_token_id": [2, 3]});
        assert_eq!(GenerationSettings::resolve(Some(&gen), None).max_new_tokens, 1024);
        assert_eq!(GenerationSettings::resolve(Some(&gen), Some(64)).max_new_tokens, 64);
    }

    #[test]
    fn zero_cap_in_generation_config_is_ignored() {
        let gen = json!({"max_new_tokens": 0});
        assert_eq!(
            GenerationSettings::resolve(Some(&gen), None).max_new_tokens,
            DEFAULT_MAX_NEW_TOKENS
        );
    }

    #[test]
    fn unreadable_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generation_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = read_json(&path).unwrap_err();
        assert!(err.to_string().contains("generation_config.json"), "got: {err}");
    }
}
