//! Locate model files, downloading them from the Hugging Face Hub if needed.
//!
//! Downloads land in `{cache}/pdf2md/models/{org}--{name}/` and are written
//! to a `.part` file first, then renamed, so an interrupted download never
//! leaves a truncated file that looks complete. Later runs skip the network.

use crate::error::InferenceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Model served when nothing else is configured.
pub const DEFAULT_LOCAL_MODEL: &str = "lightonai/LightOnOCR-2-1B";

/// Files LightOnOCR reads from its model directory.
pub const REQUIRED_FILES: [&str; 4] = [
    "config.json",
    "processor_config.json",
    "tokenizer.json",
    "model.safetensors",
];

/// Where the model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// An already-downloaded model directory.
    Directory(PathBuf),
    /// A Hub repository id such as `lightonai/LightOnOCR-2-1B`.
    Hub { repo: String },
}

impl ModelSource {
    /// Name used in logs and error messages.
    pub fn label(&self) -> String {
        match self {
            ModelSource::Directory(dir) => dir.display().to_string(),
            ModelSource::Hub { repo } => repo.clone(),
        }
    }
}

/// Settings for Hub downloads.
#[derive(Clone, Default)]
pub struct HubSettings {
    pub hub_url: String,
    pub token: Option<String>,
    /// Overrides the platform cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl std::fmt::Debug for HubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSettings")
            .field("hub_url", &self.hub_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

/// A model directory holding every required file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub generation_config: Option<PathBuf>,
}

fn load_error(detail: impl Into<String>) -> InferenceError {
    InferenceError::Local {
        stage: "model download",
        detail: detail.into(),
    }
}

/// Resolve (and if necessary download) every file the model needs.
pub async fn resolve_model_files(
    source: &ModelSource,
    settings: &HubSettings,
) -> Result<ModelFiles, InferenceError> {
    match source {
        ModelSource::Directory(dir) => collect(&DirectoryStore { dir: dir.clone() }).await,
        ModelSource::Hub { repo } => {
            let store = HubStore::new(repo, settings)?;
            info!(repo = %repo, cache = %store.cache_dir.display(), "Resolving model files");
            collect(&store).await
        }
    }
}

/// A place model files can be fetched from. `Ok(None)` means "not there".
#[async_trait]
trait FileStore: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Option<PathBuf>, InferenceError>;

    async fn require(&self, name: &str) -> Result<PathBuf, InferenceError> {
        self.fetch(name)
            .await?
            .ok_or_else(|| load_error(format!("model is missing required file '{name}'")))
    }
}

async fn collect(store: &dyn FileStore) -> Result<ModelFiles, InferenceError> {
    let mut dir = None;
    for name in REQUIRED_FILES {
        let path = store.require(name).await?;
        if dir.is_none() {
            dir = path.parent().map(Path::to_path_buf);
        }
    }
    let dir = dir.ok_or_else(|| load_error("model files have no parent directory"))?;
    let generation_config = store.fetch("generation_config.json").await?;

    Ok(ModelFiles {
        dir,
        generation_config,
    })
}

struct DirectoryStore {
    dir: PathBuf,
}

#[async_trait]
impl FileStore for DirectoryStore {
    async fn fetch(&self, name: &str) -> Result<Option<PathBuf>, InferenceError> {
        let path = self.dir.join(name);
        Ok(path.is_file().then_some(path))
    }
}

struct HubStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    cache_dir: PathBuf,
}

impl HubStore {
    fn new(repo: &str, settings: &HubSettings) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pdf2md-ocr/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| load_error(e.to_string()))?;

        let cache_root = match &settings.cache_dir {
            Some(dir) => dir.clone(),
            None => default_cache_root()?,
        };

        Ok(Self {
            http,
            base_url: format!(
                "{}/{}/resolve/main",
                settings.hub_url.trim_end_matches('/'),
                repo
            ),
            token: settings.token.clone(),
            cache_dir: cache_root.join(repo_dir_name(repo)),
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<bool, InferenceError> {
        let mut request = self.http.get(url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        let mut response = request
            .send()
            .await
            .map_err(|e| load_error(format!("GET {url}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(load_error(format!("HTTP {} for {url}", response.status())));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| load_error(format!("{}: {e}", parent.display())))?;
        }

        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        let part = PathBuf::from(part);
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| load_error(format!("{}: {e}", part.display())))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| load_error(format!("reading {url}: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| load_error(format!("{}: {e}", part.display())))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| load_error(format!("{}: {e}", part.display())))?;
        drop(file);

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| load_error(format!("{}: {e}", dest.display())))?;
        debug!(url, bytes = written, "Downloaded model file");
        Ok(true)
    }
}

#[async_trait]
impl FileStore for HubStore {
    async fn fetch(&self, name: &str) -> Result<Option<PathBuf>, InferenceError> {
        let dest = self.cache_dir.join(name);
        if dest.is_file() {
            return Ok(Some(dest));
        }
        let url = format!("{}/{}", self.base_url, name);
        if self.download(&url, &dest).await? {
            Ok(Some(dest))
        } else {
            Ok(None)
        }
    }
}

fn default_cache_root() -> Result<PathBuf, InferenceError> {
    dirs::cache_dir()
        .map(|d| d.join("pdf2md").join("models"))
        .ok_or_else(|| load_error("no cache directory available on this platform"))
}

/// `org/name` → `org--name`, keeping cache entries one level deep.
fn repo_dir_name(repo: &str) -> String {
    repo.replace('/', "--")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn complete_model_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in REQUIRED_FILES {
            touch(dir.path(), name, "{}");
        }
        dir
    }

    #[test]
    fn repo_names_flatten() {
        assert_eq!(repo_dir_name("lightonai/LightOnOCR-2-1B"), "lightonai--LightOnOCR-2-1B");
    }

    #[tokio::test]
    async fn complete_directory_resolves_to_itself() {
        let dir = complete_model_dir();
        touch(dir.path(), "generation_config.json", "{}");

        let files = resolve_model_files(
            &ModelSource::Directory(dir.path().to_path_buf()),
            &HubSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(files.dir, dir.path());
        assert_eq!(
            files.generation_config,
            Some(dir.path().join("generation_config.json"))
        );
    }

    #[tokio::test]
    async fn generation_config_is_optional() {
        let dir = complete_model_dir();
        let files = resolve_model_files(
            &ModelSource::Directory(dir.path().to_path_buf()),
            &HubSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(files.generation_config, None);
    }

    #[tokio::test]
    async fn missing_tokenizer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "config.json", "{}");
        touch(dir.path(), "processor_config.json", "{}");

        let err = resolve_model_files(
            &ModelSource::Directory(dir.path().to_path_buf()),
            &HubSettings::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"), "got: {err}");
    }

    #[tokio::test]
    async fn cached_hub_files_skip_the_network() {
        let cache = tempfile::tempdir().unwrap();
        let repo_dir = cache.path().join("org--ocr");
        std::fs::create_dir_all(&repo_dir).unwrap();
        for name in REQUIRED_FILES {
            touch(&repo_dir, name, "{}");
        }
        touch(&repo_dir, "generation_config.json", "{}");

        // Unroutable hub URL: any download attempt would fail.
        let settings = HubSettings {
            hub_url: "http://127.0.0.1:9".to_string(),
            token: None,
            cache_dir: Some(cache.path().to_path_buf()),
        };
        let files = resolve_model_files(&ModelSource::Hub { repo: "org/ocr".into() }, &settings)
            .await
            .unwrap();
        assert_eq!(files.dir, repo_dir);
    }
}
