//! Conversion entry points.
//!
//! Every entry point runs the same pipeline:
//!
//! ```text
//! resolve input → backend load() → rasterise all pages
//!   → for each page in order: PNG → ocr_page → append
//!   → join with "\n\n---\n\n" → atomic write
//! ```
//!
//! Any failure aborts the whole conversion and leaves no output file behind.

use crate::backend::{create_backend, OcrBackend};
use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::output::{assemble_document, ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::{encode, input, render};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a PDF file to Markdown and write it next to the input (or to
/// `output` when given).
///
/// The backend is taken from `config.backend` if set, otherwise built from
/// the configured environment (`PDF2MD_BACKEND`, `HF_*`).
///
/// # Example
/// ```rust,no_run
/// use pdf2md_ocr::{convert, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let output = convert("document.pdf", None, &ConversionConfig::default()).await?;
/// println!("wrote {}", output.output_path.display());
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let input_path = input::resolve_input(input_path.as_ref())?;
    let backend = create_backend(config)?;
    run(&input_path, output_path, backend, config).await
}

/// Like [`convert`], with a caller-supplied backend.
pub async fn convert_with_backend(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    backend: Arc<dyn OcrBackend>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let input_path = input::resolve_input(input_path.as_ref())?;
    run(&input_path, output_path, backend, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_path, output_path, config))
}

/// Convert PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed on
/// return. Since there is no input path to derive it from, the output path
/// is required.
pub async fn convert_from_bytes(
    bytes: &[u8],
    output_path: &Path,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Pdf2MdError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| Pdf2MdError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `convert` returns
    convert(tmp.path(), Some(output_path), config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    input_path: &Path,
    output_path: Option<&Path>,
    backend: Arc<dyn OcrBackend>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let total_start = Instant::now();
    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input::default_output_path(input_path));
    info!(
        "Starting conversion: {} → {} ({} backend)",
        input_path.display(),
        output_path.display(),
        backend.name()
    );
    let callback = config.progress_callback.as_ref();

    // ── Step 1: Load backend ─────────────────────────────────────────────
    if let Some(cb) = callback {
        cb.on_model_load_start(backend.name());
    }
    let load_start = Instant::now();
    backend.load().await.map_err(Pdf2MdError::BackendLoadFailed)?;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;
    if let Some(cb) = callback {
        cb.on_model_load_complete(backend.name(), load_duration_ms);
    }

    // ── Step 2: Rasterise pages ──────────────────────────────────────────
    let rasterizer: Arc<dyn PageRasterizer> = match config.rasterizer {
        Some(ref r) => Arc::clone(r),
        None => Arc::new(PdfiumRasterizer::from_environment(
            &config.resolved_environment(),
        )),
    };
    let render_start = Instant::now();
    let images = render::render_pages(rasterizer, input_path, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let total_pages = images.len();
    info!("Rendered {} pages in {}ms", total_pages, render_duration_ms);

    if let Some(cb) = callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 3: OCR each page in order ───────────────────────────────────
    let ocr_start = Instant::now();
    let mut pages = Vec::with_capacity(total_pages);
    for (page_index, image) in images.into_iter().enumerate() {
        let page_num = page_index + 1;
        if let Some(cb) = callback {
            cb.on_page_start(page_num, total_pages);
        }
        let page_start = Instant::now();

        let result = match encode::encode_page(&image, page_index) {
            Ok(bytes) => backend
                .ocr_page(&bytes, page_index)
                .await
                .map_err(|source| Pdf2MdError::PageFailed {
                    page: page_num,
                    source,
                }),
            Err(e) => Err(e),
        };
        drop(image);

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                if let Some(cb) = callback {
                    cb.on_page_error(page_num, total_pages, &e.to_string());
                }
                return Err(e);
            }
        };

        let duration_ms = page_start.elapsed().as_millis() as u64;
        debug!("Page {}/{}: {} chars in {}ms", page_num, total_pages, text.len(), duration_ms);
        if let Some(cb) = callback {
            cb.on_page_complete(page_num, total_pages, text.len());
        }
        pages.push(PageResult {
            page_index,
            text,
            duration_ms,
        });
    }
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Step 4: Assemble and write ───────────────────────────────────────
    let markdown = assemble_document(&pages);
    write_atomic(&output_path, &markdown).await?;

    let stats = ConversionStats {
        page_count: total_pages,
        backend: backend.name().to_string(),
        load_duration_ms,
        render_duration_ms,
        ocr_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} pages, {}ms total → {}",
        total_pages,
        stats.total_duration_ms,
        output_path.display()
    );
    if let Some(cb) = callback {
        cb.on_conversion_complete(total_pages);
    }

    Ok(ConversionOutput {
        markdown,
        pages,
        stats,
        output_path,
    })
}

/// Write `contents` to `path` via a temp file in the same directory, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Pdf2MdError> {
    let write_err = |source: std::io::Error| Pdf2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_path);

    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/out.md");
        write_atomic(&out, "# hi").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "# hi");
        assert!(!dir.path().join("nested/deeper/out.md.tmp").exists());
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.md");
        std::fs::write(&out, "old").unwrap();
        write_atomic(&out, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_input_fails_before_backend() {
        let err = convert("/no/such/file.pdf", None, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }
}
