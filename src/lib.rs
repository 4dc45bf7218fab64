//! # pdf2md-ocr
//!
//! Convert PDF documents to Markdown by running every page through an OCR
//! vision-language model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    check the file exists, pick the output path
//!  ├─ 2. Backend  build from environment and load() it (timed)
//!  ├─ 3. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. OCR      page → PNG → backend.ocr_page(), strictly in order
//!  └─ 5. Output   join with "\n\n---\n\n", atomic write, stats
//! ```
//!
//! ## Backends
//!
//! | Backend    | Selected by                 | Runs |
//! |------------|-----------------------------|------|
//! | `endpoint` | default                     | HF dedicated endpoint (`HF_ENDPOINT_URL`) or hosted model (`HF_MODEL_ID`), with retry/backoff |
//! | `local`    | `PDF2MD_BACKEND=local`      | candle model in-process, weights fetched from the Hub on first use |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2md_ocr::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend configured from PDF2MD_BACKEND / HF_TOKEN / HF_ENDPOINT_URL / HF_MODEL_ID
//!     let config = ConversionConfig::default();
//!     let output = convert("document.pdf", None, &config).await?;
//!     eprintln!("{} pages → {}", output.stats.page_count, output.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md` binary (clap + anyhow + tracing-subscriber) |
//! | `local` | off     | In-process LightOnOCR backend (oar-ocr-vl on candle) |
//! | `cuda`  | off     | `local` with CUDA kernels |
//! | `metal` | off     | `local` with Metal kernels |
//! | `bundled` | off   | Embed the pdfium library in the binary instead of downloading it on first run |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2md-ocr = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{create_backend, BackendKind, EndpointBackend, OcrBackend};
#[cfg(feature = "local")]
pub use backend::LocalBackend;
pub use config::{ConversionConfig, ConversionConfigBuilder, EndpointConfig, Environment};
pub use convert::{convert, convert_from_bytes, convert_sync, convert_with_backend};
pub use error::{ConfigError, InferenceError, Pdf2MdError};
pub use output::{ConversionOutput, ConversionStats, PageResult, PAGE_SEPARATOR};
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
