//! Error types for the pdf2md-ocr library.
//!
//! Three layers, from the outside in:
//!
//! * [`Pdf2MdError`]:  **Fatal** for the whole document. Every failure that
//!   reaches the caller of [`crate::convert::convert`] is one of these; a
//!   single bad page aborts the conversion and nothing is written.
//!
//! * [`ConfigError`]:  raised while resolving configuration and constructing
//!   a backend (missing token, unknown backend name, malformed numbers).
//!   Never retried.
//!
//! * [`InferenceError`]:  a backend could not produce text for a page.
//!   Transient endpoint failures are retried inside the backend and only
//!   surface here once the retry budget is spent.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2md-ocr library.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input does not have a `.pdf` extension.
    #[error("File must be a PDF: '{path}'")]
    NotAPdf { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// A rendered page could not be serialised to PNG.
    #[error("Image encoding failed for page {page}: {source}")]
    EncodeFailed {
        page: usize,
        #[source]
        source: image::ImageError,
    },

    // ── Backend errors ────────────────────────────────────────────────────
    /// Backend configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend failed to initialise before any page was processed.
    #[error("OCR backend failed to load: {0}")]
    BackendLoadFailed(#[source] InferenceError),

    /// OCR failed for one page; the whole conversion is aborted.
    #[error("OCR failed for page {page}: {source}")]
    PageFailed {
        page: usize,
        #[source]
        source: InferenceError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Unset PDFIUM_LIB_PATH to download pdfium into the user cache, or point it\n\
at an existing copy of libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration problems detected before any inference happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `HF_TOKEN` is unset or blank.
    #[error("HF_TOKEN is required for endpoint OCR.")]
    MissingToken,

    /// Neither `HF_ENDPOINT_URL` nor `HF_MODEL_ID` is set.
    #[error("Set HF_ENDPOINT_URL or HF_MODEL_ID to use the endpoint backend.")]
    MissingEndpoint,

    /// `HF_TIMEOUT_S` is not a positive, finite number.
    #[error("Invalid HF_TIMEOUT_S value: {raw:?}")]
    InvalidTimeout { raw: String },

    /// `HF_RETRIES` is not an integer.
    #[error("Invalid HF_RETRIES value: {raw:?}")]
    InvalidRetries { raw: String },

    /// `HF_RETRIES` is an integer below zero.
    #[error("HF_RETRIES must be >= 0 (got {value})")]
    NegativeRetries { value: i64 },

    /// A numeric setting other than the endpoint ones is malformed.
    #[error("Invalid {key} value: {raw:?}")]
    InvalidNumber { key: &'static str, raw: String },

    /// `PDF2MD_BACKEND` names something other than `endpoint` or `local`.
    #[error("Unsupported PDF2MD_BACKEND '{value}'. Expected 'endpoint' or 'local'.")]
    UnknownBackend { value: String },

    /// The local backend was selected in a build without the `local` feature.
    #[error(
        "The local backend is not available in this build.\n\
Rebuild with `--features local` (or `cuda` / `metal`) to run OCR in-process."
    )]
    LocalBackendUnavailable,

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A backend failed to turn one page image into text.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// The remote endpoint failed permanently, or kept failing until the
    /// retry budget was exhausted.
    #[error("Endpoint OCR failed{}: {detail}", status_note(.status))]
    EndpointFailed { status: Option<u16>, detail: String },

    /// The configured model cannot be served by the hosted inference path.
    #[error("{reason}")]
    UnsupportedModel { reason: String },

    /// In-process inference failed. Never retried.
    #[error("Local OCR failed during {stage}: {detail}")]
    Local { stage: &'static str, detail: String },
}

impl InferenceError {
    /// The HTTP status attached to an endpoint failure, if one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            InferenceError::EndpointFailed { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_note(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}
