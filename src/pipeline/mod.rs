//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ backend::OcrBackend
//! (path)    (pdfium)   (PNG)      (endpoint / local)
//! ```
//!
//! 1. [`input`]:   validate the user-supplied path, derive the output path
//! 2. [`render`]:  rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]:  PNG-encode each `DynamicImage` for the backend

pub mod encode;
pub mod input;
pub mod render;
