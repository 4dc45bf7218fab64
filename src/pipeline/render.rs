//! PDF rasterisation: render every page to an RGB `DynamicImage`.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! Tokio worker threads keep serving network I/O.
//!
//! Pages are rendered at `dpi / 72` times their native size: PDF user space
//! is 72 units per inch, so a 300-DPI render of a Letter page is
//! 2550 × 3300 px.

use crate::config::{ConversionConfig, Environment, ENV_PDFIUM_LIB_PATH};
use crate::error::Pdf2MdError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a PDF file into one image per page, in document order.
///
/// Implementations are called from a blocking thread.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(
        &self,
        pdf_path: &Path,
        scale: f32,
        password: Option<&str>,
    ) -> Result<Vec<DynamicImage>, Pdf2MdError>;
}

/// [`PageRasterizer`] backed by a pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    /// Explicit library file. If None, the library is provisioned by
    /// `pdfium-auto`: extracted from the binary with the `bundled` feature,
    /// otherwise downloaded once into the user cache.
    pub library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Honour `PDFIUM_LIB_PATH` from the given environment.
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            library_path: env.get_non_blank(ENV_PDFIUM_LIB_PATH).map(PathBuf::from),
        }
    }

    fn bind(&self) -> Result<Pdfium, Pdf2MdError> {
        match &self.library_path {
            Some(path) => {
                debug!("Binding pdfium from {}", path.display());
                pdfium_auto::bind_pdfium_from_path(path)
            }
            None => {
                if !pdfium_auto::is_pdfium_cached() {
                    info!(
                        "pdfium not cached, downloading to {}",
                        pdfium_auto::pdfium_cache_dir().display()
                    );
                }
                pdfium_auto::bind_pdfium_silent()
            }
        }
        .map_err(|e| Pdf2MdError::PdfiumBindingFailed(e.to_string()))
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        pdf_path: &Path,
        scale: f32,
        password: Option<&str>,
    ) -> Result<Vec<DynamicImage>, Pdf2MdError> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, password)
            .map_err(|e| classify_open_error(pdf_path, password, e))?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

        let mut results = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                Pdf2MdError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            results.push(image);
        }

        Ok(results)
    }
}

fn classify_open_error(path: &Path, password: Option<&str>, e: PdfiumError) -> Pdf2MdError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if password.is_some() {
            Pdf2MdError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            Pdf2MdError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        Pdf2MdError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

/// Rasterise every page of `pdf_path` on the blocking pool.
pub async fn render_pages(
    rasterizer: Arc<dyn PageRasterizer>,
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<Vec<DynamicImage>, Pdf2MdError> {
    let path = pdf_path.to_path_buf();
    let scale = config.render_scale();
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || rasterizer.rasterize(&path, scale, password.as_deref()))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Render task panicked: {}", e)))?
}
