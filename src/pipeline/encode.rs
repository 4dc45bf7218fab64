//! Image encoding: `DynamicImage` → PNG bytes for the OCR backend.
//!
//! Both backends take raw encoded image bytes: the endpoint posts them as the
//! request body, the local backend decodes them again before preprocessing.
//! PNG is lossless, so text edges survive the round trip.

use crate::error::Pdf2MdError;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
///
/// `page_index` is 0-based and only used to label the error.
pub fn encode_page(img: &DynamicImage, page_index: usize) -> Result<Vec<u8>, Pdf2MdError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|source| Pdf2MdError::EncodeFailed {
            page: page_index + 1,
            source,
        })?;

    debug!(page = page_index + 1, bytes = buf.len(), "Encoded page as PNG");
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 0, 0])));
        let bytes = encode_page(&img, 0).expect("encode should succeed");
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&bytes).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }
}
