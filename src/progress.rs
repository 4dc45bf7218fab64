//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline loads the backend and processes each page.
//!
//! # Example
//!
//! ```rust
//! use pdf2md_ocr::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it works through a document.
///
/// Pages are processed sequentially, so events for one conversion never
/// overlap. All methods have default no-op implementations so callers only
/// override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called before the backend is loaded.
    ///
    /// # Arguments
    /// * `backend`:  backend name (`"endpoint"` or `"local"`)
    fn on_model_load_start(&self, backend: &str) {
        let _ = backend;
    }

    /// Called once the backend is ready to serve pages.
    ///
    /// # Arguments
    /// * `backend`:     backend name
    /// * `elapsed_ms`:  time spent in `load()`
    fn on_model_load_complete(&self, backend: &str, elapsed_ms: u64) {
        let _ = (backend, elapsed_ms);
    }

    /// Called once after rasterisation, before the first OCR request.
    ///
    /// # Arguments
    /// * `total_pages`:  number of pages that will be processed
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is sent to the backend.
    ///
    /// # Arguments
    /// * `page_num`:     1-indexed page number
    /// * `total_pages`:  total pages in the document
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is successfully recognised.
    ///
    /// # Arguments
    /// * `page_num`:     1-indexed page number
    /// * `total_pages`:  total pages
    /// * `text_len`:     byte length of the recognised text
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page fails. The conversion aborts right after.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page succeeded and the output was written.
    fn on_conversion_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ConversionProgressCallback for Recorder {
        fn on_model_load_start(&self, backend: &str) {
            self.events.lock().unwrap().push(format!("load:{backend}"));
        }

        fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("page:{page_num}/{total_pages}:{text_len}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_model_load_start("endpoint");
        cb.on_model_load_complete("endpoint", 3);
        cb.on_conversion_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "some error");
        cb.on_conversion_complete(5);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        let cb: &dyn ConversionProgressCallback = &rec;
        cb.on_model_load_start("local");
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, 12);
        cb.on_conversion_complete(2);

        let events = rec.events.lock().unwrap();
        assert_eq!(*events, vec!["load:local", "page:1/2:12"]);
    }
}
