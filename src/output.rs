//! Result types returned by a successful conversion.
//!
//! All types derive `Serialize` so the CLI can emit them with `--json`.

use serde::Serialize;
use std::path::PathBuf;

/// The Markdown string placed between consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Everything produced by one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Page texts joined with [`PAGE_SEPARATOR`].
    pub markdown: String,
    /// One entry per page, in document order.
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
    /// Where `markdown` was written.
    pub output_path: PathBuf,
}

/// OCR result for a single page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    /// 0-based page index.
    pub page_index: usize,
    /// Text returned by the backend, unmodified.
    pub text: String,
    /// Time spent encoding and recognising this page.
    pub duration_ms: u64,
}

/// Timing summary for a conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionStats {
    pub page_count: usize,
    /// Name of the backend that served the pages.
    pub backend: String,
    pub load_duration_ms: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Join page texts in order with [`PAGE_SEPARATOR`].
pub fn assemble_document(pages: &[PageResult]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(i: usize, text: &str) -> PageResult {
        PageResult {
            page_index: i,
            text: text.to_string(),
            duration_ms: 0,
        }
    }

    #[test]
    fn pages_joined_with_rule() {
        let doc = assemble_document(&[page(0, "Hello World!"), page(1, "test PDF")]);
        assert_eq!(doc, "Hello World!\n\n---\n\ntest PDF");
    }

    #[test]
    fn single_and_empty_documents() {
        assert_eq!(assemble_document(&[page(0, "only")]), "only");
        assert_eq!(assemble_document(&[]), "");
    }

    #[test]
    fn output_serialises() {
        let out = ConversionOutput {
            markdown: "x".into(),
            pages: vec![page(0, "x")],
            stats: ConversionStats {
                page_count: 1,
                backend: "endpoint".into(),
                ..Default::default()
            },
            output_path: PathBuf::from("out.md"),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["stats"]["page_count"], 1);
        assert_eq!(json["pages"][0]["text"], "x");
        assert_eq!(json["output_path"], "out.md");
    }
}
