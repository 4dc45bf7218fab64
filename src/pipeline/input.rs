//! Input resolution: validate a user-supplied path before any work starts.
//!
//! Opening the file here (rather than leaving it to pdfium) turns permission
//! problems into a clear error instead of a generic "could not open".

use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check that `path` exists and is readable, returning it as an owned path.
pub fn resolve_input(path: &Path) -> Result<PathBuf, Pdf2MdError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(Pdf2MdError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2MdError::FileNotFound { path }),
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Reject paths whose extension is not `.pdf` (case-insensitive).
pub fn require_pdf_extension(path: &Path) -> Result<(), Pdf2MdError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Ok(())
    } else {
        Err(Pdf2MdError::NotAPdf {
            path: path.to_path_buf(),
        })
    }
}

/// Default output location: the input path with its extension replaced by `.md`.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_input(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path()).unwrap_err();
        assert!(matches!(err, Pdf2MdError::FileNotFound { .. }));
    }

    #[test]
    fn existing_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("doc.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        assert_eq!(resolve_input(&pdf).unwrap(), pdf);
    }

    #[test]
    fn pdf_extension_check() {
        assert!(require_pdf_extension(Path::new("a/b.pdf")).is_ok());
        assert!(require_pdf_extension(Path::new("SCAN.PDF")).is_ok());
        assert!(matches!(
            require_pdf_extension(Path::new("notes.txt")),
            Err(Pdf2MdError::NotAPdf { .. })
        ));
        assert!(require_pdf_extension(Path::new("noext")).is_err());
    }

    #[test]
    fn output_path_swaps_extension() {
        assert_eq!(
            default_output_path(Path::new("/tmp/report.pdf")),
            PathBuf::from("/tmp/report.md")
        );
        assert_eq!(
            default_output_path(Path::new("scan.PDF")),
            PathBuf::from("scan.md")
        );
    }
}
