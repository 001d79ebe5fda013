//! PDF text extraction adapter.
//!
//! `pdf-extract` reads from a path, so every call writes the upload to a
//! uniquely named temp file. The file is owned by a `NamedTempFile` guard and
//! is removed when the guard drops, on success, error, and panic alike.
//! Parsing is CPU-bound and runs inside `tokio::task::spawn_blocking`.

use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

pub mod handlers;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to convert PDF to text: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to convert PDF to text: {0}")]
    Pdf(String),

    #[error("Failed to convert PDF to text: extraction worker aborted ({0})")]
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct PdfExtractor {
    temp_dir: PathBuf,
}

impl PdfExtractor {
    pub fn new(temp_dir: PathBuf) -> Self {
        Self { temp_dir }
    }

    /// Extracts the text of one PDF document.
    pub async fn extract_text(&self, bytes: bytes::Bytes) -> Result<String, ExtractionError> {
        let temp_dir = self.temp_dir.clone();
        tokio::task::spawn_blocking(move || extract_blocking(&temp_dir, &bytes))
            .await
            .map_err(|e| {
                // pdf-extract panics on some malformed inputs.
                warn!("PDF extraction worker failed: {e}");
                ExtractionError::Aborted(e.to_string())
            })?
    }
}

fn extract_blocking(temp_dir: &std::path::Path, bytes: &[u8]) -> Result<String, ExtractionError> {
    std::fs::create_dir_all(temp_dir)?;

    let mut temp_file = tempfile::Builder::new()
        .prefix("pdf-")
        .suffix(".pdf")
        .tempfile_in(temp_dir)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;

    debug!(
        "Extracting {} bytes via {}",
        bytes.len(),
        temp_file.path().display()
    );

    let text = pdf_extract::extract_text(temp_file.path())
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail_with_extraction_error() {
        let dir = TempDir::new().unwrap();
        let extractor = PdfExtractor::new(dir.path().to_path_buf());

        let result = extractor
            .extract_text(bytes::Bytes::from_static(b"this is not a pdf"))
            .await;

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("Failed to convert PDF to text"));
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_failure() {
        let dir = TempDir::new().unwrap();
        let extractor = PdfExtractor::new(dir.path().to_path_buf());

        let _ = extractor
            .extract_text(bytes::Bytes::from_static(b"%PDF-1.4\ntruncated"))
            .await;

        assert!(dir_is_empty(&dir), "temp file left behind");
    }

    #[tokio::test]
    async fn test_missing_temp_dir_is_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("uploads").join("scratch");
        let extractor = PdfExtractor::new(nested.clone());

        let _ = extractor
            .extract_text(bytes::Bytes::from_static(b"not a pdf"))
            .await;

        assert!(nested.is_dir());
        assert!(std::fs::read_dir(&nested).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_generated_pdf_text_is_extracted_and_temp_file_removed() {
        let dir = TempDir::new().unwrap();
        let extractor = PdfExtractor::new(dir.path().to_path_buf());
        let pdf = crate::export::render_pdf("# Alpha\n\nRust engineer", "Resume").unwrap();

        let text = extractor.extract_text(bytes::Bytes::from(pdf)).await.unwrap();

        assert!(text.contains("Alpha"), "got {text:?}");
        assert!(text.contains("Rust engineer"), "got {text:?}");
        assert!(dir_is_empty(&dir), "temp file left behind");
    }
}
