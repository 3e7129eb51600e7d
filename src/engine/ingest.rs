//! Billing document ingestion.
//!
//! Mime detection is extension-based; unsupported types are rejected here,
//! before any AI request is built.

use crate::error::AnalysisError;
use crate::model::{Document, ACCEPTED_MIME_TYPES};
use std::path::Path;

/// Map a file extension to one of the accepted mime types.
pub fn mime_for_path(path: &Path) -> Result<&'static str, AnalysisError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "tsv" => Ok("text/csv"),
        "txt" => Ok("text/plain"),
        "pdf" => Ok("application/pdf"),
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "" => Err(AnalysisError::UnsupportedFileType {
            mime_type: "unknown (no file extension)".into(),
        }),
        other => Err(AnalysisError::UnsupportedFileType {
            mime_type: format!(".{other}"),
        }),
    }
}

/// Read the given paths into in-memory documents. Fails on the first
/// unsupported or unreadable file so nothing partial reaches the AI call.
pub fn load_documents(paths: &[std::path::PathBuf]) -> Result<Vec<Document>, AnalysisError> {
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let mime_type = mime_for_path(path)?;
        debug_assert!(ACCEPTED_MIME_TYPES.contains(&mime_type));
        let content = std::fs::read(path).map_err(|source| AnalysisError::FileRead {
            name: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        docs.push(Document {
            name,
            size: content.len() as u64,
            mime_type: mime_type.to_string(),
            content,
        });
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn accepted_extensions_map_to_accepted_mimes() {
        for (ext, mime) in [
            ("csv", "text/csv"),
            ("pdf", "application/pdf"),
            ("png", "image/png"),
            ("jpeg", "image/jpeg"),
        ] {
            let path = PathBuf::from(format!("bill.{ext}"));
            assert_eq!(mime_for_path(&path).unwrap(), mime);
        }
    }

    #[test]
    fn unsupported_extension_is_rejected_with_type_in_message() {
        let err = mime_for_path(&PathBuf::from("archive.zip")).unwrap_err();
        assert!(err.to_string().contains(".zip"));
        assert!(matches!(err, AnalysisError::UnsupportedFileType { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error_naming_the_file() {
        let err = load_documents(&[PathBuf::from("/no/such/bill.csv")]).unwrap_err();
        assert!(matches!(err, AnalysisError::FileRead { .. }));
        assert!(err.to_string().contains("bill.csv"));
    }
}
