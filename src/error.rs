use thiserror::Error;

/// Failure taxonomy for an analysis attempt. Each variant renders to a distinct
/// user-facing message; upstream response bodies never appear here (they go to
/// the debug log only).
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Missing required information for analysis: {0}")]
    Validation(String),
    #[error("Unsupported file type: {mime_type}")]
    UnsupportedFileType { mime_type: String },
    #[error("Could not read the uploaded file: {name}")]
    FileRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("An error occurred during analysis. Please try again later.")]
    Upstream {
        #[source]
        source: anyhow::Error,
    },
    #[error("Received an unexpected or empty response from the analysis service.")]
    EmptyReport,
}

impl AnalysisError {
    pub fn upstream(source: impl Into<anyhow::Error>) -> Self {
        AnalysisError::Upstream {
            source: source.into(),
        }
    }
}
