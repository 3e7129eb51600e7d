//! Analysis engine: turns documents + parameters into one AI request and
//! returns the raw report text.

mod gemini;
pub mod ingest;

use crate::error::AnalysisError;
use crate::model::{AnalysisConfig, AnalysisParams, Document, ACCEPTED_MIME_TYPES};
use crate::prompt;
use base64::Engine as _;
use gemini::{GeminiClient, InlineData, Part};
use tracing::info;

pub struct AnalysisEngine {
    cfg: AnalysisConfig,
    client: GeminiClient,
}

impl AnalysisEngine {
    pub fn new(cfg: AnalysisConfig, api_key: String) -> anyhow::Result<Self> {
        let client = GeminiClient::new(&cfg, api_key)?;
        Ok(Self { cfg, client })
    }

    /// Run one analysis. CSV/plain-text documents are concatenated and inlined
    /// into the prompt; PDFs and images travel as base64 inline data.
    pub async fn analyze(
        &self,
        documents: &[Document],
        params: &AnalysisParams,
    ) -> Result<String, AnalysisError> {
        if documents.is_empty() {
            return Err(AnalysisError::Validation(
                "at least one billing document is required".into(),
            ));
        }
        for doc in documents {
            if !ACCEPTED_MIME_TYPES.contains(&doc.mime_type.as_str()) {
                return Err(AnalysisError::UnsupportedFileType {
                    mime_type: doc.mime_type.clone(),
                });
            }
        }

        let parts = build_parts(documents, params);
        info!(
            request_id = %self.cfg.request_id,
            documents = documents.len(),
            model = %self.cfg.model,
            "submitting analysis request"
        );

        self.client.generate(prompt::MASTER_PROMPT, parts).await
    }
}

fn build_parts(documents: &[Document], params: &AnalysisParams) -> Vec<Part> {
    let mut parts = Vec::new();

    let mut combined_csv = String::new();
    for doc in documents.iter().filter(|d| d.is_textual()) {
        combined_csv.push_str(&String::from_utf8_lossy(&doc.content));
        combined_csv.push_str("\n\n");
    }
    if !combined_csv.is_empty() {
        parts.push(Part::Text {
            text: prompt::wrap_csv_content(combined_csv.trim_end()),
        });
    }

    parts.push(Part::Text {
        text: prompt::build_user_prompt(params),
    });

    for doc in documents.iter().filter(|d| !d.is_textual()) {
        parts.push(Part::Inline {
            inline_data: InlineData {
                mime_type: doc.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&doc.content),
            },
        });
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_doc() -> Document {
        Document {
            name: "bill.csv".into(),
            size: 20,
            mime_type: "text/csv".into(),
            content: b"service,cost\nec2,10".to_vec(),
        }
    }

    fn pdf_doc() -> Document {
        Document {
            name: "bill.pdf".into(),
            size: 4,
            mime_type: "application/pdf".into(),
            content: vec![0x25, 0x50, 0x44, 0x46],
        }
    }

    fn params() -> AnalysisParams {
        AnalysisParams {
            provider: "GCP".into(),
            budget: "$900".into(),
            services: "GKE".into(),
        }
    }

    #[test]
    fn csv_content_is_inlined_ahead_of_the_prompt() {
        let parts = build_parts(&[csv_doc()], &params());
        assert_eq!(parts.len(), 2);
        match &parts[0] {
            Part::Text { text } => assert!(text.contains("ec2,10")),
            other => panic!("expected inline CSV text, got {other:?}"),
        }
        match &parts[1] {
            Part::Text { text } => assert!(text.contains("GCP")),
            other => panic!("expected user prompt, got {other:?}"),
        }
    }

    #[test]
    fn binary_documents_become_inline_data() {
        let parts = build_parts(&[pdf_doc()], &params());
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], Part::Text { .. }));
        match &parts[1] {
            Part::Inline { inline_data } => {
                assert_eq!(inline_data.mime_type, "application/pdf");
                assert!(!inline_data.data.is_empty());
            }
            other => panic!("expected inline data, got {other:?}"),
        }
    }

    #[test]
    fn mixed_documents_keep_csv_first_and_binaries_last() {
        let parts = build_parts(&[pdf_doc(), csv_doc()], &params());
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], Part::Text { .. }));
        assert!(matches!(&parts[2], Part::Inline { .. }));
    }
}
