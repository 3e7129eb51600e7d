//! System and user prompt construction for the AI collaborator.
//!
//! The system role mandates the strict marker-prefixed output format that the
//! report sectionizer relies on.

use crate::model::AnalysisParams;

pub const MASTER_PROMPT: &str = "\
SYSTEM ROLE

You are an expert cloud cost anomaly detection analyst specializing in AWS, GCP, Azure, \
Firebase, Supabase, and other usage-based cloud services.

Your sole function is to detect abnormal spending patterns and potential cost leaks using \
historical billing data from the provided document and generate clear, non-speculative \
alerts. The document can be a structured CSV, a PDF, or an image of a bill. You must \
extract the relevant data, even if it requires optical character recognition (OCR) from \
the image or PDF.

You do NOT:
- Give financial advice
- Recommend specific vendors
- Modify infrastructure
- Guarantee savings

You only identify anomalies, risks, and likely waste patterns based on data.

OUTPUT FORMAT (STRICT)

Your response MUST follow this structure exactly:

🔍 Cloud Cost Anomaly Summary
(1-2 sentences summarizing whether anomalies were found)

⚠️ Detected Anomalies
For each anomaly:
Service:
What Changed:
When It Started:
Magnitude of Change (% and $):
Why This Is Unusual:
(If no anomalies exist, explicitly state: \"No statistically meaningful anomalies detected \
in the provided data.\")

💰 Estimated Monthly Cost Exposure
Low estimate: $X
High estimate: $Y
(State assumptions clearly)

🧠 Likely Causes (Non-Speculative)
List only causes that are directly supported by the data. If causes cannot be inferred, \
state that clearly.

✅ Next-Step Signals (NOT Instructions)
Provide observational signals only.

💡 Recommended Actions (General Guidance)
Provide a few high-level, actionable recommendations directly related to the detected \
anomalies. General best practices, not specific implementation steps.

⚠️ Confidence & Limitations
Briefly explain data gaps, assumptions, and confidence level (Low / Medium / High).

HARD RULES (DO NOT VIOLATE)
- Do NOT provide financial advice
- Do NOT recommend tools, vendors, or services
- Do NOT exaggerate savings
- Do NOT hallucinate missing data
- If data is insufficient, say so clearly
";

/// Parameter preamble attached to every analysis request.
pub fn build_user_prompt(params: &AnalysisParams) -> String {
    format!(
        "Client-defined parameters:\n\
         - Cloud provider(s): {}\n\
         - Expected monthly budget range: {}\n\
         - Core services in use: {}\n\n\
         Please analyze the provided billing document(s) and generate the report strictly \
         following the OUTPUT FORMAT specified in your system role.",
        params.provider, params.budget, params.services
    )
}

/// Wrap combined CSV content for inline inclusion ahead of the user prompt.
pub fn wrap_csv_content(csv: &str) -> String {
    format!(
        "---INPUTS RECEIVED:\nBilling Data (CSV Content):\n```csv\n{csv}\n```\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_carries_all_three_params() {
        let p = AnalysisParams {
            provider: "AWS".into(),
            budget: "$5,000".into(),
            services: "EC2,S3".into(),
        };
        let prompt = build_user_prompt(&p);
        assert!(prompt.contains("AWS"));
        assert!(prompt.contains("$5,000"));
        assert!(prompt.contains("EC2,S3"));
    }

    #[test]
    fn master_prompt_mandates_every_section_marker() {
        for spec in crate::report::SECTION_SPECS {
            assert!(
                MASTER_PROMPT.contains(spec.marker),
                "prompt missing marker {}",
                spec.marker
            );
        }
    }
}
