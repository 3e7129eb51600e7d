//! Plain-text report rendering for the text/json CLI modes.

use crate::report::{render_blocks, section_spec, Block, Inline, ReportSections};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn inline_to_plain(runs: &[Inline]) -> String {
    let mut out = String::new();
    for run in runs {
        match run {
            Inline::Text(t) => out.push_str(t),
            Inline::Bold(t) | Inline::Italic(t) => out.push_str(t),
        }
    }
    out
}

/// Render the sectioned report as human-readable lines. Absent sections are
/// skipped; a report with no recognized sections falls back to the raw text.
pub(crate) fn build_text_summary(raw_report: &str, sections: &ReportSections) -> TextSummary {
    let mut lines = Vec::new();

    if sections.is_empty() {
        lines.extend(raw_report.lines().map(str::to_string));
        return TextSummary { lines };
    }

    for (key, body) in sections.iter() {
        let spec = section_spec(key);
        lines.push(format!("{} {}", spec.icon, spec.title));
        lines.push("-".repeat(spec.title.len() + 3));

        for block in render_blocks(body) {
            match block {
                Block::Paragraph(runs) => {
                    lines.push(inline_to_plain(&runs));
                    lines.push(String::new());
                }
                Block::List(items) => {
                    for item in &items {
                        lines.push(format!("  * {}", inline_to_plain(item)));
                    }
                    lines.push(String::new());
                }
                Block::KeyValue { key, value } => {
                    lines.push(format!("  {}: {}", key, inline_to_plain(&value)));
                }
            }
        }
        if lines.last().map(|l| !l.is_empty()).unwrap_or(false) {
            lines.push(String::new());
        }
    }

    while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::sectionize;

    #[test]
    fn renders_present_sections_with_headings() {
        let raw = "🔍 Cloud Cost Anomaly Summary\nAll quiet.\n💰 Estimated Monthly Cost Exposure\nLow estimate: $0\n";
        let summary = build_text_summary(raw, &sectionize(raw));
        let joined = summary.lines.join("\n");
        assert!(joined.contains("🔍 Cloud Cost Anomaly Summary"));
        assert!(joined.contains("All quiet."));
        assert!(joined.contains("Low estimate: $0"));
        assert!(!joined.contains("Detected Anomalies"));
    }

    #[test]
    fn unstructured_reply_falls_back_to_raw_lines() {
        let raw = "the model ignored the format\ncompletely";
        let summary = build_text_summary(raw, &sectionize(raw));
        assert_eq!(summary.lines, vec![
            "the model ignored the format".to_string(),
            "completely".to_string(),
        ]);
    }
}
