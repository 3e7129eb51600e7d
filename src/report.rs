//! Report sectionizer and inline renderer.
//!
//! The AI collaborator is instructed to emit a fixed set of marker-prefixed
//! sections, but the reply is still free text. This module slices it into the
//! recognized sections line by line and interprets a small markdown subset
//! inside each one, tolerating anything malformed by falling back to plain
//! paragraphs. Parsing is pure and idempotent; a missing or empty section is
//! never an error.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Summary,
    Anomalies,
    Exposure,
    Causes,
    Signals,
    Recommendations,
    Limitations,
}

pub struct SectionSpec {
    pub key: SectionKey,
    /// Literal line prefix that opens the section.
    pub marker: &'static str,
    pub icon: &'static str,
    pub title: &'static str,
}

/// Recognized section markers, in display order. The two warning-icon sections
/// carry their full heading text in the marker so they stay distinguishable.
pub const SECTION_SPECS: &[SectionSpec] = &[
    SectionSpec {
        key: SectionKey::Summary,
        marker: "🔍",
        icon: "🔍",
        title: "Cloud Cost Anomaly Summary",
    },
    SectionSpec {
        key: SectionKey::Anomalies,
        marker: "⚠️ Detected Anomalies",
        icon: "⚠️",
        title: "Detected Anomalies",
    },
    SectionSpec {
        key: SectionKey::Exposure,
        marker: "💰",
        icon: "💰",
        title: "Estimated Monthly Cost Exposure",
    },
    SectionSpec {
        key: SectionKey::Causes,
        marker: "🧠",
        icon: "🧠",
        title: "Likely Causes (Non-Speculative)",
    },
    SectionSpec {
        key: SectionKey::Signals,
        marker: "✅",
        icon: "✅",
        title: "Next-Step Signals",
    },
    SectionSpec {
        key: SectionKey::Recommendations,
        marker: "💡",
        icon: "💡",
        title: "Recommended Actions (General Guidance)",
    },
    SectionSpec {
        key: SectionKey::Limitations,
        marker: "⚠️ Confidence & Limitations",
        icon: "⚠️",
        title: "Confidence & Limitations",
    },
];

/// `Key:` prefixes rendered as labeled key-value lines.
pub const KEY_PREFIXES: &[&str] = &[
    "Service:",
    "What Changed:",
    "When It Started:",
    "Magnitude of Change:",
    "Why This Is Unusual:",
    "Low estimate:",
    "High estimate:",
];

pub fn section_spec(key: SectionKey) -> &'static SectionSpec {
    SECTION_SPECS
        .iter()
        .find(|s| s.key == key)
        .unwrap_or(&SECTION_SPECS[0])
}

/// Raw text spans keyed by section, in display order. A key is present iff its
/// marker line was seen at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSections {
    sections: BTreeMap<SectionKey, String>,
}

impl ReportSections {
    pub fn get(&self, key: SectionKey) -> Option<&str> {
        self.sections.get(&key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Present sections in display order.
    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &str)> {
        self.sections.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

fn match_marker(line: &str) -> Option<SectionKey> {
    let trimmed = line.trim_start();
    SECTION_SPECS
        .iter()
        .find(|s| trimmed.starts_with(s.marker))
        .map(|s| s.key)
}

fn is_heading_repeat(line: &str, key: SectionKey) -> bool {
    let spec = section_spec(key);
    let trimmed = line.trim();
    trimmed == spec.title || trimmed == format!("{} {}", spec.icon, spec.title)
}

/// Split a raw AI reply into labeled sections. Lines before the first
/// recognized marker are preamble and dropped; a marker line mid-section opens
/// the next section rather than being absorbed into the current one.
pub fn sectionize(report: &str) -> ReportSections {
    let mut out = ReportSections::default();
    let mut current: Option<SectionKey> = None;

    for line in report.lines() {
        if let Some(key) = match_marker(line) {
            current = Some(key);
            // Seeing the marker makes the section present even with no body.
            out.sections.entry(key).or_default();
            continue;
        }
        if let Some(key) = current {
            if is_heading_repeat(line, key) {
                continue;
            }
            let body = out.sections.entry(key).or_default();
            body.push_str(line);
            body.push('\n');
        }
    }

    out
}

/// Inline run inside a rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Bold(String),
    Italic(String),
}

/// One rendered construct within a section body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    /// Consecutive `* ` lines grouped into a single list.
    List(Vec<Vec<Inline>>),
    KeyValue {
        key: String,
        value: Vec<Inline>,
    },
}

/// Interpret `**bold**` and `*italic*` runs. Unterminated markers render as
/// literal text rather than failing.
pub fn parse_inline(line: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut plain = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    let flush = |plain: &mut String, out: &mut Vec<Inline>| {
        if !plain.is_empty() {
            out.push(Inline::Text(std::mem::take(plain)));
        }
    };

    while i < chars.len() {
        if chars[i] == '*' && i + 1 < chars.len() && chars[i + 1] == '*' {
            // Look for the closing **.
            if let Some(close) = find_double_star(&chars, i + 2) {
                flush(&mut plain, &mut out);
                out.push(Inline::Bold(chars[i + 2..close].iter().collect()));
                i = close + 2;
                continue;
            }
            plain.push('*');
            plain.push('*');
            i += 2;
        } else if chars[i] == '*' {
            if let Some(close) = chars[i + 1..].iter().position(|c| *c == '*') {
                let close = i + 1 + close;
                flush(&mut plain, &mut out);
                out.push(Inline::Italic(chars[i + 1..close].iter().collect()));
                i = close + 1;
                continue;
            }
            plain.push('*');
            i += 1;
        } else {
            plain.push(chars[i]);
            i += 1;
        }
    }

    flush(&mut plain, &mut out);
    out
}

fn find_double_star(chars: &[char], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '*' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn starts_with_marker_icon(line: &str) -> bool {
    let trimmed = line.trim_start();
    SECTION_SPECS.iter().any(|s| trimmed.starts_with(s.icon))
}

fn key_prefix(line: &str) -> Option<&'static str> {
    KEY_PREFIXES.iter().copied().find(|p| line.starts_with(p))
}

/// Render a section body into display blocks. Best effort: anything not
/// recognized becomes a plain paragraph; blank lines separate paragraphs; the
/// AI sometimes repeats a section heading inside the body, which is hidden.
pub fn render_blocks(body: &str) -> Vec<Block> {
    let lines: Vec<&str> = body.lines().collect();
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.starts_with("* ") {
            let mut items = Vec::new();
            while i < lines.len() && lines[i].trim().starts_with("* ") {
                items.push(parse_inline(&lines[i].trim()[2..]));
                i += 1;
            }
            blocks.push(Block::List(items));
            continue;
        }

        if let Some(prefix) = key_prefix(trimmed) {
            let value = trimmed[prefix.len()..].trim();
            blocks.push(Block::KeyValue {
                key: prefix.trim_end_matches(':').to_string(),
                value: parse_inline(value),
            });
            i += 1;
            continue;
        }

        if trimmed.is_empty() || starts_with_marker_icon(line) {
            i += 1;
            continue;
        }

        blocks.push(Block::Paragraph(parse_inline(trimmed)));
        i += 1;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Some preamble the model added on its own.

🔍 Cloud Cost Anomaly Summary
One anomaly was detected in the provided data.

⚠️ Detected Anomalies
Service: EC2
What Changed: Compute spend doubled
Magnitude of Change: +105% ($2,100)

💰 Estimated Monthly Cost Exposure
Low estimate: $1,800
High estimate: $2,400
";

    #[test]
    fn sectionize_returns_exactly_present_sections() {
        let sections = sectionize(SAMPLE);
        assert_eq!(sections.len(), 3);
        assert!(sections.get(SectionKey::Summary).is_some());
        assert!(sections.get(SectionKey::Anomalies).is_some());
        assert!(sections.get(SectionKey::Exposure).is_some());
        assert!(sections.get(SectionKey::Causes).is_none());
        assert!(sections.get(SectionKey::Signals).is_none());
        assert!(sections.get(SectionKey::Recommendations).is_none());
        assert!(sections.get(SectionKey::Limitations).is_none());
    }

    #[test]
    fn preamble_is_discarded() {
        let sections = sectionize(SAMPLE);
        for (_, body) in sections.iter() {
            assert!(!body.contains("preamble"));
        }
    }

    #[test]
    fn no_markers_yields_zero_sections() {
        let sections = sectionize("just some text\nwith no structure at all\n");
        assert!(sections.is_empty());
    }

    #[test]
    fn sectionize_is_idempotent() {
        assert_eq!(sectionize(SAMPLE), sectionize(SAMPLE));
    }

    #[test]
    fn marker_with_no_body_is_an_empty_section() {
        let sections = sectionize("🔍 Cloud Cost Anomaly Summary\n");
        assert_eq!(sections.get(SectionKey::Summary), Some(""));
    }

    #[test]
    fn mid_section_marker_opens_a_new_section() {
        let text = "🔍 Cloud Cost Anomaly Summary\nfine so far\n💰 Estimated Monthly Cost Exposure\nLow estimate: $0\n";
        let sections = sectionize(text);
        let summary = sections.get(SectionKey::Summary).unwrap();
        assert!(summary.contains("fine so far"));
        assert!(!summary.contains("Low estimate"));
        assert!(sections
            .get(SectionKey::Exposure)
            .unwrap()
            .contains("Low estimate"));
    }

    #[test]
    fn warning_sections_are_distinguished_by_heading() {
        let text = "⚠️ Detected Anomalies\nnone\n⚠️ Confidence & Limitations\nlow confidence\n";
        let sections = sectionize(text);
        assert!(sections.get(SectionKey::Anomalies).unwrap().contains("none"));
        assert!(sections
            .get(SectionKey::Limitations)
            .unwrap()
            .contains("low confidence"));
    }

    #[test]
    fn literal_heading_repeat_is_stripped() {
        let text = "🔍 Cloud Cost Anomaly Summary\nCloud Cost Anomaly Summary\nactual content\n";
        let body = sectionize(text).get(SectionKey::Summary).unwrap().to_string();
        assert_eq!(body, "actual content\n");
    }

    #[test]
    fn bullets_group_into_one_list() {
        let blocks = render_blocks("* first item\n* second item\n");
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Block::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected a list, got {other:?}"),
        }
    }

    #[test]
    fn blank_lines_separate_paragraphs() {
        let blocks = render_blocks("first\n\nsecond\n");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Block::Paragraph(_)));
        assert!(matches!(blocks[1], Block::Paragraph(_)));
    }

    #[test]
    fn key_value_lines_are_labeled() {
        let blocks = render_blocks("Service: EC2\n");
        assert_eq!(
            blocks[0],
            Block::KeyValue {
                key: "Service".into(),
                value: vec![Inline::Text("EC2".into())],
            }
        );
    }

    #[test]
    fn bold_and_italic_runs() {
        assert_eq!(
            parse_inline("a **bold** and *italic* word"),
            vec![
                Inline::Text("a ".into()),
                Inline::Bold("bold".into()),
                Inline::Text(" and ".into()),
                Inline::Italic("italic".into()),
                Inline::Text(" word".into()),
            ]
        );
    }

    #[test]
    fn unterminated_bold_renders_literally() {
        assert_eq!(
            parse_inline("**unterminated"),
            vec![Inline::Text("**unterminated".into())]
        );
    }

    #[test]
    fn unterminated_italic_renders_literally() {
        assert_eq!(
            parse_inline("lonely * star"),
            vec![Inline::Text("lonely * star".into())]
        );
    }

    #[test]
    fn repeated_heading_icon_inside_body_is_hidden() {
        let blocks = render_blocks("🔍 Cloud Cost Anomaly Summary again\nreal text\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0],
            Block::Paragraph(vec![Inline::Text("real text".into())])
        );
    }
}
