//! Report-to-terminal rendering: sectioned blocks become styled ratatui lines.

use crate::report::{render_blocks, section_spec, Block, Inline, ReportSections};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

fn inline_spans(runs: &[Inline]) -> Vec<Span<'static>> {
    runs.iter()
        .map(|run| match run {
            Inline::Text(t) => Span::raw(t.clone()),
            Inline::Bold(t) => Span::styled(t.clone(), Style::default().add_modifier(Modifier::BOLD)),
            Inline::Italic(t) => {
                Span::styled(t.clone(), Style::default().add_modifier(Modifier::ITALIC))
            }
        })
        .collect()
}

/// Render one present section: heading, underline, body blocks.
fn section_lines(key: crate::report::SectionKey, body: &str) -> Vec<Line<'static>> {
    let spec = section_spec(key);
    let mut out = Vec::new();

    out.push(Line::from(Span::styled(
        format!("{} {}", spec.icon, spec.title),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    out.push(Line::from(Span::styled(
        "─".repeat(spec.title.chars().count() + 3),
        Style::default().fg(Color::DarkGray),
    )));

    for block in render_blocks(body) {
        match block {
            Block::Paragraph(runs) => {
                out.push(Line::from(inline_spans(&runs)));
                out.push(Line::default());
            }
            Block::List(items) => {
                for item in &items {
                    let mut spans = vec![Span::styled("  • ", Style::default().fg(Color::Blue))];
                    spans.extend(inline_spans(item));
                    out.push(Line::from(spans));
                }
                out.push(Line::default());
            }
            Block::KeyValue { key, value } => {
                let mut spans = vec![Span::styled(
                    format!("  {key}: "),
                    Style::default().add_modifier(Modifier::BOLD),
                )];
                spans.extend(inline_spans(&value));
                out.push(Line::from(spans));
            }
        }
    }

    if !matches!(out.last(), Some(l) if l.spans.is_empty()) {
        out.push(Line::default());
    }
    out
}

/// Render the full report. Falls back to the raw reply when the model ignored
/// the section format entirely.
pub(crate) fn report_lines(raw: &str, sections: &ReportSections) -> Vec<Line<'static>> {
    if sections.is_empty() {
        return raw.lines().map(|l| Line::from(l.to_string())).collect();
    }
    let mut out = Vec::new();
    for (key, body) in sections.iter() {
        out.extend(section_lines(key, body));
    }
    out
}
