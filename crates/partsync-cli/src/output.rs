//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde_json::json;

use partsync_core::{DiffSpan, Line, PartState, SpanKind};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// One entry of a line's version history, ready for display
pub struct HistoryEntry<'a> {
    pub revision: &'a str,
    pub label: String,
    pub author: Option<&'a str>,
    pub content: &'a str,
    pub spans: Vec<DiffSpan>,
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a part with its lines in reading order
    pub fn print_part(&self, state: &PartState, lines: &[Line]) {
        match self.format {
            OutputFormat::Human => {
                let pk = state.pk.map(|pk| pk.to_string()).unwrap_or_default();
                println!(
                    "Part {} ({} lines, {} regions, layer {})",
                    pk,
                    lines.len(),
                    state.blocks.len(),
                    state.selected_transcription
                );
                if lines.is_empty() {
                    println!("No lines found.");
                    return;
                }
                println!();
                for line in lines {
                    let region = line
                        .region
                        .map(|r| format!("r{}", r))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:>4} | #{:<7} | {:<6} | {}",
                        line.order,
                        line.pk,
                        region,
                        truncate(&line.transcription.text(), 70)
                    );
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    json!({
                        "part": state.pk,
                        "previous": state.previous,
                        "next": state.next,
                        "transcription": state.selected_transcription,
                        "regions": state.blocks,
                        "lines": lines
                    })
                );
            }
            OutputFormat::Quiet => {
                for line in lines {
                    println!("{}", line.pk);
                }
            }
        }
    }

    /// Print a version history, newest first
    pub fn print_history(&self, line: &Line, entries: &[HistoryEntry<'_>]) {
        match self.format {
            OutputFormat::Human => {
                println!("Line #{}: {}", line.pk, line.transcription.text());
                if entries.is_empty() {
                    println!("No versions found.");
                    return;
                }
                for entry in entries {
                    println!();
                    println!(
                        "── {} · {} · {} ──",
                        truncate(entry.revision, 12),
                        entry.label,
                        entry.author.unwrap_or("unknown")
                    );
                    println!("{}", render_spans(&entry.spans));
                }
            }
            OutputFormat::Json => {
                let versions: Vec<_> = entries
                    .iter()
                    .map(|e| {
                        json!({
                            "revision": e.revision,
                            "label": e.label,
                            "author": e.author,
                            "content": e.content,
                            "diff": e.spans.iter().map(|s| json!({
                                "kind": span_kind_name(s.kind),
                                "text": s.text
                            })).collect::<Vec<_>>()
                        })
                    })
                    .collect();
                println!("{}", json!({"line": line.pk, "versions": versions}));
            }
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.revision);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Render diff spans inline: `[-deleted-]` and `{+inserted+}`
pub fn render_spans(spans: &[DiffSpan]) -> String {
    spans
        .iter()
        .map(|span| match span.kind {
            SpanKind::Unchanged => span.text.clone(),
            SpanKind::Deleted => format!("[-{}-]", span.text),
            SpanKind::Inserted => format!("{{+{}+}}", span.text),
        })
        .collect()
}

fn span_kind_name(kind: SpanKind) -> &'static str {
    match kind {
        SpanKind::Unchanged => "unchanged",
        SpanKind::Inserted => "inserted",
        SpanKind::Deleted => "deleted",
    }
}

/// Truncate a string to max characters, adding ellipsis if needed
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
