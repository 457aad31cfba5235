//! Text normalizer.
//!
//! Turns raw line-based extraction output into paragraphs, statistics and a
//! cleaned rendering. Pure and deterministic; never fails.

pub mod repair;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use repair::fix_urls_and_emails;

const HEADING_MAX_CHARS: usize = 40;
const SHORT_LINE_CHARS: usize = 20;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub text: String,
    pub word_count: usize,
    pub char_count: usize,
    /// Logical lines the paragraph was assembled from.
    pub line_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStats {
    pub paragraph_count: usize,
    pub sentence_count: usize,
    pub original_chars: usize,
    pub cleaned_chars: usize,
    pub reduction_percent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedText {
    pub formatted_text: String,
    pub paragraphs: Vec<Paragraph>,
    pub stats: TextStats,
}

pub fn normalize(raw: &str) -> NormalizedText {
    if raw.trim().is_empty() {
        let original_chars = raw.chars().count();
        return NormalizedText {
            stats: TextStats {
                original_chars,
                reduction_percent: reduction_percent(original_chars, 0),
                ..Default::default()
            },
            ..Default::default()
        };
    }

    let repaired = repair::fix_urls_and_emails(raw);
    let spaced = repair::normalize_spacing(&repaired);
    let paragraphs = assemble_paragraphs(&spaced);

    let joined = paragraphs
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let formatted_text = repair::final_cleanup(&joined);

    let original_chars = raw.chars().count();
    let cleaned_chars = formatted_text.chars().count();
    let stats = TextStats {
        paragraph_count: paragraphs.len(),
        sentence_count: SENTENCE_END.find_iter(&formatted_text).count(),
        original_chars,
        cleaned_chars,
        reduction_percent: reduction_percent(original_chars, cleaned_chars),
    };

    NormalizedText {
        formatted_text,
        paragraphs,
        stats,
    }
}

fn reduction_percent(original: usize, cleaned: usize) -> i64 {
    if original == 0 {
        return 0;
    }
    let pct = (original as f64 - cleaned as f64) / original as f64 * 100.0;
    (pct.round() as i64).clamp(-100, 100)
}

fn assemble_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut group: Vec<String> = Vec::new();
    let mut current = String::new();

    for raw_line in text.split('\n') {
        let line = raw_line.trim();

        if line.is_empty() {
            flush_line(&mut current, &mut group);
            flush_group(&mut group, &mut paragraphs);
            continue;
        }

        if current.is_empty() {
            current.push_str(line);
        } else if starts_new_line(&current, line) {
            flush_line(&mut current, &mut group);
            current.push_str(line);
        } else {
            current.push(' ');
            current.push_str(line);
        }
    }

    flush_line(&mut current, &mut group);
    flush_group(&mut group, &mut paragraphs);
    paragraphs
}

fn starts_new_line(current: &str, next: &str) -> bool {
    current.ends_with(['.', '!', '?'])
        || next.chars().next().is_some_and(char::is_uppercase)
        || is_heading(next)
        || next.chars().count() < SHORT_LINE_CHARS
}

fn is_heading(line: &str) -> bool {
    line.chars().count() < HEADING_MAX_CHARS
        && line.chars().any(char::is_alphabetic)
        && !line.chars().any(char::is_lowercase)
}

fn flush_line(current: &mut String, group: &mut Vec<String>) {
    if !current.is_empty() {
        group.push(std::mem::take(current));
    }
}

fn flush_group(group: &mut Vec<String>, paragraphs: &mut Vec<Paragraph>) {
    if group.is_empty() {
        return;
    }
    let text = group.join(" ").trim().to_string();
    paragraphs.push(Paragraph {
        word_count: text.split_whitespace().count(),
        char_count: text.chars().count(),
        line_count: group.len(),
        text,
    });
    group.clear();
}
