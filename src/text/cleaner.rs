//! Normalises extracted chapter text before it is chunked.
//!
//! The output keeps paragraph breaks as a single blank line and collapses all
//! other whitespace, so the chunker only has to reason about `\n\n`.

use super::cached_regex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static PAGE_NUMBER: OnceLock<Regex> = OnceLock::new();
static HYPHEN_BREAK: OnceLock<Regex> = OnceLock::new();
static CITATION: OnceLock<Regex> = OnceLock::new();
static SEE_REFERENCE: OnceLock<Regex> = OnceLock::new();
static PARAGRAPH_BREAK: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();
static SPACE_BEFORE_PUNCT: OnceLock<Regex> = OnceLock::new();

/// Lines at least this long that repeat more than `REPEAT_LIMIT` times are
/// treated as running headers or footers.
const REPEATED_LINE_MIN_CHARS: usize = 11;
const REPEAT_LIMIT: usize = 3;

pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = cached_regex(&PAGE_NUMBER, r"(?m)^[ \t]*\d+[ \t]*(\n|$)").replace_all(&text, "");
    let text = drop_repeated_lines(&text);
    let text = cached_regex(&HYPHEN_BREAK, r"(\w)-[ \t]*\n[ \t]*(\w)").replace_all(&text, "$1$2");
    let text = cached_regex(&CITATION, r"\[\d+\]").replace_all(&text, "");
    let text = cached_regex(&SEE_REFERENCE, r"\(see [^)]+\)").replace_all(&text, "");
    let text = text
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    cached_regex(&PARAGRAPH_BREAK, r"\n[ \t]*\n")
        .split(&text)
        .map(clean_paragraph)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn clean_paragraph(paragraph: &str) -> String {
    let collapsed = cached_regex(&WHITESPACE, r"\s+").replace_all(paragraph, " ");
    cached_regex(&SPACE_BEFORE_PUNCT, r"\s+([.,;:!?])")
        .replace_all(&collapsed, "$1")
        .trim()
        .to_string()
}

fn drop_repeated_lines(text: &str) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.chars().count() >= REPEATED_LINE_MIN_CHARS {
            *counts.entry(trimmed).or_default() += 1;
        }
    }

    text.lines()
        .filter(|line| counts.get(line.trim()).copied().unwrap_or(0) <= REPEAT_LIMIT)
        .collect::<Vec<_>>()
        .join("\n")
}
