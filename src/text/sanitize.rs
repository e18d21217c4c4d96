//! Last-mile rewriting of chunk text right before it reaches the TTS engine.
//! The manifest keeps the unsanitised text.

use super::cached_regex;
use regex::{Captures, Regex};
use std::sync::OnceLock;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();
static ABBREVIATION: OnceLock<Regex> = OnceLock::new();

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("e.g.", "for example"),
    ("E.g.", "For example"),
    ("i.e.", "that is"),
    ("I.e.", "That is"),
    ("etc.", "et cetera"),
    ("vs.", "versus"),
    ("c.f.", "compare"),
    ("et al.", "and others"),
    ("ibid.", "same source"),
    ("op. cit.", "previously cited"),
];

pub fn sanitize_for_tts(text: &str) -> String {
    let mut out: String = text
        .chars()
        .filter(|ch| !is_invisible(*ch))
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();

    out = out
        .replace(['\u{2014}', '\u{2013}'], " - ")
        .replace('\u{2026}', "...");

    // Only whole tokens: "canvs." stays as it is.
    out = cached_regex(
        &ABBREVIATION,
        r"\b(?:e\.g\.|E\.g\.|i\.e\.|I\.e\.|etc\.|vs\.|c\.f\.|et al\.|ibid\.|op\. cit\.)",
    )
    .replace_all(&out, |caps: &Captures| expand(&caps[0]).to_string())
    .into_owned();

    // Piper treats each input line as its own utterance.
    cached_regex(&WHITESPACE, r"\s+")
        .replace_all(&out, " ")
        .trim()
        .to_string()
}

fn expand(abbreviation: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == abbreviation)
        .map_or(abbreviation, |(_, long)| *long)
}

fn is_invisible(ch: char) -> bool {
    matches!(
        ch,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    )
}
