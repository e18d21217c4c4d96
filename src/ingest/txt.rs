//! Plain-text and markdown input, split on chapter headings.

use super::title_from_stem;
use crate::text::cached_regex;
use crate::text::chunker::ChapterText;
use anyhow::Context;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

static MARKDOWN_HEADING: OnceLock<Regex> = OnceLock::new();
static NUMBERED_HEADING: OnceLock<Regex> = OnceLock::new();
static SECTION_HEADING: OnceLock<Regex> = OnceLock::new();

const MAX_HEADING_CHARS: usize = 80;

pub fn load_txt(path: &Path) -> anyhow::Result<Vec<ChapterText>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(split_chapters(&text, &title_from_stem(path)))
}

/// Text before the first heading becomes its own chapter titled `fallback_title`;
/// with no headings at all the whole text is one chapter.
pub fn split_chapters(text: &str, fallback_title: &str) -> Vec<ChapterText> {
    let mut chapters = Vec::new();
    let mut title = fallback_title.to_string();
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        match heading_title(line) {
            Some(heading) => {
                push_chapter(&mut chapters, &title, &body);
                title = heading;
                body.clear();
                // Spoken as the opening paragraph of the chapter.
                push_heading_line(&mut body, line);
            }
            None => body.push(line),
        }
    }
    push_chapter(&mut chapters, &title, &body);
    chapters
}

fn push_heading_line<'a>(body: &mut Vec<&'a str>, line: &'a str) {
    let spoken = line.trim().trim_start_matches('#').trim();
    body.push(spoken);
    body.push("");
}

fn push_chapter(chapters: &mut Vec<ChapterText>, title: &str, body: &[&str]) {
    if body.iter().all(|line| line.trim().is_empty()) {
        return;
    }
    chapters.push(ChapterText {
        title: title.to_string(),
        text: body.join("\n").trim().to_string(),
    });
}

fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_CHARS {
        return None;
    }

    if let Some(caps) = cached_regex(&MARKDOWN_HEADING, r"^#{1,2}\s+(.+)$").captures(trimmed) {
        return Some(caps[1].trim().to_string());
    }

    let numbered = cached_regex(
        &NUMBERED_HEADING,
        r"(?i)^(chapter|part|book)\s+(\d+|[ivxlc]+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)\b",
    );
    let section = cached_regex(
        &SECTION_HEADING,
        r"(?i)^(prologue|epilogue|preface|introduction|conclusion|afterword|interlude)[.:]?$",
    );

    if numbered.is_match(trimmed) || section.is_match(trimmed) {
        return Some(trimmed.to_string());
    }
    None
}
