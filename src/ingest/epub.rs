//! EPUB input: one chapter per non-empty spine document.

use super::title_from_stem;
use crate::text::cached_regex;
use crate::text::chunker::ChapterText;
use anyhow::anyhow;
use epub::doc::EpubDoc;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

static HEADING_TAG: OnceLock<Regex> = OnceLock::new();
static TITLE_TAG: OnceLock<Regex> = OnceLock::new();
static ANY_TAG: OnceLock<Regex> = OnceLock::new();
static LINK_REFERENCE: OnceLock<Regex> = OnceLock::new();
static MARKUP_PREFIX: OnceLock<Regex> = OnceLock::new();

const RENDER_WIDTH: usize = 120;

pub fn load_epub(path: &Path) -> anyhow::Result<Vec<ChapterText>> {
    let mut doc = EpubDoc::new(path)
        .map_err(|err| anyhow!("open epub {}: {err:?}", path.display()))?;

    let mut chapters = Vec::new();
    loop {
        if let Some((html, _mime)) = doc.get_current_str() {
            let text = html_to_text(&html);
            if !text.trim().is_empty() {
                let title = extract_title(&html)
                    .unwrap_or_else(|| format!("Chapter {}", chapters.len() + 1));
                chapters.push(ChapterText { title, text });
            }
        }
        if !doc.go_next() {
            break;
        }
    }

    if chapters.is_empty() {
        tracing::warn!(path = %path.display(), "epub has no readable documents");
        return Err(anyhow!("no readable text in {}", title_from_stem(path)));
    }
    Ok(chapters)
}

fn html_to_text(html: &str) -> String {
    let rendered = html2text::from_read(html.as_bytes(), RENDER_WIDTH);
    let rendered = cached_regex(&LINK_REFERENCE, r"(?m)^\[\d+\]: .*$").replace_all(&rendered, "");
    cached_regex(&MARKUP_PREFIX, r"(?m)^(#+|\*|-|>)\s+")
        .replace_all(&rendered, "")
        .trim()
        .to_string()
}

fn extract_title(html: &str) -> Option<String> {
    let heading = cached_regex(&HEADING_TAG, r"(?is)<h[1-3][^>]*>(.*?)</h[1-3]>");
    let title = cached_regex(&TITLE_TAG, r"(?is)<title[^>]*>(.*?)</title>");

    heading
        .captures(html)
        .or_else(|| title.captures(html))
        .map(|caps| strip_tags(&caps[1]))
        .filter(|text| !text.is_empty())
}

fn strip_tags(fragment: &str) -> String {
    let text = cached_regex(&ANY_TAG, r"<[^>]+>").replace_all(fragment, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_headings_over_title_tag() {
        let html = "<html><head><title>Book</title></head><body><h2 class=\"c\">The <em>First</em>\nDay</h2></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("The First Day"));
    }

    #[test]
    fn title_falls_back_to_title_tag() {
        let html = "<html><head><title> Cover </title></head><body><p>x</p></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Cover"));
    }

    #[test]
    fn renders_paragraph_text() {
        let text = html_to_text("<html><body><p>Hello there.</p><p>Second.</p></body></html>");
        assert!(text.contains("Hello there."));
        assert!(text.contains("Second."));
        assert!(!text.contains('<'));
    }
}
