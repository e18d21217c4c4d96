//! Deterministic splitting of cleaned chapter text into speakable chunks.
//!
//! Sentences are the natural unit: each sentence becomes its own chunk unless
//! `min_chars` asks for packing. A sentence longer than `max_chars` is split at
//! the last whitespace inside the budget, or hard-cut when there is none.
//! Lengths are counted in chars, not bytes.

const WORDS_PER_MINUTE: f32 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub max_chars: usize,
    pub min_chars: usize,
}

impl ChunkerConfig {
    pub fn new(max_chars: usize, min_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            min_chars: min_chars.min(max_chars),
        }
    }
}

/// One chapter as delivered by ingest, after cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterText {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChunk {
    pub chunk_id: u32,
    pub chapter_id: u32,
    pub text: String,
    pub estimated_seconds: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChapter {
    pub chapter_id: u32,
    pub title: String,
    pub chunk_ids: Vec<u32>,
}

/// Chapters and chunks with ids assigned in document order: chunk ids start at
/// 0, chapter ids at 1, both without gaps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkPlan {
    pub chapters: Vec<PlannedChapter>,
    pub chunks: Vec<PlannedChunk>,
}

pub fn plan_chunks(chapters: &[ChapterText], config: ChunkerConfig) -> ChunkPlan {
    let mut plan = ChunkPlan::default();
    let mut next_chunk_id = 0u32;

    for chapter in chapters {
        let texts = chunk_text(&chapter.text, config);
        if texts.is_empty() {
            continue;
        }

        let chapter_id = plan.chapters.len() as u32 + 1;
        let mut chunk_ids = Vec::with_capacity(texts.len());
        for text in texts {
            chunk_ids.push(next_chunk_id);
            plan.chunks.push(PlannedChunk {
                chunk_id: next_chunk_id,
                chapter_id,
                estimated_seconds: estimate_seconds(&text),
                text,
            });
            next_chunk_id += 1;
        }

        plan.chapters.push(PlannedChapter {
            chapter_id,
            title: chapter.title.clone(),
            chunk_ids,
        });
    }

    plan
}

pub fn chunk_text(text: &str, config: ChunkerConfig) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in text.split("\n\n") {
        let mut current: Option<String> = None;

        for sentence in split_sentences(paragraph) {
            for piece in split_long(sentence, config.max_chars) {
                current = match current.take() {
                    Some(mut chunk) if should_merge(&chunk, &piece, config) => {
                        chunk.push(' ');
                        chunk.push_str(&piece);
                        Some(chunk)
                    }
                    Some(chunk) => {
                        chunks.push(chunk);
                        Some(piece)
                    }
                    None => Some(piece),
                };
            }
        }

        if let Some(chunk) = current {
            chunks.push(chunk);
        }
    }

    chunks
}

pub fn estimate_seconds(text: &str) -> f32 {
    let words = text.split_whitespace().count() as f32;
    words / WORDS_PER_MINUTE * 60.0
}

fn should_merge(current: &str, next: &str, config: ChunkerConfig) -> bool {
    let current_len = current.chars().count();
    current_len < config.min_chars && current_len + 1 + next.chars().count() <= config.max_chars
}

fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !is_terminator(ch) {
            continue;
        }

        let mut end = idx + ch.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if is_terminator(next) || is_closer(next) {
                end = next_idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let at_boundary = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if at_boundary {
            push_trimmed(&mut sentences, &paragraph[start..end]);
            start = end;
        }
    }

    push_trimmed(&mut sentences, &paragraph[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, text: &'a str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

fn split_long(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = sentence.trim();

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());

        let cut = if rest[limit..].starts_with(char::is_whitespace) {
            limit
        } else {
            match rest[..limit].rfind(char::is_whitespace) {
                Some(idx) if idx > 0 => idx,
                _ => limit,
            }
        };

        pieces.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '\u{2026}')
}

fn is_closer(ch: char) -> bool {
    matches!(ch, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}
