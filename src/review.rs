//! Repairs a single chunk: optional text override, re-synthesis, then
//! re-assembly of only the owning chapter and the book.

use crate::audio::{Assembler, AssemblyReport, AudioMuxer};
use crate::error::Error;
use crate::project::manifest::{ChunkStatus, Manifest};
use crate::project::{metadata, ProjectLayout};
use crate::tts::{ChunkOutcome, SynthesisDriver, TtsBackend};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct ReviewRequest {
    pub chunk_id: u32,
    pub new_text: Option<String>,
    pub skip_first_chunks: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub chunk_id: u32,
    pub chapter_id: u32,
    pub outcome: ChunkOutcome,
    pub assembly: AssemblyReport,
}

pub fn review(
    layout: &ProjectLayout,
    request: &ReviewRequest,
    backend: &dyn TtsBackend,
    muxer: &dyn AudioMuxer,
) -> crate::Result<ReviewOutcome> {
    let mut manifest = Manifest::load(&layout.manifest_path())?;
    let chunk_id = request.chunk_id;
    let chapter_id = manifest.chunk(chunk_id)?.chapter_id;
    // A rendered chunk must not be reset when it cannot be rendered again.
    manifest.config().voice().validate()?;

    let new_text = match request.new_text.as_deref().map(str::trim) {
        Some("") => return Err(Error::EmptyText { chunk_id }),
        Some(text) => {
            let max = manifest.config().preset.max_chunk_chars;
            if text.chars().count() > max {
                tracing::warn!(chunk_id, max, "replacement text is longer than max_chunk_chars");
            }
            Some(text.to_string())
        }
        None => None,
    };

    manifest.update_chunk(chunk_id, ChunkStatus::Pending, None, new_text)?;
    if let Some(skip) = request.skip_first_chunks {
        manifest.set_skip_first_chunks(skip)?;
    }

    tracing::info!(chunk_id, chapter_id, "re-rendering chunk");
    let outcome = SynthesisDriver::new(backend, layout).render_chunk(&mut manifest, chunk_id)?;
    let assembly = Assembler::new(muxer, layout).assemble_scoped(&mut manifest, chapter_id)?;

    metadata::record_run(&layout.metadata_path(), "review", &manifest.summary());
    Ok(ReviewOutcome {
        chunk_id,
        chapter_id,
        outcome,
        assembly,
    })
}
