//! Whole-project operations: `process` builds a project from a source file,
//! `resume` and `assemble` continue an existing one, `status` reports on it.

use crate::audio::{Assembler, AssemblyReport, AudioMuxer};
use crate::config::{Preset, VoiceConfig};
use crate::error::Error;
use crate::ingest;
use crate::project::debug::{DebugLog, FailureRecord};
use crate::project::manifest::{ChunkStatus, Manifest, ProjectConfig, StatusSummary};
use crate::project::metadata::{self, ProjectMetadata};
use crate::project::ProjectLayout;
use crate::text::chunker::{plan_chunks, ChapterText, ChunkerConfig};
use crate::text::cleaner::clean_text;
use crate::tts::{SynthesisDriver, SynthesisReport, TtsBackend};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub voice_model: PathBuf,
    pub preset_name: String,
    pub preset: Preset,
    pub skip_first_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub synthesis: SynthesisReport,
    pub assembly: AssemblyReport,
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterStatus {
    pub chapter_id: u32,
    pub title: String,
    pub chunks: usize,
    pub rendered: usize,
    pub failed: usize,
    pub pending: usize,
    pub audio_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub summary: StatusSummary,
    pub skip_first_chunks: usize,
    pub chapters: Vec<ChapterStatus>,
    /// Latest diagnostic for each chunk that is currently failed.
    pub failures: Vec<FailureRecord>,
}

/// Ingest, chunk, create the manifest, synthesize everything and assemble.
/// Refuses to touch a directory that already holds a project.
pub fn process(
    request: &ProcessRequest,
    backend: &dyn TtsBackend,
    muxer: &dyn AudioMuxer,
) -> crate::Result<RunReport> {
    let layout = ProjectLayout::new(&request.output_dir);
    if layout.has_manifest() {
        return Err(Error::AlreadyExists {
            path: layout.manifest_path(),
        });
    }

    let voice = VoiceConfig {
        model_path: request.voice_model.clone(),
        preset: request.preset.clone(),
    };
    voice.validate()?;

    let chapters: Vec<ChapterText> = ingest::extract_chapters(&request.input)?
        .into_iter()
        .map(|chapter| ChapterText {
            text: clean_text(&chapter.text),
            title: chapter.title,
        })
        .collect();

    let chunker = ChunkerConfig::new(request.preset.max_chunk_chars, request.preset.min_chunk_chars);
    let plan = plan_chunks(&chapters, chunker);
    if plan.chunks.is_empty() {
        return Err(Error::Ingest {
            path: request.input.clone(),
            message: "no speakable text found".to_string(),
        });
    }

    layout.create_dirs()?;
    let config = ProjectConfig {
        voice_model_path: request.voice_model.clone(),
        preset_name: request.preset_name.clone(),
        skip_first_chunks: request.skip_first_chunks,
        preset: request.preset.clone(),
    };
    let mut manifest = Manifest::create(&layout.manifest_path(), &plan, config)?;

    let title = request
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    ProjectMetadata::new(title, &request.input, plan.chapters.len(), plan.chunks.len())?
        .save(&layout.metadata_path())?;

    run(&layout, &mut manifest, backend, muxer, "process")
}

/// Synthesizes chunks still `pending` (failed ones stay failed) and
/// reassembles everything.
pub fn resume(
    layout: &ProjectLayout,
    backend: &dyn TtsBackend,
    muxer: &dyn AudioMuxer,
) -> crate::Result<RunReport> {
    let mut manifest = Manifest::load(&layout.manifest_path())?;
    manifest.config().voice().validate()?;
    run(layout, &mut manifest, backend, muxer, "resume")
}

/// Reassembles all chapters and the book without synthesizing anything.
pub fn assemble(
    layout: &ProjectLayout,
    muxer: &dyn AudioMuxer,
    skip_first_chunks: Option<usize>,
) -> crate::Result<AssemblyReport> {
    let mut manifest = Manifest::load(&layout.manifest_path())?;
    if let Some(skip) = skip_first_chunks {
        manifest.set_skip_first_chunks(skip)?;
    }
    let report = Assembler::new(muxer, layout).assemble_all(&mut manifest)?;
    metadata::record_run(&layout.metadata_path(), "assemble", &manifest.summary());
    Ok(report)
}

pub fn status(layout: &ProjectLayout) -> crate::Result<ProjectStatus> {
    let manifest = Manifest::load(&layout.manifest_path())?;

    let mut chapters = Vec::with_capacity(manifest.chapters().len());
    for chapter in manifest.chapters() {
        let chunks = manifest.chapter_chunks(chapter.chapter_id)?;
        let count = |status: ChunkStatus| chunks.iter().filter(|c| c.status == status).count();
        chapters.push(ChapterStatus {
            chapter_id: chapter.chapter_id,
            title: chapter.title.clone(),
            chunks: chunks.len(),
            rendered: count(ChunkStatus::Rendered),
            failed: count(ChunkStatus::Failed),
            pending: count(ChunkStatus::Pending),
            audio_path: chapter.audio_path.clone(),
        });
    }

    let summary = manifest.summary();
    let mut failures: Vec<FailureRecord> = Vec::new();
    for record in DebugLog::new(layout).read_all()?.into_iter().rev() {
        let still_failed = summary.failed_chunk_ids.contains(&record.chunk_id);
        if still_failed && !failures.iter().any(|f| f.chunk_id == record.chunk_id) {
            failures.push(record);
        }
    }
    failures.sort_by_key(|record| record.chunk_id);

    Ok(ProjectStatus {
        skip_first_chunks: manifest.config().skip_first_chunks,
        summary,
        chapters,
        failures,
    })
}

fn run(
    layout: &ProjectLayout,
    manifest: &mut Manifest,
    backend: &dyn TtsBackend,
    muxer: &dyn AudioMuxer,
    operation: &str,
) -> crate::Result<RunReport> {
    let synthesis = SynthesisDriver::new(backend, layout).run_pending(manifest)?;
    let assembly = Assembler::new(muxer, layout).assemble_all(manifest)?;
    let summary = manifest.summary();
    metadata::record_run(&layout.metadata_path(), operation, &summary);

    Ok(RunReport {
        synthesis,
        assembly,
        summary,
    })
}
