//! Drives chunk synthesis through a [`TtsBackend`], isolating failures to the
//! chunk that caused them.

use crate::config::VoiceConfig;
use crate::error::Error;
use crate::project::debug::DebugLog;
use crate::project::manifest::{Chunk, ChunkStatus, Manifest};
use crate::project::{write_atomic, ProjectLayout};
use crate::text::sanitize::sanitize_for_tts;
use crate::tts::provider::TtsBackend;
use serde::Serialize;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkOutcome {
    Rendered,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SynthesisReport {
    pub rendered: Vec<u32>,
    pub failed: Vec<u32>,
}

impl SynthesisReport {
    pub fn attempted(&self) -> usize {
        self.rendered.len() + self.failed.len()
    }
}

pub struct SynthesisDriver<'a> {
    backend: &'a dyn TtsBackend,
    layout: &'a ProjectLayout,
    debug: DebugLog,
}

impl<'a> SynthesisDriver<'a> {
    pub fn new(backend: &'a dyn TtsBackend, layout: &'a ProjectLayout) -> Self {
        Self {
            backend,
            layout,
            debug: DebugLog::new(layout),
        }
    }

    /// Synthesizes every `pending` chunk in ascending id order. Failed chunks
    /// are left alone; only an explicit review retries them.
    ///
    /// Errors returned here are manifest persistence failures, never
    /// per-chunk synthesis failures.
    pub fn run_pending(&self, manifest: &mut Manifest) -> crate::Result<SynthesisReport> {
        let pending = manifest.pending_chunk_ids();
        let total = pending.len();
        let mut report = SynthesisReport::default();

        tracing::info!(backend = self.backend.name(), pending = total, "starting synthesis");
        for (index, chunk_id) in pending.into_iter().enumerate() {
            tracing::info!(chunk_id, "synthesizing chunk {}/{}", index + 1, total);
            match self.render_chunk(manifest, chunk_id)? {
                ChunkOutcome::Rendered => report.rendered.push(chunk_id),
                ChunkOutcome::Failed => report.failed.push(chunk_id),
            }
        }

        tracing::info!(
            rendered = report.rendered.len(),
            failed = report.failed.len(),
            "synthesis finished"
        );
        Ok(report)
    }

    /// Synthesizes one chunk regardless of its current status and records the
    /// outcome in the manifest.
    pub fn render_chunk(&self, manifest: &mut Manifest, chunk_id: u32) -> crate::Result<ChunkOutcome> {
        let chunk = manifest.chunk(chunk_id)?.clone();
        let voice = manifest.config().voice();

        match self.synthesize_to_slot(&chunk, &voice) {
            Ok(audio_path) => {
                manifest.update_chunk(chunk_id, ChunkStatus::Rendered, Some(audio_path), None)?;
                Ok(ChunkOutcome::Rendered)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(chunk_id, chapter_id = chunk.chapter_id, error = %message, "chunk failed");
                if let Err(log_err) =
                    self.debug
                        .record(chunk_id, chunk.chapter_id, &chunk.text, &message)
                {
                    tracing::warn!(chunk_id, error = %log_err, "could not write failure record");
                }
                manifest.update_chunk(chunk_id, ChunkStatus::Failed, None, None)?;
                Ok(ChunkOutcome::Failed)
            }
        }
    }

    fn synthesize_to_slot(&self, chunk: &Chunk, voice: &VoiceConfig) -> crate::Result<PathBuf> {
        let fail = |message: String| Error::ChunkSynthesis {
            chunk_id: chunk.chunk_id,
            message,
        };

        let text = sanitize_for_tts(&chunk.text);
        if text.is_empty() {
            return Err(fail("no speakable text after sanitizing".to_string()));
        }

        let audio = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend.synthesize(&text, voice)
        })) {
            Ok(Ok(audio)) => audio,
            Ok(Err(err)) => return Err(fail(format!("{err:#}"))),
            Err(_) => return Err(fail(format!("{} backend panicked", self.backend.name()))),
        };

        if audio.is_empty() {
            return Err(fail("backend returned empty audio".to_string()));
        }
        if let Err(err) = hound::WavReader::new(Cursor::new(&audio)) {
            return Err(fail(format!("backend returned invalid WAV: {err}")));
        }

        let relative = ProjectLayout::chunk_audio(chunk.chunk_id);
        write_atomic(&self.layout.resolve(&relative), &audio).map_err(|err| fail(err.to_string()))?;
        Ok(relative)
    }
}
