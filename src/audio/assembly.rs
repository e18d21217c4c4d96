//! Builds chapter files from rendered chunk audio and the book file from
//! chapter files, always in manifest order.
//!
//! Chunks that are not `rendered` are left out of the audio. The gap is
//! visible in the manifest, not signalled as an error.

use super::AudioMuxer;
use crate::error::Error;
use crate::project::manifest::{Chunk, ChunkStatus, Manifest};
use crate::project::ProjectLayout;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    /// Chapters whose file was (re)written.
    pub chapters: Vec<u32>,
    /// Chapters with no rendered chunk, hence no file.
    pub silent_chapters: Vec<u32>,
    pub book: Option<PathBuf>,
}

pub struct Assembler<'a> {
    muxer: &'a dyn AudioMuxer,
    layout: &'a ProjectLayout,
}

impl<'a> Assembler<'a> {
    pub fn new(muxer: &'a dyn AudioMuxer, layout: &'a ProjectLayout) -> Self {
        Self { muxer, layout }
    }

    /// Rebuilds every chapter, then the book.
    pub fn assemble_all(&self, manifest: &mut Manifest) -> crate::Result<AssemblyReport> {
        let chapter_ids: Vec<u32> = manifest.chapters().iter().map(|c| c.chapter_id).collect();
        let mut report = AssemblyReport::default();
        for chapter_id in chapter_ids {
            self.assemble_into(manifest, chapter_id, &mut report)?;
        }
        report.book = Some(self.assemble_book(manifest)?);
        Ok(report)
    }

    /// Rebuilds one chapter, then the book. Other chapter files are reused
    /// as they are.
    pub fn assemble_scoped(
        &self,
        manifest: &mut Manifest,
        chapter_id: u32,
    ) -> crate::Result<AssemblyReport> {
        let mut report = AssemblyReport::default();
        self.assemble_into(manifest, chapter_id, &mut report)?;
        report.book = Some(self.assemble_book(manifest)?);
        Ok(report)
    }

    fn assemble_into(
        &self,
        manifest: &mut Manifest,
        chapter_id: u32,
        report: &mut AssemblyReport,
    ) -> crate::Result<()> {
        match self.assemble_chapter(manifest, chapter_id)? {
            Some(_) => report.chapters.push(chapter_id),
            None => report.silent_chapters.push(chapter_id),
        }
        Ok(())
    }

    /// Concatenates the rendered chunks of one chapter. Returns the chapter
    /// file's project-relative path, or `None` when nothing is rendered yet.
    pub fn assemble_chapter(
        &self,
        manifest: &mut Manifest,
        chapter_id: u32,
    ) -> crate::Result<Option<PathBuf>> {
        let inputs = self.rendered_inputs(&manifest.chapter_chunks(chapter_id)?);
        let relative = ProjectLayout::chapter_audio(chapter_id);
        let target = self.layout.resolve(&relative);

        if inputs.is_empty() {
            tracing::warn!(chapter_id, "chapter has no rendered chunks; no chapter file");
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(Error::io(format!("remove {}", target.display()), err));
                }
            }
            manifest.set_chapter_audio(chapter_id, None)?;
            return Ok(None);
        }

        tracing::info!(chapter_id, chunks = inputs.len(), "assembling chapter");
        self.muxer
            .concatenate(&inputs, &target)
            .map_err(|err| Error::Mux {
                target: format!("chapter {chapter_id}"),
                message: format!("{err:#}"),
            })?;
        manifest.set_chapter_audio(chapter_id, Some(relative.clone()))?;
        Ok(Some(relative))
    }

    /// Concatenates chapter files in chapter order into the book file.
    pub fn assemble_book(&self, manifest: &Manifest) -> crate::Result<PathBuf> {
        let inputs = self.book_inputs(manifest)?;
        if inputs.is_empty() {
            return Err(Error::Mux {
                target: "book".to_string(),
                message: "no rendered audio to concatenate".to_string(),
            });
        }

        let relative = ProjectLayout::book_audio();
        tracing::info!(inputs = inputs.len(), "assembling book");
        self.muxer
            .concatenate(&inputs, &self.layout.resolve(&relative))
            .map_err(|err| Error::Mux {
                target: "book".to_string(),
                message: format!("{err:#}"),
            })?;
        Ok(relative)
    }

    /// Files that make up the book. With `skip_first_chunks = n`, the first
    /// chapter contributes its rendered chunks from list position `n` onward
    /// instead of its chapter file; the skip never reaches later chapters.
    pub fn book_inputs(&self, manifest: &Manifest) -> crate::Result<Vec<PathBuf>> {
        let skip = manifest.config().skip_first_chunks;
        let mut inputs = Vec::new();

        for (index, chapter) in manifest.chapters().iter().enumerate() {
            if index == 0 && skip > 0 {
                let chunks = manifest.chapter_chunks(chapter.chapter_id)?;
                let kept: Vec<&Chunk> = chunks.into_iter().skip(skip).collect();
                inputs.extend(self.rendered_inputs(&kept));
                continue;
            }
            if let Some(path) = &chapter.audio_path {
                inputs.push(self.layout.resolve(path));
            }
        }
        Ok(inputs)
    }

    fn rendered_inputs(&self, chunks: &[&Chunk]) -> Vec<PathBuf> {
        chunks
            .iter()
            .filter_map(|chunk| match (chunk.status, &chunk.audio_path) {
                (ChunkStatus::Rendered, Some(path)) => Some(self.layout.resolve(path)),
                (ChunkStatus::Rendered, None) => None,
                (ChunkStatus::Pending | ChunkStatus::Failed, _) => None,
            })
            .collect()
    }
}
