//! The persisted project manifest: sole record of chapter structure and
//! per-chunk synthesis state.
//!
//! Every mutating call validates the change, rewrites the whole manifest
//! atomically, and only then returns. If the write fails the in-memory state
//! is rolled back, so memory and disk never disagree after a successful call.

use super::{write_atomic, write_atomic_new};
use crate::config::{Preset, VoiceConfig};
use crate::error::Error;
use crate::text::chunker::ChunkPlan;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Rendered,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkStatus::Pending => "pending",
            ChunkStatus::Rendered => "rendered",
            ChunkStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(skip)]
    pub chunk_id: u32,
    pub chapter_id: u32,
    pub text: String,
    pub status: ChunkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
    #[serde(default)]
    pub estimated_seconds: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub chapter_id: u32,
    pub title: String,
    pub chunk_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub voice_model_path: PathBuf,
    pub preset_name: String,
    pub skip_first_chunks: usize,
    pub preset: Preset,
}

impl ProjectConfig {
    pub fn voice(&self) -> VoiceConfig {
        VoiceConfig {
            model_path: self.voice_model_path.clone(),
            preset: self.preset.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub chapters: usize,
    pub chunks: usize,
    pub pending: usize,
    pub rendered: usize,
    pub failed: usize,
    pub failed_chunk_ids: Vec<u32>,
    pub estimated_seconds: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(skip)]
    path: PathBuf,
    version: u32,
    config: ProjectConfig,
    chapters: Vec<Chapter>,
    chunks: BTreeMap<u32, Chunk>,
}

impl Manifest {
    /// Writes a fresh manifest for `plan`. Never overwrites an existing one.
    pub fn create(path: &Path, plan: &ChunkPlan, config: ProjectConfig) -> crate::Result<Self> {
        if path.exists() {
            return Err(Error::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let chapters = plan
            .chapters
            .iter()
            .map(|chapter| Chapter {
                chapter_id: chapter.chapter_id,
                title: chapter.title.clone(),
                chunk_ids: chapter.chunk_ids.clone(),
                audio_path: None,
            })
            .collect();

        let chunks = plan
            .chunks
            .iter()
            .map(|chunk| {
                (
                    chunk.chunk_id,
                    Chunk {
                        chunk_id: chunk.chunk_id,
                        chapter_id: chunk.chapter_id,
                        text: chunk.text.clone(),
                        status: ChunkStatus::Pending,
                        audio_path: None,
                        estimated_seconds: chunk.estimated_seconds,
                    },
                )
            })
            .collect();

        let manifest = Self {
            path: path.to_path_buf(),
            version: MANIFEST_VERSION,
            config,
            chapters,
            chunks,
        };

        manifest
            .verify()
            .map_err(|detail| manifest.corrupt(detail))?;
        write_atomic_new(path, &manifest.to_bytes()?)?;

        tracing::info!(
            path = %path.display(),
            chapters = manifest.chapters.len(),
            chunks = manifest.chunks.len(),
            "created project manifest"
        );
        Ok(manifest)
    }

    /// Reads and integrity-checks a manifest.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.is_file() {
            return Err(Error::ProjectNotFound {
                path: path.parent().unwrap_or(path).to_path_buf(),
            });
        }

        let raw = fs::read_to_string(path)
            .map_err(|err| Error::io(format!("read manifest {}", path.display()), err))?;
        let mut manifest: Manifest =
            serde_json::from_str(&raw).map_err(|err| Error::CorruptManifest {
                path: path.to_path_buf(),
                detail: err.to_string(),
            })?;

        manifest.path = path.to_path_buf();
        for (id, chunk) in manifest.chunks.iter_mut() {
            chunk.chunk_id = *id;
        }
        manifest
            .verify()
            .map_err(|detail| manifest.corrupt(detail))?;

        Ok(manifest)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, chunk_id: u32) -> crate::Result<&Chunk> {
        self.chunks.get(&chunk_id).ok_or(Error::UnknownChunk {
            chunk_id,
            chunk_count: self.chunks.len(),
        })
    }

    pub fn chapter(&self, chapter_id: u32) -> crate::Result<&Chapter> {
        self.chapters
            .iter()
            .find(|chapter| chapter.chapter_id == chapter_id)
            .ok_or(Error::UnknownChapter { chapter_id })
    }

    /// Chunks of one chapter in concatenation order.
    pub fn chapter_chunks(&self, chapter_id: u32) -> crate::Result<Vec<&Chunk>> {
        let chapter = self.chapter(chapter_id)?;
        chapter
            .chunk_ids
            .iter()
            .map(|id| self.chunk(*id))
            .collect()
    }

    pub fn pending_chunk_ids(&self) -> Vec<u32> {
        self.ids_with_status(ChunkStatus::Pending)
    }

    pub fn ids_with_status(&self, status: ChunkStatus) -> Vec<u32> {
        self.chunks
            .values()
            .filter(|chunk| chunk.status == status)
            .map(|chunk| chunk.chunk_id)
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        let mut summary = StatusSummary {
            chapters: self.chapters.len(),
            chunks: self.chunks.len(),
            ..StatusSummary::default()
        };
        for chunk in self.chunks.values() {
            summary.estimated_seconds += chunk.estimated_seconds;
            match chunk.status {
                ChunkStatus::Pending => summary.pending += 1,
                ChunkStatus::Rendered => summary.rendered += 1,
                ChunkStatus::Failed => {
                    summary.failed += 1;
                    summary.failed_chunk_ids.push(chunk.chunk_id);
                }
            }
        }
        summary
    }

    /// Updates one chunk and persists before returning.
    ///
    /// `audio_path` is only kept for `Rendered`; any other status clears it.
    pub fn update_chunk(
        &mut self,
        chunk_id: u32,
        status: ChunkStatus,
        audio_path: Option<PathBuf>,
        text: Option<String>,
    ) -> crate::Result<()> {
        let chunk_count = self.chunks.len();
        let chunk = self
            .chunks
            .get_mut(&chunk_id)
            .ok_or(Error::UnknownChunk {
                chunk_id,
                chunk_count,
            })?;

        if let Some(text) = &text {
            if text.trim().is_empty() {
                return Err(Error::EmptyText { chunk_id });
            }
        }
        let audio_path = match status {
            ChunkStatus::Rendered => match audio_path {
                Some(path) => Some(path),
                None => {
                    return Err(Error::CorruptManifest {
                        path: self.path.clone(),
                        detail: format!("chunk {chunk_id} marked rendered without audio"),
                    })
                }
            },
            ChunkStatus::Pending | ChunkStatus::Failed => None,
        };

        let previous = chunk.clone();
        chunk.status = status;
        chunk.audio_path = audio_path;
        if let Some(text) = text {
            chunk.text = text;
        }

        if let Err(err) = self.save() {
            self.chunks.insert(chunk_id, previous);
            return Err(err);
        }
        Ok(())
    }

    pub fn set_chapter_audio(
        &mut self,
        chapter_id: u32,
        audio_path: Option<PathBuf>,
    ) -> crate::Result<()> {
        let chapter = self
            .chapters
            .iter_mut()
            .find(|chapter| chapter.chapter_id == chapter_id)
            .ok_or(Error::UnknownChapter { chapter_id })?;

        let previous = std::mem::replace(&mut chapter.audio_path, audio_path);
        if let Err(err) = self.save() {
            if let Some(chapter) = self
                .chapters
                .iter_mut()
                .find(|chapter| chapter.chapter_id == chapter_id)
            {
                chapter.audio_path = previous;
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn set_skip_first_chunks(&mut self, skip_first_chunks: usize) -> crate::Result<()> {
        if self.config.skip_first_chunks == skip_first_chunks {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.config.skip_first_chunks, skip_first_chunks);
        if let Err(err) = self.save() {
            self.config.skip_first_chunks = previous;
            return Err(err);
        }
        Ok(())
    }

    fn save(&self) -> crate::Result<()> {
        write_atomic(&self.path, &self.to_bytes()?)
    }

    fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|err| {
            Error::json(format!("serialize manifest {}", self.path.display()), err)
        })
    }

    fn corrupt(&self, detail: String) -> Error {
        Error::CorruptManifest {
            path: self.path.clone(),
            detail,
        }
    }

    /// Referential integrity: chapter ids run 1..=n, chunk ids run 0..n in
    /// document order, and every chunk is listed by exactly the chapter it
    /// names.
    fn verify(&self) -> Result<(), String> {
        if self.version != MANIFEST_VERSION {
            return Err(format!("unsupported manifest version {}", self.version));
        }

        for (expected, id) in self.chunks.keys().enumerate() {
            if *id as usize != expected {
                return Err(format!("chunk ids are not contiguous: expected {expected}, found {id}"));
            }
        }

        let mut seen = HashSet::with_capacity(self.chunks.len());
        let mut last_chunk_id: Option<u32> = None;
        for (index, chapter) in self.chapters.iter().enumerate() {
            let expected_id = index as u32 + 1;
            if chapter.chapter_id != expected_id {
                return Err(format!(
                    "chapter ids are not contiguous: expected {expected_id}, found {}",
                    chapter.chapter_id
                ));
            }

            for chunk_id in &chapter.chunk_ids {
                let chunk = self.chunks.get(chunk_id).ok_or_else(|| {
                    format!(
                        "chapter {} references missing chunk {chunk_id}",
                        chapter.chapter_id
                    )
                })?;
                if chunk.chapter_id != chapter.chapter_id {
                    return Err(format!(
                        "chunk {chunk_id} claims chapter {} but is listed by chapter {}",
                        chunk.chapter_id, chapter.chapter_id
                    ));
                }
                if !seen.insert(*chunk_id) {
                    return Err(format!("chunk {chunk_id} is listed more than once"));
                }
                if last_chunk_id.is_some_and(|last| *chunk_id <= last) {
                    return Err(format!("chunk {chunk_id} is out of document order"));
                }
                last_chunk_id = Some(*chunk_id);
            }
        }

        for chunk in self.chunks.values() {
            if !seen.contains(&chunk.chunk_id) {
                return Err(format!(
                    "chunk {} is not listed by any chapter (claims chapter {})",
                    chunk.chunk_id, chunk.chapter_id
                ));
            }
            if chunk.text.trim().is_empty() {
                return Err(format!("chunk {} has empty text", chunk.chunk_id));
            }
            match (chunk.status, &chunk.audio_path) {
                (ChunkStatus::Rendered, None) => {
                    return Err(format!(
                        "chunk {} is rendered but has no audio_path",
                        chunk.chunk_id
                    ))
                }
                (ChunkStatus::Pending | ChunkStatus::Failed, Some(_)) => {
                    return Err(format!(
                        "chunk {} is {} but has an audio_path",
                        chunk.chunk_id,
                        chunk.status.as_str()
                    ))
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::chunker::{plan_chunks, ChapterText, ChunkerConfig};

    fn sample_plan() -> ChunkPlan {
        let chapters = [
            ChapterText {
                title: "One".to_string(),
                text: "Alpha. Beta.".to_string(),
            },
            ChapterText {
                title: "Two".to_string(),
                text: "Gamma. Delta. Epsilon.".to_string(),
            },
        ];
        plan_chunks(&chapters, ChunkerConfig::new(100, 0))
    }

    fn sample_config() -> ProjectConfig {
        ProjectConfig {
            voice_model_path: PathBuf::from("voice.onnx"),
            preset_name: "standard".to_string(),
            skip_first_chunks: 0,
            preset: Preset::default(),
        }
    }

    fn create_sample(dir: &Path) -> Manifest {
        Manifest::create(&dir.join("project.json"), &sample_plan(), sample_config()).unwrap()
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        create_sample(dir.path());
        let before = fs::read(dir.path().join("project.json")).unwrap();

        let err = Manifest::create(&dir.path().join("project.json"), &sample_plan(), sample_config())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert_eq!(fs::read(dir.path().join("project.json")).unwrap(), before);
    }

    #[test]
    fn load_round_trips_created_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let created = create_sample(dir.path());
        let loaded = Manifest::load(created.path()).unwrap();
        assert_eq!(created, loaded);
        assert_eq!(loaded.chunk(3).unwrap().chunk_id, 3);
    }

    #[test]
    fn load_missing_manifest_is_project_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("project.json")).unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound { .. }));
    }

    #[test]
    fn update_is_visible_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = create_sample(dir.path());
        manifest
            .update_chunk(
                1,
                ChunkStatus::Rendered,
                Some(PathBuf::from("chunks/chunk_00001.wav")),
                None,
            )
            .unwrap();
        manifest
            .update_chunk(2, ChunkStatus::Failed, None, Some("Gamma again.".to_string()))
            .unwrap();

        let reloaded = Manifest::load(manifest.path()).unwrap();
        assert_eq!(reloaded, manifest);
        let chunk = reloaded.chunk(1).unwrap();
        assert_eq!(chunk.status, ChunkStatus::Rendered);
        assert_eq!(
            chunk.audio_path.as_deref(),
            Some(Path::new("chunks/chunk_00001.wav"))
        );
        assert_eq!(reloaded.chunk(2).unwrap().text, "Gamma again.");
        assert_eq!(reloaded.summary().failed_chunk_ids, [2]);
    }

    #[test]
    fn non_rendered_status_clears_audio_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = create_sample(dir.path());
        manifest
            .update_chunk(0, ChunkStatus::Rendered, Some(PathBuf::from("a.wav")), None)
            .unwrap();
        manifest
            .update_chunk(0, ChunkStatus::Pending, Some(PathBuf::from("a.wav")), None)
            .unwrap();
        assert_eq!(manifest.chunk(0).unwrap().audio_path, None);
    }

    #[test]
    fn invalid_updates_leave_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = create_sample(dir.path());
        let before = manifest.clone();

        assert!(matches!(
            manifest.update_chunk(99, ChunkStatus::Failed, None, None),
            Err(Error::UnknownChunk { chunk_id: 99, .. })
        ));
        assert!(matches!(
            manifest.update_chunk(0, ChunkStatus::Pending, None, Some("  ".to_string())),
            Err(Error::EmptyText { chunk_id: 0 })
        ));
        assert!(manifest
            .update_chunk(0, ChunkStatus::Rendered, None, None)
            .is_err());
        assert_eq!(manifest, before);
        assert_eq!(Manifest::load(manifest.path()).unwrap(), before);
    }

    #[test]
    fn chapter_chunks_follow_chapter_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = create_sample(dir.path());
        let texts: Vec<_> = manifest
            .chapter_chunks(2)
            .unwrap()
            .iter()
            .map(|c| c.text.as_str())
            .collect();
        assert_eq!(texts, ["Gamma.", "Delta.", "Epsilon."]);
        assert!(matches!(
            manifest.chapter_chunks(7),
            Err(Error::UnknownChapter { chapter_id: 7 })
        ));
    }

    fn rewrite(dir: &Path, edit: impl FnOnce(&mut serde_json::Value)) -> Error {
        let path = dir.join("project.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        edit(&mut value);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        Manifest::load(&path).unwrap_err()
    }

    #[test]
    fn load_rejects_dangling_chunk_reference() {
        let dir = tempfile::tempdir().unwrap();
        create_sample(dir.path());
        let err = rewrite(dir.path(), |v| {
            v["chapters"][0]["chunk_ids"] = serde_json::json!([0, 1, 42]);
        });
        match err {
            Error::CorruptManifest { detail, .. } => assert!(detail.contains("42"), "{detail}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_rejects_chapter_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        create_sample(dir.path());
        let err = rewrite(dir.path(), |v| {
            v["chunks"]["0"]["chapter_id"] = serde_json::json!(2);
        });
        assert!(matches!(err, Error::CorruptManifest { .. }));
    }

    #[test]
    fn load_rejects_missing_fields_and_unknown_status() {
        let dir = tempfile::tempdir().unwrap();
        create_sample(dir.path());
        let err = rewrite(dir.path(), |v| {
            v["chunks"]["1"]["status"] = serde_json::json!("queued");
        });
        assert!(matches!(err, Error::CorruptManifest { .. }));

        let err = rewrite(dir.path(), |v| {
            v.as_object_mut().unwrap().remove("config");
        });
        assert!(matches!(err, Error::CorruptManifest { .. }));
    }

    #[test]
    fn skip_first_chunks_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = create_sample(dir.path());
        manifest.set_skip_first_chunks(2).unwrap();
        assert_eq!(
            Manifest::load(manifest.path()).unwrap().config().skip_first_chunks,
            2
        );
    }
}
