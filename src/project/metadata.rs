//! Descriptive, non-authoritative information about a project: where the text
//! came from and what the last run did. Chunk state lives in the manifest.

use super::write_atomic;
use crate::error::Error;
use crate::project::manifest::StatusSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub title: String,
    pub source_path: PathBuf,
    pub source_blake3: String,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub chapter_count: usize,
    pub chunk_count: usize,
    #[serde(default)]
    pub last_run: Option<RunRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub operation: String,
    pub finished_at: DateTime<Utc>,
    pub rendered: usize,
    pub failed: usize,
    pub pending: usize,
}

impl ProjectMetadata {
    pub fn new(
        title: &str,
        source: &Path,
        chapter_count: usize,
        chunk_count: usize,
    ) -> crate::Result<Self> {
        let now = Utc::now();
        Ok(Self {
            title: title.to_string(),
            source_path: source.to_path_buf(),
            source_blake3: hash_file(source)?,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            updated_at: now,
            chapter_count,
            chunk_count,
            last_run: None,
        })
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| Error::io(format!("read metadata {}", path.display()), err))?;
        serde_json::from_str(&raw)
            .map_err(|err| Error::json(format!("parse metadata {}", path.display()), err))
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let bytes =
            serde_json::to_vec_pretty(self).map_err(|err| Error::json("serialize metadata", err))?;
        write_atomic(path, &bytes)
    }

    pub fn record_run(&mut self, operation: &str, summary: &StatusSummary) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_run = Some(RunRecord {
            operation: operation.to_string(),
            finished_at: now,
            rendered: summary.rendered,
            failed: summary.failed,
            pending: summary.pending,
        });
    }
}

/// Loads the metadata file, records the run and writes it back. A missing or
/// unreadable metadata file is only worth a warning.
pub fn record_run(path: &Path, operation: &str, summary: &StatusSummary) {
    let result = ProjectMetadata::load(path).and_then(|mut metadata| {
        metadata.record_run(operation, summary);
        metadata.save(path)
    });
    if let Err(err) = result {
        tracing::warn!(error = %err, path = %path.display(), "could not update project metadata");
    }
}

pub fn hash_file(path: &Path) -> crate::Result<String> {
    let mut file = File::open(path)
        .map_err(|err| Error::io(format!("open {} for hashing", path.display()), err))?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|err| Error::io(format!("hash {}", path.display()), err))?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_source_hash_and_runs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("book.txt");
        fs::write(&source, "Some text.").unwrap();

        let metadata = ProjectMetadata::new("book", &source, 1, 1).unwrap();
        assert_eq!(
            metadata.source_blake3,
            blake3::hash(b"Some text.").to_hex().to_string()
        );

        let path = dir.path().join("metadata.json");
        metadata.save(&path).unwrap();
        let summary = StatusSummary {
            rendered: 3,
            failed: 1,
            ..StatusSummary::default()
        };
        record_run(&path, "review", &summary);

        let reloaded = ProjectMetadata::load(&path).unwrap();
        let run = reloaded.last_run.unwrap();
        assert_eq!(run.operation, "review");
        assert_eq!((run.rendered, run.failed, run.pending), (3, 1, 0));
    }

    #[test]
    fn unparsable_metadata_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, "{ not json").unwrap();

        let err = ProjectMetadata::load(&path).unwrap_err();
        assert!(matches!(err, Error::Json { .. }), "{err}");
        assert!(err.to_string().starts_with("parse metadata"));
    }
}
