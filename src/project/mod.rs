pub mod debug;
pub mod manifest;
pub mod metadata;

use crate::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const MANIFEST_FILE: &str = "project.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const AUDIO_EXT: &str = "wav";

/// Where everything of one project lives. Paths recorded in the manifest are
/// relative to the root so a project directory can be moved as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest_path().exists()
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.root.join("debug")
    }

    pub fn failures_log(&self) -> PathBuf {
        self.debug_dir().join("failures.jsonl")
    }

    pub fn chunk_audio(chunk_id: u32) -> PathBuf {
        Path::new("chunks").join(format!("chunk_{chunk_id:05}.{AUDIO_EXT}"))
    }

    pub fn chapter_audio(chapter_id: u32) -> PathBuf {
        Path::new("chapters").join(format!("chapter_{chapter_id:02}.{AUDIO_EXT}"))
    }

    pub fn book_audio() -> PathBuf {
        PathBuf::from(format!("book.{AUDIO_EXT}"))
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn create_dirs(&self) -> crate::Result<()> {
        for dir in [
            self.root.clone(),
            self.root.join("chunks"),
            self.root.join("chapters"),
            self.debug_dir(),
        ] {
            fs::create_dir_all(&dir)
                .map_err(|err| Error::io(format!("create {}", dir.display()), err))?;
        }
        Ok(())
    }
}

/// Writes `bytes` to a temp file next to `path`, syncs it, then renames it into
/// place. Readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> crate::Result<()> {
    let tmp = write_temp_sibling(path, bytes)?;
    tmp.persist(path)
        .map_err(|err| Error::io(format!("replace {}", path.display()), err.error))?;
    Ok(())
}

/// Like [`write_atomic`] but refuses to replace an existing file.
pub fn write_atomic_new(path: &Path, bytes: &[u8]) -> crate::Result<()> {
    let tmp = write_temp_sibling(path, bytes)?;
    tmp.persist_noclobber(path).map_err(|err| {
        if err.error.kind() == std::io::ErrorKind::AlreadyExists {
            Error::AlreadyExists {
                path: path.to_path_buf(),
            }
        } else {
            Error::io(format!("create {}", path.display()), err.error)
        }
    })?;
    Ok(())
}

fn write_temp_sibling(path: &Path, bytes: &[u8]) -> crate::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|err| Error::io(format!("create {}", dir.display()), err))?;

    let mut tmp = NamedTempFile::new_in(&dir)
        .map_err(|err| Error::io(format!("create temp file in {}", dir.display()), err))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|err| Error::io(format!("write temp file for {}", path.display()), err))?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_paths_are_zero_padded() {
        assert_eq!(
            ProjectLayout::chunk_audio(7),
            Path::new("chunks").join("chunk_00007.wav")
        );
        assert_eq!(
            ProjectLayout::chapter_audio(3),
            Path::new("chapters").join("chapter_03.wav")
        );
        assert_eq!(ProjectLayout::book_audio(), PathBuf::from("book.wav"));
    }

    #[test]
    fn atomic_write_replaces_and_new_write_refuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.json");

        write_atomic_new(&path, b"one").unwrap();
        let err = write_atomic_new(&path, b"two").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"one");

        write_atomic(&path, b"three").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"three");

        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
