use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the project pipeline.
///
/// Only `ChunkSynthesis` is recovered locally (the chunk is marked failed and
/// the run continues); every other variant aborts the operation that raised it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("a project manifest already exists at {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("no project manifest found in {}", path.display())]
    ProjectNotFound { path: PathBuf },

    #[error("unknown chunk {chunk_id} (project has {chunk_count} chunks)")]
    UnknownChunk { chunk_id: u32, chunk_count: usize },

    #[error("unknown chapter {chapter_id}")]
    UnknownChapter { chapter_id: u32 },

    #[error("corrupt manifest {}: {detail}", path.display())]
    CorruptManifest { path: PathBuf, detail: String },

    #[error("chunk {chunk_id} failed to synthesize: {message}")]
    ChunkSynthesis { chunk_id: u32, message: String },

    #[error("failed to assemble {target}: {message}")]
    Mux { target: String, message: String },

    #[error("failed to ingest {}: {message}", path.display())]
    Ingest { path: PathBuf, message: String },

    #[error("replacement text for chunk {chunk_id} is empty")]
    EmptyText { chunk_id: u32 },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }
}
