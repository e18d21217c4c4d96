pub mod epub;
pub mod txt;

use crate::error::Error;
use crate::text::chunker::ChapterText;
use anyhow::anyhow;
use std::path::Path;

/// Reads a source document into ordered, uncleaned chapter bodies.
pub fn extract_chapters(source: &Path) -> crate::Result<Vec<ChapterText>> {
    if !source.is_file() {
        return Err(Error::Ingest {
            path: source.to_path_buf(),
            message: "input file not found".to_string(),
        });
    }

    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let result = match ext.as_str() {
        "txt" | "text" | "md" | "markdown" => txt::load_txt(source),
        "epub" => epub::load_epub(source),
        "" => Err(anyhow!("input has no file extension")),
        other => Err(anyhow!("unsupported input format: .{other}")),
    };

    let chapters = result.map_err(|err| Error::Ingest {
        path: source.to_path_buf(),
        message: format!("{err:#}"),
    })?;

    tracing::info!(path = %source.display(), chapters = chapters.len(), "ingested source");
    Ok(chapters)
}

pub(crate) fn title_from_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let err = extract_chapters(&path).unwrap_err();
        assert!(matches!(err, Error::Ingest { .. }));
        assert!(err.to_string().contains("unsupported input format"));
    }

    #[test]
    fn missing_input_is_an_ingest_error() {
        let err = extract_chapters(Path::new("/no/such/book.txt")).unwrap_err();
        assert!(matches!(err, Error::Ingest { .. }));
    }
}
