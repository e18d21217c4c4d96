//! Diagnostic records for chunks that failed to synthesize, one JSON object
//! per line in `debug/failures.jsonl`.

use crate::error::Error;
use crate::project::ProjectLayout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const EXCERPT_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub chunk_id: u32,
    pub chapter_id: u32,
    pub excerpt: String,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DebugLog {
    path: PathBuf,
}

impl DebugLog {
    pub fn new(layout: &ProjectLayout) -> Self {
        Self {
            path: layout.failures_log(),
        }
    }

    pub fn record(&self, chunk_id: u32, chapter_id: u32, text: &str, error: &str) -> crate::Result<()> {
        let record = FailureRecord {
            chunk_id,
            chapter_id,
            excerpt: excerpt(text),
            error: error.to_string(),
            recorded_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io(format!("create {}", parent.display()), err))?;
        }
        let mut line = serde_json::to_string(&record)
            .map_err(|err| Error::json("serialize failure record", err))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| Error::io(format!("open {}", self.path.display()), err))?;
        file.write_all(line.as_bytes())
            .map_err(|err| Error::io(format!("append {}", self.path.display()), err))
    }

    /// All records in append order; unparsable lines are skipped.
    pub fn read_all(&self) -> crate::Result<Vec<FailureRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|err| Error::io(format!("read {}", self.path.display()), err))?;
        Ok(raw
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push_str("...");
    }
    out
}
