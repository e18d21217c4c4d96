pub mod driver;
pub mod piper;
pub mod provider;

pub use driver::{ChunkOutcome, SynthesisDriver, SynthesisReport};
pub use provider::{select_backend, TtsBackend};

use crate::config::Config;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub available: bool,
    pub binary: PathBuf,
    pub timeout_seconds: u64,
}

pub fn backends_info(config: &Config) -> Vec<BackendInfo> {
    let piper = piper::PiperBackend::from_config(&config.tts);
    vec![BackendInfo {
        name: "piper".to_string(),
        available: piper.is_available(),
        binary: piper.binary().to_path_buf(),
        timeout_seconds: config.tts.timeout_seconds,
    }]
}
