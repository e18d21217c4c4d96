use crate::config::{Config, VoiceConfig};
use anyhow::bail;

use super::piper::PiperBackend;

/// Narrow capability over a local TTS engine: one blocking call per chunk.
pub trait TtsBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Renders `text` and returns the bytes of a complete WAV file.
    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> anyhow::Result<Vec<u8>>;
}

pub fn select_backend(config: &Config) -> anyhow::Result<Box<dyn TtsBackend>> {
    match config.backend_name() {
        "piper" => Ok(Box::new(PiperBackend::from_config(&config.tts))),
        name => bail!("unknown backend: {name}"),
    }
}
