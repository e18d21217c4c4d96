pub mod assembly;
pub mod normalize;
pub mod wav;

pub use assembly::{Assembler, AssemblyReport};
pub use normalize::{FfmpegNormalizer, LoudnessNormalizer, NormalizingMuxer};
pub use wav::WavMuxer;

use crate::config::Config;
use std::path::{Path, PathBuf};

/// Joins waveform files end to end, in the order given, into `output`.
///
/// Implementations must not leave a partially written `output` behind: the
/// previous file (if any) stays in place until the new one is complete.
pub trait AudioMuxer {
    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()>;
}

/// The WAV muxer, wrapped in loudness normalisation when the config asks
/// for it.
pub fn select_muxer(config: &Config) -> Box<dyn AudioMuxer> {
    if config.normalize.enabled {
        tracing::debug!(target_lufs = config.normalize.target_lufs, "loudness normalisation enabled");
        Box::new(NormalizingMuxer::new(
            WavMuxer::new(),
            FfmpegNormalizer::from_config(&config.normalize),
        ))
    } else {
        Box::new(WavMuxer::new())
    }
}
