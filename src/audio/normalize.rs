//! Loudness normalisation of assembled audio with ffmpeg's two-pass
//! `loudnorm` filter (EBU R128).

use super::AudioMuxer;
use crate::config::NormalizeConfig;
use crate::subprocess;
use anyhow::{bail, Context};
use hound::{SampleFormat, WavReader, WavSpec};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Rewrites `input` at a target loudness into `output`. `output` must only
/// be replaced once the new file is complete.
pub trait LoudnessNormalizer {
    fn normalize(&self, input: &Path, output: &Path) -> anyhow::Result<()>;
}

/// Concatenates with `muxer` into a scratch file, then normalises that file
/// into the real output.
pub struct NormalizingMuxer<M, N> {
    muxer: M,
    normalizer: N,
}

impl<M, N> NormalizingMuxer<M, N> {
    pub fn new(muxer: M, normalizer: N) -> Self {
        Self { muxer, normalizer }
    }
}

impl<M: AudioMuxer, N: LoudnessNormalizer> AudioMuxer for NormalizingMuxer<M, N> {
    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        let dir = output_dir(output)?;
        let raw = tempfile::Builder::new()
            .prefix(".concat-")
            .suffix(".wav")
            .tempfile_in(dir)
            .context("create scratch file")?;

        self.muxer.concatenate(inputs, raw.path())?;
        self.normalizer
            .normalize(raw.path(), output)
            .with_context(|| format!("normalize {}", output.display()))
    }
}

/// Values ffmpeg prints after the measuring pass. All are strings in its
/// JSON output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LoudnessMeasurement {
    input_i: String,
    input_lra: String,
    input_tp: String,
    input_thresh: String,
    target_offset: String,
}

impl LoudnessMeasurement {
    /// Digital silence measures as `-inf` and cannot be corrected.
    fn is_measurable(&self) -> bool {
        self.input_i
            .trim()
            .parse::<f32>()
            .is_ok_and(f32::is_finite)
    }
}

pub struct FfmpegNormalizer {
    binary: PathBuf,
    target_lufs: f32,
    loudness_range: f32,
    timeout: Option<Duration>,
}

impl FfmpegNormalizer {
    pub fn new(binary: PathBuf, target_lufs: f32, loudness_range: f32, timeout: Option<Duration>) -> Self {
        Self {
            binary,
            target_lufs,
            loudness_range,
            timeout,
        }
    }

    pub fn from_config(config: &NormalizeConfig) -> Self {
        let binary = config
            .ffmpeg_binary
            .clone()
            .or_else(|| std::env::var_os("BOOKFORGE_FFMPEG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let timeout = match config.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self::new(binary, config.target_lufs, config.loudness_range, timeout)
    }

    fn base_command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-hide_banner").arg("-nostdin").arg("-i").arg(input);
        cmd
    }

    fn measure_command(&self, input: &Path) -> Command {
        let mut cmd = self.base_command(input);
        cmd.arg("-af")
            .arg(format!(
                "loudnorm=I={}:LRA={}:print_format=json",
                self.target_lufs, self.loudness_range
            ))
            .arg("-f")
            .arg("null")
            .arg("-");
        cmd
    }

    fn apply_command(
        &self,
        input: &Path,
        measured: &LoudnessMeasurement,
        spec: WavSpec,
        output: &Path,
    ) -> anyhow::Result<Command> {
        let mut cmd = self.base_command(input);
        cmd.arg("-af")
            .arg(format!(
                "loudnorm=I={}:LRA={}:measured_I={}:measured_LRA={}:measured_TP={}:measured_thresh={}:offset={}:print_format=summary",
                self.target_lufs,
                self.loudness_range,
                measured.input_i,
                measured.input_lra,
                measured.input_tp,
                measured.input_thresh,
                measured.target_offset
            ))
            // loudnorm resamples internally; keep the source format so
            // normalised and raw files still concatenate.
            .arg("-ar")
            .arg(spec.sample_rate.to_string())
            .arg("-ac")
            .arg(spec.channels.to_string())
            .arg("-c:a")
            .arg(pcm_codec(spec)?)
            .arg("-y")
            .arg(output);
        Ok(cmd)
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }
}

impl LoudnessNormalizer for FfmpegNormalizer {
    fn normalize(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let spec = WavReader::open(input)
            .with_context(|| format!("open {}", input.display()))?
            .spec();

        let program = self.program();
        let measured = subprocess::run(self.measure_command(input), &program, None, self.timeout)?;
        if !measured.status.success() {
            bail!("ffmpeg loudness analysis failed: {}", measured.stderr_lossy());
        }
        let measurement = parse_measurement(&measured.stderr_lossy())?;

        let tmp = tempfile::Builder::new()
            .prefix(".normalize-")
            .suffix(".wav")
            .tempfile_in(output_dir(output)?)
            .context("create normalised output")?;

        if measurement.is_measurable() {
            let cmd = self.apply_command(input, &measurement, spec, tmp.path())?;
            let applied = subprocess::run(cmd, &program, None, self.timeout)?;
            if !applied.status.success() {
                bail!("ffmpeg normalisation failed: {}", applied.stderr_lossy());
            }
            WavReader::open(tmp.path()).context("read normalised output")?;
        } else {
            tracing::debug!(input = %input.display(), "silent audio; left as is");
            fs::copy(input, tmp.path()).with_context(|| format!("copy {}", input.display()))?;
        }

        tmp.persist(output)
            .with_context(|| format!("replace {}", output.display()))?;
        tracing::debug!(output = %output.display(), lufs = self.target_lufs, "normalised loudness");
        Ok(())
    }
}

/// ffmpeg prints the measurement as the last JSON object on stderr.
fn parse_measurement(stderr: &str) -> anyhow::Result<LoudnessMeasurement> {
    let (Some(start), Some(end)) = (stderr.rfind('{'), stderr.rfind('}')) else {
        bail!("no loudness measurement in ffmpeg output");
    };
    if end < start {
        bail!("no loudness measurement in ffmpeg output");
    }
    serde_json::from_str(&stderr[start..=end]).context("parse loudness measurement")
}

fn pcm_codec(spec: WavSpec) -> anyhow::Result<&'static str> {
    Ok(match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => "pcm_u8",
        (SampleFormat::Int, 16) => "pcm_s16le",
        (SampleFormat::Int, 24) => "pcm_s24le",
        (SampleFormat::Int, 32) => "pcm_s32le",
        (SampleFormat::Float, 32) => "pcm_f32le",
        (format, bits) => bail!("no PCM codec for {bits}-bit {format:?} samples"),
    })
}

fn output_dir(output: &Path) -> anyhow::Result<&Path> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
