//! Runs the `piper` command-line synthesizer, one process per chunk.

use crate::config::{TtsConfig, VoiceConfig};
use crate::subprocess;
use crate::tts::provider::TtsBackend;
use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

pub struct PiperBackend {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl PiperBackend {
    pub fn new(binary: PathBuf, timeout: Option<Duration>) -> Self {
        Self { binary, timeout }
    }

    /// A `timeout_seconds` of 0 disables the per-chunk deadline.
    pub fn from_config(config: &TtsConfig) -> Self {
        let binary = config
            .piper_binary
            .clone()
            .unwrap_or_else(|| PathBuf::from("piper"));
        let timeout = match config.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self::new(binary, timeout)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn command(&self, voice: &VoiceConfig, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model")
            .arg(&voice.model_path)
            .arg("--output_file")
            .arg(output)
            .arg("--length_scale")
            .arg(format!("{:.3}", voice.preset.length_scale()))
            .arg("--sentence_silence")
            .arg(format!("{:.2}", voice.preset.sentence_silence));
        if let Some(speaker) = voice.preset.speaker {
            cmd.arg("--speaker").arg(speaker.to_string());
        }
        cmd
    }
}

impl TtsBackend for PiperBackend {
    fn name(&self) -> &str {
        "piper"
    }

    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> anyhow::Result<Vec<u8>> {
        let output = tempfile::Builder::new()
            .prefix("bookforge-")
            .suffix(".wav")
            .tempfile()
            .context("create piper output file")?;

        let cmd = self.command(voice, output.path());
        tracing::debug!(command = ?cmd, "running piper");
        let mut input = text.as_bytes().to_vec();
        input.push(b'\n');

        let program = self.binary.display().to_string();
        let finished = subprocess::run(cmd, &program, Some(input), self.timeout)?;
        if !finished.status.success() {
            bail!(
                "piper exited with status {}: {}",
                finished.status,
                finished.stderr_lossy()
            );
        }

        let audio = fs::read(output.path()).context("read piper output")?;
        if audio.is_empty() {
            bail!("piper produced no audio");
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;

    fn voice() -> VoiceConfig {
        VoiceConfig {
            model_path: PathBuf::from("voices/en.onnx"),
            preset: Preset {
                rate: 0.5,
                speaker: Some(3),
                ..Preset::default()
            },
        }
    }

    #[test]
    fn builds_piper_arguments_from_voice() {
        let backend = PiperBackend::new(PathBuf::from("piper"), None);
        let cmd = backend.command(&voice(), Path::new("/tmp/out.wav"));
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "--model",
                "voices/en.onnx",
                "--output_file",
                "/tmp/out.wav",
                "--length_scale",
                "2.000",
                "--sentence_silence",
                "0.30",
                "--speaker",
                "3"
            ]
        );
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config = TtsConfig {
            timeout_seconds: 0,
            ..TtsConfig::default()
        };
        assert!(PiperBackend::from_config(&config).timeout.is_none());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let backend = PiperBackend::new(PathBuf::from("/no/such/piper-binary"), None);
        assert!(!backend.is_available());
        assert!(backend.synthesize("Hello.", &voice()).is_err());
    }

    #[cfg(unix)]
    fn stub_piper(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("piper");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn reads_audio_from_the_output_file() {
        let dir = tempfile::tempdir().unwrap();
        // $4 is the --output_file value.
        let binary = stub_piper(dir.path(), r#"cat >/dev/null; printf RIFF > "$4""#);
        let backend = PiperBackend::new(binary, Some(Duration::from_secs(10)));
        assert_eq!(backend.synthesize("Hello.", &voice()).unwrap(), b"RIFF");
    }

    #[cfg(unix)]
    #[test]
    fn stalled_engine_with_unread_input_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let binary = stub_piper(dir.path(), "exec sleep 5");
        let backend = PiperBackend::new(binary, Some(Duration::from_millis(200)));
        let text = "word ".repeat(200_000);

        let started = std::time::Instant::now();
        let err = backend.synthesize(&text, &voice()).unwrap_err();
        assert!(format!("{err:#}").contains("timed out"), "{err:#}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let binary = stub_piper(dir.path(), "echo 'bad model' >&2; exit 1");
        let backend = PiperBackend::new(binary, None);
        let err = backend.synthesize("Hello.", &voice()).unwrap_err();
        assert!(err.to_string().contains("bad model"), "{err:#}");
    }
}
