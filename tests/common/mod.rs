#![allow(dead_code)]

use bookforge::audio::{AudioMuxer, WavMuxer};
use bookforge::config::{Preset, VoiceConfig};
use bookforge::pipeline::{self, ProcessRequest, RunReport};
use bookforge::project::ProjectLayout;
use bookforge::tts::TtsBackend;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const BOOK: &str = "Chapter 1

Alpha one. Alpha two. Alpha three. Alpha four. Alpha five.

Chapter 2

Beta one. Beta two.

Chapter 3

Gamma one. Gamma two.
";

pub const CHAPTER_ONE: &[&str] = &[
    "Chapter 1",
    "Alpha one.",
    "Alpha two.",
    "Alpha three.",
    "Alpha four.",
    "Alpha five.",
];
pub const CHAPTER_TWO: &[&str] = &["Chapter 2", "Beta one.", "Beta two."];
pub const CHAPTER_THREE: &[&str] = &["Chapter 3", "Gamma one.", "Gamma two."];

/// Encodes the spoken text as 16-bit samples so assembled audio can be read
/// back as text.
pub struct FakeTts {
    fail_marker: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTts {
    pub fn new() -> Self {
        Self {
            fail_marker: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl TtsBackend for FakeTts {
    fn name(&self) -> &str {
        "fake"
    }

    fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> anyhow::Result<Vec<u8>> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                anyhow::bail!("fake engine refuses {text:?}");
            }
        }
        Ok(wav_for(text))
    }
}

pub fn wav_for(text: &str) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for ch in text.chars() {
        writer.write_sample(ch as u32 as i16).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

pub fn read_text(path: &Path) -> String {
    hound::WavReader::open(path)
        .unwrap()
        .into_samples::<i16>()
        .map(|s| char::from_u32(s.unwrap() as u32).unwrap())
        .collect()
}

pub fn joined(parts: &[&[&str]]) -> String {
    parts.iter().flat_map(|p| p.iter()).copied().collect()
}

/// Records which files were written, then delegates to the real muxer.
#[derive(Default)]
pub struct RecordingMuxer {
    outputs: Mutex<Vec<PathBuf>>,
}

impl RecordingMuxer {
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().unwrap().clone()
    }
}

impl AudioMuxer for RecordingMuxer {
    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        self.outputs.lock().unwrap().push(output.to_path_buf());
        WavMuxer::new().concatenate(inputs, output)
    }
}

pub struct BrokenMuxer;

impl AudioMuxer for BrokenMuxer {
    fn concatenate(&self, _inputs: &[PathBuf], _output: &Path) -> anyhow::Result<()> {
        anyhow::bail!("concatenation tool missing")
    }
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub voice_model: PathBuf,
    pub output_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_text(BOOK)
    }

    pub fn with_text(text: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("novel.txt");
        fs::write(&input, text).unwrap();
        let voice_model = dir.path().join("voice.onnx");
        fs::write(&voice_model, b"model").unwrap();
        let output_dir = dir.path().join("project");
        Self {
            dir,
            input,
            voice_model,
            output_dir,
        }
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.output_dir)
    }

    pub fn request(&self, skip_first_chunks: usize) -> ProcessRequest {
        ProcessRequest {
            input: self.input.clone(),
            output_dir: self.output_dir.clone(),
            voice_model: self.voice_model.clone(),
            preset_name: "standard".to_string(),
            preset: Preset::default(),
            skip_first_chunks,
        }
    }

    pub fn process(&self, backend: &FakeTts, skip_first_chunks: usize) -> RunReport {
        pipeline::process(&self.request(skip_first_chunks), backend, &WavMuxer::new()).unwrap()
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(relative)
    }
}
