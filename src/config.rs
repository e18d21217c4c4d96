use crate::error::Error;
use anyhow::{bail, Context};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub presets_dir: Option<PathBuf>,
    #[serde(default = "default_preset_name")]
    pub default_preset: String,
    #[serde(default)]
    pub normalize: NormalizeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub piper_binary: Option<PathBuf>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Optional EBU R128 loudness normalisation of chapter and book files,
/// done with a two-pass ffmpeg `loudnorm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Falls back to `$BOOKFORGE_FFMPEG`, then `ffmpeg` on the PATH.
    #[serde(default)]
    pub ffmpeg_binary: Option<PathBuf>,
    #[serde(default = "default_target_lufs")]
    pub target_lufs: f32,
    #[serde(default = "default_loudness_range")]
    pub loudness_range: f32,
    #[serde(default = "default_normalize_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Voice and pacing settings applied to every chunk of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default = "default_sentence_silence")]
    pub sentence_silence: f32,
    #[serde(default)]
    pub speaker: Option<u32>,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
    #[serde(default)]
    pub min_chunk_chars: usize,
}

/// What a TTS backend needs to render one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub model_path: PathBuf,
    pub preset: Preset,
}

pub const BUILTIN_PRESETS: &[&str] = &["calm_longform", "standard"];

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(path) = Self::project_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        if let Ok(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parse config at {}", path.display()))?;
        Ok(config)
    }

    pub fn init_default() -> anyhow::Result<PathBuf> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config = Self::default();
        fs::write(&path, serde_json::to_string_pretty(&config)?)?;
        Ok(path)
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let base = BaseDirs::new().context("unable to resolve home directory")?;
        Ok(base.config_dir().join("bookforge").join("config.json"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(backend) = &self.tts.backend {
            match backend.as_str() {
                "piper" => {}
                _ => bail!("unsupported backend: {backend}"),
            }
        }

        if let Some(dir) = &self.presets_dir {
            if !dir.is_dir() {
                bail!("presets_dir not found: {}", dir.display());
            }
        }

        self.load_preset(&self.default_preset)
            .context("resolve default_preset")?;
        self.normalize.validate()?;

        Ok(())
    }

    pub fn backend_name(&self) -> &str {
        self.tts.backend.as_deref().unwrap_or("piper")
    }

    /// Resolves a preset by name: a `<name>.json` file in the configured
    /// presets directory wins over the built-in table.
    pub fn load_preset(&self, name: &str) -> crate::Result<Preset> {
        for dir in self.preset_dirs() {
            let path = dir.join(format!("{name}.json"));
            if path.is_file() {
                let preset = Preset::load_from_path(&path)?;
                preset.validate()?;
                return Ok(preset);
            }
        }

        match Preset::builtin(name) {
            Some(preset) => Ok(preset),
            None => Err(Error::Configuration(format!(
                "unknown preset '{name}' (built-in presets: {})",
                BUILTIN_PRESETS.join(", ")
            ))),
        }
    }

    fn preset_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(dir) = &self.presets_dir {
            dirs.push(dir.clone());
        }
        if let Some(base) = BaseDirs::new() {
            dirs.push(base.config_dir().join("bookforge").join("presets"));
        }
        dirs.push(PathBuf::from("presets"));
        dirs
    }

    fn project_path() -> Option<PathBuf> {
        Some(PathBuf::from("bookforge.json"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tts: TtsConfig::default(),
            presets_dir: None,
            default_preset: default_preset_name(),
            normalize: NormalizeConfig::default(),
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ffmpeg_binary: None,
            target_lufs: default_target_lufs(),
            loudness_range: default_loudness_range(),
            timeout_seconds: default_normalize_timeout_seconds(),
        }
    }
}

impl NormalizeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(-70.0..=-5.0).contains(&self.target_lufs) {
            bail!("normalize.target_lufs must be within [-70, -5], got {}", self.target_lufs);
        }
        if !(1.0..=50.0).contains(&self.loudness_range) {
            bail!(
                "normalize.loudness_range must be within [1, 50], got {}",
                self.loudness_range
            );
        }
        Ok(())
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: Some("piper".to_string()),
            piper_binary: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Preset {
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "calm_longform" => Some(Self {
                rate: 0.9,
                sentence_silence: 0.4,
                ..Self::default()
            }),
            "standard" => Some(Self::default()),
            _ => None,
        }
    }

    pub fn load_from_path(path: &Path) -> crate::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| Error::io(format!("read preset {}", path.display()), err))?;
        serde_json::from_str(&raw).map_err(|err| {
            Error::Configuration(format!("parse preset {}: {err}", path.display()))
        })
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !(self.rate > 0.0 && self.rate <= 4.0) {
            return Err(Error::Configuration(format!(
                "rate must be within (0, 4], got {}",
                self.rate
            )));
        }
        if self.sentence_silence < 0.0 {
            return Err(Error::Configuration(
                "sentence_silence must not be negative".to_string(),
            ));
        }
        if self.max_chunk_chars < 20 {
            return Err(Error::Configuration(format!(
                "max_chunk_chars must be at least 20, got {}",
                self.max_chunk_chars
            )));
        }
        if self.min_chunk_chars > self.max_chunk_chars {
            return Err(Error::Configuration(
                "min_chunk_chars must not exceed max_chunk_chars".to_string(),
            ));
        }
        Ok(())
    }

    /// Piper's length scale is the inverse of the speaking rate.
    pub fn length_scale(&self) -> f32 {
        1.0 / self.rate.max(0.1)
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            sentence_silence: default_sentence_silence(),
            speaker: None,
            max_chunk_chars: default_max_chunk_chars(),
            min_chunk_chars: 0,
        }
    }
}

impl VoiceConfig {
    /// Fails before any synthesis starts when the voice model is unusable.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.model_path.is_file() {
            return Err(Error::Configuration(format!(
                "voice model not found: {}",
                self.model_path.display()
            )));
        }
        self.preset.validate()
    }
}

fn default_preset_name() -> String {
    "calm_longform".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_target_lufs() -> f32 {
    -16.0
}

fn default_loudness_range() -> f32 {
    7.0
}

fn default_normalize_timeout_seconds() -> u64 {
    600
}

fn default_rate() -> f32 {
    1.0
}

fn default_sentence_silence() -> f32 {
    0.3
}

fn default_max_chunk_chars() -> usize {
    400
}
