use super::AudioMuxer;
use anyhow::{bail, Context};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Sample-exact WAV concatenation with hound. All inputs must share one
/// format; nothing is resampled and no silence is inserted.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavMuxer;

impl WavMuxer {
    pub fn new() -> Self {
        Self
    }
}

impl AudioMuxer for WavMuxer {
    fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> anyhow::Result<()> {
        let Some(first) = inputs.first() else {
            bail!("no input files to concatenate");
        };
        let spec = WavReader::open(first)
            .with_context(|| format!("open {}", first.display()))?
            .spec();

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let tmp = NamedTempFile::new_in(dir).context("create temp output")?;

        let mut writer = WavWriter::create(tmp.path(), spec)
            .with_context(|| format!("create {}", tmp.path().display()))?;
        for input in inputs {
            append(&mut writer, input, spec)?;
        }
        writer.finalize().context("finalize wav")?;

        tmp.persist(output)
            .with_context(|| format!("replace {}", output.display()))?;
        tracing::debug!(inputs = inputs.len(), output = %output.display(), "concatenated wav");
        Ok(())
    }
}

fn append<W>(writer: &mut WavWriter<W>, input: &Path, spec: WavSpec) -> anyhow::Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let reader = WavReader::open(input).with_context(|| format!("open {}", input.display()))?;
    if reader.spec() != spec {
        bail!(
            "{} has format {:?}, expected {:?}",
            input.display(),
            reader.spec(),
            spec
        );
    }

    match spec.sample_format {
        SampleFormat::Int => {
            for sample in reader.into_samples::<i32>() {
                let sample = sample.with_context(|| format!("read {}", input.display()))?;
                writer.write_sample(sample)?;
            }
        }
        SampleFormat::Float => {
            for sample in reader.into_samples::<f32>() {
                let sample = sample.with_context(|| format!("read {}", input.display()))?;
                writer.write_sample(sample)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(sample_rate: u32) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn write(path: &Path, samples: &[i16], sample_rate: u32) {
        let mut writer = WavWriter::create(path, spec(sample_rate)).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn read(path: &Path) -> Vec<i16> {
        WavReader::open(path)
            .unwrap()
            .into_samples::<i16>()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn concatenates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write(&a, &[1, 2, 3], 22050);
        write(&b, &[-4, 5], 22050);

        let out = dir.path().join("nested").join("out.wav");
        WavMuxer::new().concatenate(&[b.clone(), a.clone()], &out).unwrap();
        assert_eq!(read(&out), [-4, 5, 1, 2, 3]);
    }

    #[test]
    fn mismatched_formats_fail_and_keep_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write(&a, &[1], 22050);
        write(&b, &[2], 16000);

        let out = dir.path().join("out.wav");
        write(&out, &[9, 9], 22050);

        assert!(WavMuxer::new().concatenate(&[a, b], &out).is_err());
        assert_eq!(read(&out), [9, 9]);
    }

    #[test]
    fn missing_input_or_empty_list_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.wav");
        assert!(WavMuxer::new().concatenate(&[], &out).is_err());
        assert!(WavMuxer::new()
            .concatenate(&[dir.path().join("missing.wav")], &out)
            .is_err());
        assert!(!out.exists());
    }
}
