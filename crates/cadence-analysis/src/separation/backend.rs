//! Separation backend trait
//!
//! The vocal pipeline only ever asks a backend for the vocal source. A
//! backend returns `Ok(None)` when the model produced no usable vocals, which
//! is an expected outcome rather than an error.

use std::path::Path;

use super::error::{Result, SeparationError};
use super::variant::SeparationVariant;

/// Progress callback for separation (0.0 to 1.0)
pub type ProgressCallback = Box<dyn Fn(f32) + Send + Sync>;

/// Isolated vocal source, interleaved
#[derive(Debug, Clone)]
pub struct VocalStem {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl VocalStem {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    /// Write as 32-bit float WAV
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        cadence_core::audio_file::write_wav(path, &self.samples, self.sample_rate, self.channels)
            .map_err(|source| SeparationError::StemWrite {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// A stem separation implementation
pub trait SeparationBackend: Send + Sync {
    /// Isolate the vocal source of `input_path`
    fn separate_vocals(
        &self,
        input_path: &Path,
        variant: SeparationVariant,
        progress: Option<ProgressCallback>,
    ) -> Result<Option<VocalStem>>;

    fn supports_gpu(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_duration_and_peak() {
        let stem = VocalStem {
            samples: vec![0.0, 0.5, -0.75, 0.25].repeat(22050),
            sample_rate: 44100,
            channels: 2,
        };
        assert!((stem.duration_secs() - 1.0).abs() < 1e-9);
        assert_eq!(stem.peak(), 0.75);
    }

    #[test]
    fn test_stem_write_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        let stem = VocalStem {
            samples: vec![0.1; 8820],
            sample_rate: 44100,
            channels: 2,
        };
        stem.write_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44100);
        assert_eq!(reader.duration(), 4410);
    }
}
