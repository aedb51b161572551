//! Lyrics transcription
//!
//! [`Transcriber`] fetches the speech model for a quality tier from the shared
//! [`ModelCache`] (loading it through a [`SpeechModelLoader`] on first use)
//! and transcribes a vocal stem reloaded at 16 kHz mono.

mod error;
mod tier;
mod whisper;
mod whisper_ffi;

pub use error::{Result, TranscriptionError};
pub use tier::QualityTier;
pub use whisper::{WhisperLoader, WhisperModel};

use std::path::Path;
use std::sync::Arc;

use cadence_core::audio_file::load_mono;

use crate::device::InferenceStrategy;
use crate::models::{ModelCache, StageKind};

/// Input rate expected by the speech models
pub const TRANSCRIPTION_SAMPLE_RATE: u32 = 16_000;

/// A loaded speech-to-text model
pub trait SpeechModel: Send + Sync {
    /// Transcribe mono samples at [`TRANSCRIPTION_SAMPLE_RATE`]
    fn transcribe(&self, samples: &[f32]) -> Result<String>;
}

/// Creates speech models; called once per tier per cache
pub trait SpeechModelLoader: Send + Sync {
    fn load(&self, tier: QualityTier, strategy: &InferenceStrategy) -> Result<Arc<dyn SpeechModel>>;
}

pub struct Transcriber {
    loader: Arc<dyn SpeechModelLoader>,
    cache: Arc<ModelCache>,
    strategy: InferenceStrategy,
}

impl Transcriber {
    pub fn new(loader: Arc<dyn SpeechModelLoader>, cache: Arc<ModelCache>, strategy: InferenceStrategy) -> Self {
        Self {
            loader,
            cache,
            strategy,
        }
    }

    /// Model for `tier`, loaded at most once per cache
    pub fn model(&self, tier: QualityTier) -> Result<Arc<dyn SpeechModel>> {
        self.cache
            .get_or_load(StageKind::Transcription, tier.name(), || {
                self.loader.load(tier, &self.strategy)
            })
    }

    /// Transcribe an audio file, returning trimmed text
    pub fn transcribe_file(&self, path: &Path, tier: QualityTier) -> Result<String> {
        let model = self.model(tier)?;
        let samples = load_mono(path, TRANSCRIPTION_SAMPLE_RATE)?;
        let text = model.transcribe(&samples)?;
        log::info!("transcribe_file: {} characters of lyrics", text.trim().len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::device::{ComputeDevice, Precision};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) struct EchoModel;

    impl SpeechModel for EchoModel {
        fn transcribe(&self, samples: &[f32]) -> Result<String> {
            Ok(format!("  heard {} samples  ", samples.len()))
        }
    }

    /// Counts loads; optionally fails every load
    #[derive(Default)]
    pub(crate) struct CountingLoader {
        pub loads: AtomicUsize,
        pub fail: bool,
        pub last_strategy: Mutex<Option<InferenceStrategy>>,
    }

    impl SpeechModelLoader for CountingLoader {
        fn load(&self, _tier: QualityTier, strategy: &InferenceStrategy) -> Result<Arc<dyn SpeechModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            *self.last_strategy.lock().unwrap() = Some(*strategy);
            if self.fail {
                return Err(TranscriptionError::LibraryUnavailable("test".into()));
            }
            Ok(Arc::new(EchoModel))
        }
    }

    fn write_tone(path: &Path, sample_rate: u32, secs: f32) {
        let samples: Vec<f32> = (0..(sample_rate as f32 * secs) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin() * 0.3)
            .collect();
        cadence_core::audio_file::write_wav(path, &samples, sample_rate, 1).unwrap();
    }

    #[test]
    fn test_one_load_per_tier() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        write_tone(&path, 16_000, 0.5);

        let loader = Arc::new(CountingLoader::default());
        let transcriber = Transcriber::new(loader.clone(), Arc::new(ModelCache::new()), InferenceStrategy::default());

        let first = transcriber.transcribe_file(&path, QualityTier::Base).unwrap();
        let second = transcriber.transcribe_file(&path, QualityTier::Base).unwrap();
        assert_eq!(first, "heard 8000 samples");
        assert_eq!(first, second);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

        transcriber.transcribe_file(&path, QualityTier::Small).unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stem_is_resampled_to_16k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        write_tone(&path, 44_100, 1.0);

        let transcriber = Transcriber::new(
            Arc::new(CountingLoader::default()),
            Arc::new(ModelCache::new()),
            InferenceStrategy::default(),
        );
        let text = transcriber.transcribe_file(&path, QualityTier::Tiny).unwrap();
        let count: i64 = text
            .trim_start_matches("heard ")
            .trim_end_matches(" samples")
            .parse()
            .unwrap();
        assert!((count - 16_000).abs() <= 16, "got {} samples", count);
    }

    #[test]
    fn test_strategy_reaches_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        write_tone(&path, 16_000, 0.1);

        let loader = Arc::new(CountingLoader::default());
        let strategy = ComputeDevice::Accelerator.strategy();
        let transcriber = Transcriber::new(loader.clone(), Arc::new(ModelCache::new()), strategy);
        transcriber.transcribe_file(&path, QualityTier::Base).unwrap();

        let seen = loader.last_strategy.lock().unwrap().unwrap();
        assert_eq!(seen, strategy);
        assert_eq!(seen.precision, Precision::Reduced);
    }

    #[test]
    fn test_load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        write_tone(&path, 16_000, 0.1);

        let loader = Arc::new(CountingLoader {
            fail: true,
            ..Default::default()
        });
        let transcriber = Transcriber::new(loader, Arc::new(ModelCache::new()), InferenceStrategy::default());
        assert!(matches!(
            transcriber.transcribe_file(&path, QualityTier::Base),
            Err(TranscriptionError::LibraryUnavailable(_))
        ));
    }
}
