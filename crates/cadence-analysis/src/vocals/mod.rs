//! Vocal analysis: separation, transcription and gender inference
//!
//! The pipeline runs only when the vocal gate passes. Each run works in its
//! own scratch directory, which is removed on every exit path unless the
//! caller asked to keep the separated stem. Failures and panics inside the
//! pipeline never reach the caller: they are logged and the result is empty.

mod gender;
mod scratch;

pub use gender::{classify_f0, infer_gender, infer_gender_from_samples, VocalGender, FEMALE_F0_THRESHOLD_HZ};
pub use scratch::ScratchDir;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cadence_core::features::FeatureBundle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heuristics::detect_vocals;
use crate::progress::{AnalysisStage, ProgressReporter};
use crate::separation::{SeparationBackend, SeparationError, SeparationVariant};
use crate::transcription::{QualityTier, Transcriber};

const STEM_FILE_NAME: &str = "vocals.wav";

/// Per-call vocal analysis options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocalOptions {
    pub transcription_tier: QualityTier,
    pub separation_variant: SeparationVariant,
    pub keep_separated_stems: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocalAnalysisResult {
    pub lyrics: Option<String>,
    pub gender: Option<VocalGender>,
    /// Set only when the caller kept the separated stem
    pub stem_path: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum VocalPipelineError {
    #[error("Separation produced no vocal stem")]
    SeparationUnavailable,

    #[error(transparent)]
    Separation(#[from] SeparationError),

    #[error("Failed to create scratch directory")]
    Scratch(#[source] std::io::Error),
}

pub struct VocalPipeline {
    separator: Arc<dyn SeparationBackend>,
    transcriber: Transcriber,
    scratch_root: PathBuf,
}

impl VocalPipeline {
    pub fn new(
        separator: Arc<dyn SeparationBackend>,
        transcriber: Transcriber,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            separator,
            transcriber,
            scratch_root: scratch_root.into(),
        }
    }

    /// Lyrics and vocal gender of `audio_path`
    ///
    /// Returns an empty result without touching the separator when the gate
    /// fails for `features`.
    pub fn extract(
        &self,
        audio_path: &Path,
        features: &FeatureBundle,
        options: &VocalOptions,
        progress: &ProgressReporter,
    ) -> VocalAnalysisResult {
        if !detect_vocals(features.spectral_centroid) {
            log::info!(
                "extract: No vocals expected (centroid {:.0}Hz), skipping",
                features.spectral_centroid
            );
            return VocalAnalysisResult::default();
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run(audio_path, options, progress)));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(VocalPipelineError::SeparationUnavailable)) => {
                log::info!("extract: {:?} has no separable vocals", audio_path);
                VocalAnalysisResult::default()
            }
            Ok(Err(e)) => {
                log::warn!("extract: Vocal analysis of {:?} failed: {}", audio_path, e);
                VocalAnalysisResult::default()
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("extract: Vocal analysis of {:?} panicked: {}", audio_path, reason);
                VocalAnalysisResult::default()
            }
        }
    }

    fn run(
        &self,
        audio_path: &Path,
        options: &VocalOptions,
        progress: &ProgressReporter,
    ) -> Result<VocalAnalysisResult, VocalPipelineError> {
        let scratch = ScratchDir::create(&self.scratch_root).map_err(VocalPipelineError::Scratch)?;

        progress.stage(AnalysisStage::SeparatingVocals);
        log::info!(
            "run: Separating vocals with {} ({})",
            self.separator.name(),
            options.separation_variant
        );
        let stem = self
            .separator
            .separate_vocals(audio_path, options.separation_variant, None)?
            .ok_or(VocalPipelineError::SeparationUnavailable)?;

        let stem_path = scratch.path().join(STEM_FILE_NAME);
        stem.write_wav(&stem_path)?;
        drop(stem);

        progress.stage(AnalysisStage::Transcribing);
        let lyrics = match self
            .transcriber
            .transcribe_file(&stem_path, options.transcription_tier)
        {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("run: Transcription failed: {}", e);
                None
            }
        };

        progress.stage(AnalysisStage::InferringGender);
        let gender = match infer_gender(&stem_path) {
            Ok(gender) => gender,
            Err(e) => {
                log::warn!("run: Gender inference failed: {}", e);
                None
            }
        };

        let stem_path = if options.keep_separated_stems {
            let kept = scratch.retain().join(STEM_FILE_NAME);
            log::info!("run: Keeping separated vocals at {:?}", kept);
            Some(kept)
        } else {
            None
        };

        Ok(VocalAnalysisResult {
            lyrics,
            gender,
            stem_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelCache;
    use crate::device::InferenceStrategy;
    use crate::separation::{ProgressCallback, VocalStem};
    use crate::transcription::tests::CountingLoader;
    use cadence_core::audio_file::TrackMetadata;
    use cadence_core::{EnergyBand, PitchClass};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Tone(f32),
        NoVocals,
        Fail,
        Panic,
    }

    struct MockSeparator {
        calls: AtomicUsize,
        behavior: Behavior,
    }

    impl MockSeparator {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                behavior,
            })
        }
    }

    impl SeparationBackend for MockSeparator {
        fn separate_vocals(
            &self,
            _input_path: &Path,
            _variant: SeparationVariant,
            _progress: Option<ProgressCallback>,
        ) -> crate::separation::Result<Option<VocalStem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Tone(freq) => {
                    let sr = 22_050u32;
                    let samples = (0..sr as usize)
                        .flat_map(|i| {
                            let s = (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.5;
                            [s, s]
                        })
                        .collect();
                    Ok(Some(VocalStem {
                        samples,
                        sample_rate: sr,
                        channels: 2,
                    }))
                }
                Behavior::NoVocals => Ok(None),
                Behavior::Fail => Err(SeparationError::SeparationFailed("mock".into())),
                Behavior::Panic => panic!("separator exploded"),
            }
        }

        fn supports_gpu(&self) -> bool {
            false
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn features(centroid: f32) -> FeatureBundle {
        FeatureBundle {
            tempo: 120.0,
            key: PitchClass::A,
            energy: EnergyBand::Medium,
            energy_value: 0.03,
            spectral_centroid: centroid,
            zero_crossing_rate: 0.05,
            mfcc: [0.0; 13],
            chroma: [0.0; 12],
            spectral_rolloff: 3000.0,
            metadata: TrackMetadata::default(),
        }
    }

    struct Fixture {
        scratch_root: tempfile::TempDir,
        separator: Arc<MockSeparator>,
        loader: Arc<CountingLoader>,
        pipeline: VocalPipeline,
    }

    fn fixture(behavior: Behavior, fail_transcription: bool) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let scratch_root = tempfile::tempdir().unwrap();
        let separator = MockSeparator::new(behavior);
        let loader = Arc::new(CountingLoader {
            fail: fail_transcription,
            ..Default::default()
        });
        let transcriber = Transcriber::new(loader.clone(), Arc::new(ModelCache::new()), InferenceStrategy::default());
        let pipeline = VocalPipeline::new(separator.clone(), transcriber, scratch_root.path());
        Fixture {
            scratch_root,
            separator,
            loader,
            pipeline,
        }
    }

    fn scratch_entries(fixture: &Fixture) -> usize {
        std::fs::read_dir(fixture.scratch_root.path()).unwrap().count()
    }

    #[test]
    fn test_gate_failure_skips_every_stage() {
        let f = fixture(Behavior::Tone(200.0), false);
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(800.0),
            &VocalOptions::default(),
            &ProgressReporter::silent(),
        );
        assert_eq!(result, VocalAnalysisResult::default());
        assert_eq!(f.separator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.loader.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_successful_run_cleans_up() {
        let f = fixture(Behavior::Tone(220.0), false);
        let progress = ProgressReporter::silent();
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(2500.0),
            &VocalOptions::default(),
            &progress,
        );

        assert_eq!(result.gender, Some(VocalGender::Female));
        assert!(result.lyrics.as_deref().is_some_and(|l| l.starts_with("heard")));
        assert_eq!(result.stem_path, None);
        assert_eq!(progress.reached(), AnalysisStage::InferringGender.percent());
        assert_eq!(scratch_entries(&f), 0);
    }

    #[test]
    fn test_kept_stem_is_returned() {
        let f = fixture(Behavior::Tone(120.0), false);
        let options = VocalOptions {
            keep_separated_stems: true,
            ..Default::default()
        };
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(2500.0),
            &options,
            &ProgressReporter::silent(),
        );

        assert_eq!(result.gender, Some(VocalGender::Male));
        let stem_path = result.stem_path.unwrap();
        assert!(stem_path.is_file());
        assert!(stem_path.starts_with(f.scratch_root.path()));
    }

    #[test]
    fn test_no_vocal_stem_gives_empty_result() {
        let f = fixture(Behavior::NoVocals, false);
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(2500.0),
            &VocalOptions::default(),
            &ProgressReporter::silent(),
        );
        assert_eq!(result, VocalAnalysisResult::default());
        assert_eq!(f.separator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.loader.loads.load(Ordering::SeqCst), 0);
        assert_eq!(scratch_entries(&f), 0);
    }

    #[test]
    fn test_separation_error_is_downgraded() {
        let f = fixture(Behavior::Fail, false);
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(2500.0),
            &VocalOptions::default(),
            &ProgressReporter::silent(),
        );
        assert_eq!(result, VocalAnalysisResult::default());
        assert_eq!(scratch_entries(&f), 0);
    }

    #[test]
    fn test_panic_is_contained_and_cleaned_up() {
        let f = fixture(Behavior::Panic, false);
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(2500.0),
            &VocalOptions::default(),
            &ProgressReporter::silent(),
        );
        assert_eq!(result, VocalAnalysisResult::default());
        assert_eq!(scratch_entries(&f), 0);
    }

    #[test]
    fn test_transcription_failure_still_infers_gender() {
        let f = fixture(Behavior::Tone(200.0), true);
        let result = f.pipeline.extract(
            Path::new("track.wav"),
            &features(2500.0),
            &VocalOptions::default(),
            &ProgressReporter::silent(),
        );
        assert_eq!(result.lyrics, None);
        assert_eq!(result.gender, Some(VocalGender::Female));
        assert_eq!(scratch_entries(&f), 0);
    }
}
