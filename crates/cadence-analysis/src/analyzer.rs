//! Track analysis orchestration
//!
//! [`TrackAnalyzer`] runs feature extraction, genre rules, the heuristic
//! classifiers and the vocal pipeline in order and assembles a
//! [`TrackAnalysis`]. Only feature extraction can fail the whole run; every
//! later stage degrades to a default instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use cadence_core::audio_file::{load_mono, read_metadata, AudioLoadError, TrackMetadata};
use cadence_core::features::{FeatureBundle, FeatureExtractor};
use cadence_core::{EnergyBand, PitchClass, ANALYSIS_SAMPLE_RATE};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::device::ComputeDevice;
use crate::heuristics::{classify_mood, detect_instruments, detect_vocals, Instrument, InstrumentCues, Mood};
use crate::models::{ModelCache, ModelStore};
use crate::progress::{AnalysisStage, ProgressReporter};
use crate::rules::{GenreDecision, GenreFamily, RuleEngine, RuleInputs, YamlRuleStore};
use crate::separation::OrtBackend;
use crate::transcription::{Transcriber, WhisperLoader};
use crate::vocals::{VocalAnalysisResult, VocalGender, VocalOptions, VocalPipeline};

/// Audio analysed by [`TrackAnalyzer::preview`]
pub const PREVIEW_SECS: f32 = 30.0;

/// Genre and heuristic labels for one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub genre: String,
    pub genre_family: GenreFamily,
    pub mood: Mood,
    pub instruments: Vec<Instrument>,
    pub has_vocals: bool,
}

/// Complete result of [`TrackAnalyzer::analyze_track`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    #[serde(flatten)]
    pub features: FeatureBundle,
    pub genre: String,
    pub genre_family: GenreFamily,
    pub mood: Mood,
    pub instruments: Vec<Instrument>,
    pub has_vocals: bool,
    pub lyrics: Option<String>,
    pub vocal_gender: Option<VocalGender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stem_path: Option<PathBuf>,
}

impl TrackAnalysis {
    fn assemble(features: FeatureBundle, classification: Classification, vocals: VocalAnalysisResult) -> Self {
        Self {
            features,
            genre: classification.genre,
            genre_family: classification.genre_family,
            mood: classification.mood,
            instruments: classification.instruments,
            has_vocals: classification.has_vocals,
            lyrics: vocals.lyrics,
            vocal_gender: vocals.gender,
            stem_path: vocals.stem_path,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub fn export_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let json = self.to_json().context("Failed to serialize analysis")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
        log::info!("export_json: Wrote {:?}", path);
        Ok(())
    }
}

/// Quick look at a file before a full analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPreview {
    pub metadata: TrackMetadata,
    pub tempo: f64,
    pub key: PitchClass,
    pub energy: EnergyBand,
}

/// One full analysis request
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub path: PathBuf,
    /// Explicit genre; `None` or "Auto-detect" evaluates the rules
    pub genre_override: Option<String>,
    pub vocals: VocalOptions,
}

impl AnalysisRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

pub struct TrackAnalyzer {
    extractor: FeatureExtractor,
    rules: RuleEngine,
    vocals: VocalPipeline,
}

impl TrackAnalyzer {
    pub fn new(extractor: FeatureExtractor, rules: RuleEngine, vocals: VocalPipeline) -> Self {
        Self {
            extractor,
            rules,
            vocals,
        }
    }

    /// Build the production pipeline described by `config`
    ///
    /// Separation sessions and speech models are loaded lazily into `cache`;
    /// nothing is downloaded here.
    pub fn from_config(config: &Config, cache: Arc<ModelCache>) -> Self {
        let device = ComputeDevice::detect(config.vocals.use_gpu);
        let strategy = device.strategy();
        let models = ModelStore::new(&config.models.cache_dir);

        log::info!(
            "TrackAnalyzer: {:?} device, rules from {:?}, models in {:?}",
            device,
            config.rules.path,
            config.models.cache_dir
        );

        let rules = RuleEngine::new(Arc::new(YamlRuleStore::new(&config.rules.path)));
        let separator = Arc::new(OrtBackend::new(models.clone(), strategy, Arc::clone(&cache)));
        let loader = Arc::new(WhisperLoader::new(models, config.vocals.whisper_library.clone()));
        let transcriber = Transcriber::new(loader, cache, strategy);
        let vocals = VocalPipeline::new(separator, transcriber, &config.vocals.scratch_dir);

        Self::new(FeatureExtractor::new(config.analysis.tempo), rules, vocals)
    }

    pub fn analyze(&self, path: &Path) -> Result<FeatureBundle, AudioLoadError> {
        self.extractor.extract(path)
    }

    /// Genre from the current rules, or the caller's choice
    pub fn classify_genre(&self, features: &FeatureBundle, genre_override: Option<&str>) -> GenreDecision {
        self.rules.classify(&RuleInputs::from(features), genre_override)
    }

    /// Genre, mood, instruments and vocal gate for already extracted features
    pub fn classify(&self, features: &FeatureBundle, genre_override: Option<&str>) -> Classification {
        let decision = self.classify_genre(features, genre_override);
        self.label(features, decision.genre, decision.family)
    }

    fn label(&self, features: &FeatureBundle, genre: String, genre_family: GenreFamily) -> Classification {
        Classification {
            mood: classify_mood(features.energy, features.tempo, features.key),
            instruments: detect_instruments(&InstrumentCues::from(features), genre_family),
            has_vocals: detect_vocals(features.spectral_centroid),
            genre,
            genre_family,
        }
    }

    pub fn extract_vocals(
        &self,
        path: &Path,
        features: &FeatureBundle,
        options: &VocalOptions,
        progress: &ProgressReporter,
    ) -> VocalAnalysisResult {
        self.vocals.extract(path, features, options, progress)
    }

    /// Run every stage on one file, reporting progress along the way
    pub fn analyze_track(
        &self,
        request: &AnalysisRequest,
        progress: &ProgressReporter,
    ) -> Result<TrackAnalysis, AudioLoadError> {
        progress.stage(AnalysisStage::ExtractingFeatures);
        let features = self.analyze(&request.path)?;
        progress.stage(AnalysisStage::FeaturesReady);

        progress.stage(AnalysisStage::ClassifyingGenre);
        let decision = self.classify_genre(&features, request.genre_override.as_deref());

        progress.stage(AnalysisStage::DetectingInstruments);
        let classification = self.label(&features, decision.genre, decision.family);

        let vocals = self.extract_vocals(&request.path, &features, &request.vocals, progress);

        let analysis = TrackAnalysis::assemble(features, classification, vocals);
        log::info!(
            "analyze_track: {:?} -> {} / {} / {} instruments / vocals={}",
            request.path,
            analysis.genre,
            analysis.mood,
            analysis.instruments.len(),
            analysis.has_vocals
        );
        progress.stage(AnalysisStage::Complete);
        Ok(analysis)
    }

    /// Metadata plus tempo, key and energy from the opening seconds
    pub fn preview(&self, path: &Path) -> Result<TrackPreview, AudioLoadError> {
        let mut samples = load_mono(path, ANALYSIS_SAMPLE_RATE)?;
        samples.truncate((PREVIEW_SECS * ANALYSIS_SAMPLE_RATE as f32) as usize);

        let features = self.extractor.extract_samples(&samples, read_metadata(path));
        Ok(TrackPreview {
            metadata: features.metadata,
            tempo: features.tempo,
            key: features.key,
            energy: features.energy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InferenceStrategy;
    use crate::rules::{GenreSource, StaticRuleStore, DEFAULT_GENRE};
    use crate::separation::{ProgressCallback, SeparationBackend, SeparationVariant, VocalStem};
    use crate::transcription::tests::CountingLoader;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    /// Returns the input file itself as the vocal stem
    #[derive(Default)]
    struct PassthroughSeparator {
        calls: AtomicUsize,
    }

    impl SeparationBackend for PassthroughSeparator {
        fn separate_vocals(
            &self,
            input_path: &Path,
            _variant: SeparationVariant,
            _progress: Option<ProgressCallback>,
        ) -> crate::separation::Result<Option<VocalStem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let samples = load_mono(input_path, ANALYSIS_SAMPLE_RATE)?;
            Ok(Some(VocalStem {
                samples,
                sample_rate: ANALYSIS_SAMPLE_RATE,
                channels: 1,
            }))
        }

        fn supports_gpu(&self) -> bool {
            false
        }

        fn name(&self) -> &'static str {
            "passthrough"
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        separator: Arc<PassthroughSeparator>,
        loader: Arc<CountingLoader>,
        analyzer: TrackAnalyzer,
    }

    fn fixture() -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let separator = Arc::new(PassthroughSeparator::default());
        let loader = Arc::new(CountingLoader::default());
        let transcriber = Transcriber::new(loader.clone(), Arc::new(ModelCache::new()), InferenceStrategy::default());
        let vocals = VocalPipeline::new(separator.clone(), transcriber, dir.path().join("scratch"));
        let analyzer = TrackAnalyzer::new(
            FeatureExtractor::default(),
            RuleEngine::new(Arc::new(StaticRuleStore::bundled())),
            vocals,
        );
        Fixture {
            dir,
            separator,
            loader,
            analyzer,
        }
    }

    fn write_tone(dir: &Path, name: &str, freq: f32, secs: f32) -> PathBuf {
        let sr = ANALYSIS_SAMPLE_RATE;
        let samples: Vec<f32> = (0..(sr as f32 * secs) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.3)
            .collect();
        let path = dir.join(name);
        cadence_core::audio_file::write_wav(&path, &samples, sr, 1).unwrap();
        path
    }

    #[test]
    fn test_missing_file_fails_analysis() {
        let f = fixture();
        let missing = f.dir.path().join("missing.wav");
        assert!(f.analyzer.analyze(&missing).is_err());
        assert!(f
            .analyzer
            .analyze_track(&AnalysisRequest::new(&missing), &ProgressReporter::silent())
            .is_err());
    }

    #[test]
    fn test_low_tone_skips_vocals() {
        let f = fixture();
        let path = write_tone(f.dir.path(), "low.wav", 220.0, 3.0);

        let (tx, rx) = mpsc::channel();
        let progress = ProgressReporter::from_channel(tx);
        let analysis = f
            .analyzer
            .analyze_track(&AnalysisRequest::new(&path), &progress)
            .unwrap();
        drop(progress);

        assert!(!analysis.has_vocals);
        assert_eq!(analysis.lyrics, None);
        assert_eq!(analysis.vocal_gender, None);
        assert_eq!(f.separator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.loader.loads.load(Ordering::SeqCst), 0);

        let stages: Vec<AnalysisStage> = rx.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                AnalysisStage::ExtractingFeatures,
                AnalysisStage::FeaturesReady,
                AnalysisStage::ClassifyingGenre,
                AnalysisStage::DetectingInstruments,
                AnalysisStage::Complete,
            ]
        );
    }

    #[test]
    fn test_vocal_range_tone_runs_pipeline() {
        let f = fixture();
        let path = write_tone(f.dir.path(), "bright.wav", 2500.0, 3.0);

        let (tx, rx) = mpsc::channel();
        let progress = ProgressReporter::from_channel(tx);
        let analysis = f
            .analyzer
            .analyze_track(&AnalysisRequest::new(&path), &progress)
            .unwrap();
        drop(progress);

        assert!(analysis.has_vocals);
        assert_eq!(f.separator.calls.load(Ordering::SeqCst), 1);
        assert!(analysis.lyrics.is_some());
        assert_eq!(analysis.stem_path, None);

        let percents: Vec<u8> = rx.iter().map(|e| e.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert!(percents.contains(&AnalysisStage::Transcribing.percent()));
        assert_eq!(percents.last(), Some(&100));
    }

    #[test]
    fn test_genre_override_skips_rules() {
        let f = fixture();
        let path = write_tone(f.dir.path(), "tone.wav", 220.0, 2.0);
        let features = f.analyzer.analyze(&path).unwrap();

        let decision = f.analyzer.classify_genre(&features, Some("House"));
        assert_eq!(decision.source, GenreSource::Override);

        let chosen = f.analyzer.classify(&features, Some("House"));
        assert_eq!(chosen.genre, "House");
        assert_eq!(chosen.genre_family, GenreFamily::Electronic);

        let invented = f.analyzer.classify(&features, Some("Sea Shanty"));
        assert_eq!(invented.genre, "Sea Shanty");
        assert_eq!(invented.genre_family, GenreFamily::Other);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let f = fixture();
        let path = write_tone(f.dir.path(), "tone.wav", 220.0, 2.0);
        let features = f.analyzer.analyze(&path).unwrap();

        let auto = f.analyzer.classify(&features, Some("Auto-detect"));
        assert_eq!(auto, f.analyzer.classify(&features, None));
        assert!(!auto.genre.is_empty());
        assert_eq!(auto.mood, classify_mood(features.energy, features.tempo, features.key));
    }

    #[test]
    fn test_preview_and_json_export() {
        let f = fixture();
        let path = write_tone(f.dir.path(), "tone.wav", 220.0, 2.0);

        let preview = f.analyzer.preview(&path).unwrap();
        assert_eq!(preview.metadata.sample_rate, Some(ANALYSIS_SAMPLE_RATE));

        let request = AnalysisRequest {
            path: path.clone(),
            genre_override: Some(DEFAULT_GENRE.to_string()),
            vocals: VocalOptions::default(),
        };
        let analysis = f
            .analyzer
            .analyze_track(&request, &ProgressReporter::silent())
            .unwrap();

        let out = f.dir.path().join("out").join("analysis.json");
        analysis.export_json(&out).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["genre"], DEFAULT_GENRE);
        assert!(json["tempo"].is_number());
        assert!(json["mfcc"].as_array().is_some_and(|m| m.len() == 13));
        assert!(json.get("stem_path").is_none());
    }
}
