//! Parallel analysis of many tracks
//!
//! Tracks are spread over a rayon pool. Each worker owns its own
//! [`TrackAnalyzer`] and therefore its own [`ModelCache`], so loaded models are
//! reused across that worker's tracks without any cross-worker locking.
//! Progress is reported over an `mpsc` channel and the cancel flag is checked
//! before each track starts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::analyzer::{AnalysisRequest, TrackAnalysis, TrackAnalyzer};
use crate::config::{BatchConfig, Config};
use crate::models::ModelCache;
use crate::progress::ProgressReporter;
use crate::vocals::VocalOptions;

/// Outcome for one track of a batch
#[derive(Debug, Clone, Serialize)]
pub struct TrackResult {
    pub path: PathBuf,
    pub success: bool,
    pub analysis: Option<TrackAnalysis>,
    /// Error message if failed
    pub error: Option<String>,
}

impl TrackResult {
    fn failed(path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            path,
            success: false,
            analysis: None,
            error: Some(error.into()),
        }
    }
}

/// Progress updates sent from the batch thread to the caller
#[derive(Debug, Clone)]
pub enum BatchProgress {
    Started {
        total: usize,
    },
    TrackStarted {
        path: PathBuf,
        index: usize,
        total: usize,
    },
    TrackCompleted(TrackResult),
    AllComplete {
        results: Vec<TrackResult>,
    },
}

/// Settings shared by every track of a batch
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub parallel_workers: u8,
    pub genre_override: Option<String>,
    pub vocals: VocalOptions,
}

impl BatchOptions {
    pub fn from_config(config: &Config, genre_override: Option<String>) -> Self {
        Self {
            parallel_workers: config.batch.parallel_workers,
            genre_override,
            vocals: config.vocals.options(),
        }
    }
}

/// Analyse `paths` with the production pipeline described by `config`
pub fn run_batch_analysis(
    paths: Vec<PathBuf>,
    config: &Config,
    genre_override: Option<String>,
    progress_tx: Sender<BatchProgress>,
    cancel_flag: Arc<AtomicBool>,
) -> Result<Vec<TrackResult>, rayon::ThreadPoolBuildError> {
    let options = BatchOptions::from_config(config, genre_override);
    run_batch_with(
        paths,
        &options,
        || TrackAnalyzer::from_config(config, Arc::new(ModelCache::new())),
        progress_tx,
        cancel_flag,
    )
}

/// Analyse `paths` with one analyzer per worker built by `make_analyzer`
///
/// Results are returned in input order.
pub fn run_batch_with<F>(
    paths: Vec<PathBuf>,
    options: &BatchOptions,
    make_analyzer: F,
    progress_tx: Sender<BatchProgress>,
    cancel_flag: Arc<AtomicBool>,
) -> Result<Vec<TrackResult>, rayon::ThreadPoolBuildError>
where
    F: Fn() -> TrackAnalyzer,
{
    let start_time = Instant::now();
    let total = paths.len();
    log::info!("run_batch_analysis: Starting analysis of {} tracks", total);
    let _ = progress_tx.send(BatchProgress::Started { total });

    if cancel_flag.load(Ordering::Relaxed) {
        log::info!("run_batch_analysis: Cancelled before processing");
        let _ = progress_tx.send(BatchProgress::AllComplete {
            results: Vec::new(),
        });
        return Ok(Vec::new());
    }

    let num_workers = options
        .parallel_workers
        .clamp(BatchConfig::MIN_WORKERS, BatchConfig::MAX_WORKERS) as usize;
    log::info!("run_batch_analysis: Using {} parallel workers", num_workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("cadence-batch-{}", i))
        .build()?;

    let analyzers: Vec<TrackAnalyzer> = (0..num_workers).map(|_| make_analyzer()).collect();

    let results: Vec<TrackResult> = pool.install(|| {
        paths
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                if cancel_flag.load(Ordering::Relaxed) {
                    return TrackResult::failed(path.clone(), "Cancelled");
                }

                let _ = progress_tx.send(BatchProgress::TrackStarted {
                    path: path.clone(),
                    index,
                    total,
                });

                let worker = rayon::current_thread_index().unwrap_or(0) % num_workers;
                let request = AnalysisRequest {
                    path: path.clone(),
                    genre_override: options.genre_override.clone(),
                    vocals: options.vocals,
                };
                let result = match analyzers[worker].analyze_track(&request, &ProgressReporter::silent()) {
                    Ok(analysis) => TrackResult {
                        path: path.clone(),
                        success: true,
                        analysis: Some(analysis),
                        error: None,
                    },
                    Err(e) => {
                        log::warn!("run_batch_analysis: {:?} failed: {}", path, e);
                        TrackResult::failed(path.clone(), e.to_string())
                    }
                };

                let _ = progress_tx.send(BatchProgress::TrackCompleted(result.clone()));
                result
            })
            .collect()
    });

    let success_count = results.iter().filter(|r| r.success).count();
    log::info!(
        "run_batch_analysis: Complete in {:.1}s - {} succeeded, {} failed",
        start_time.elapsed().as_secs_f64(),
        success_count,
        results.len() - success_count
    );

    let _ = progress_tx.send(BatchProgress::AllComplete {
        results: results.clone(),
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InferenceStrategy;
    use crate::rules::{RuleEngine, StaticRuleStore};
    use crate::separation::{ProgressCallback, SeparationBackend, SeparationVariant, VocalStem};
    use crate::transcription::tests::CountingLoader;
    use crate::transcription::Transcriber;
    use crate::vocals::VocalPipeline;
    use cadence_core::features::FeatureExtractor;
    use cadence_core::ANALYSIS_SAMPLE_RATE;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    struct NoStemSeparator;

    impl SeparationBackend for NoStemSeparator {
        fn separate_vocals(
            &self,
            _input_path: &Path,
            _variant: SeparationVariant,
            _progress: Option<ProgressCallback>,
        ) -> crate::separation::Result<Option<VocalStem>> {
            Ok(None)
        }

        fn supports_gpu(&self) -> bool {
            false
        }

        fn name(&self) -> &'static str {
            "no-stem"
        }
    }

    fn analyzer(scratch: &Path) -> TrackAnalyzer {
        let transcriber = Transcriber::new(
            Arc::new(CountingLoader::default()),
            Arc::new(ModelCache::new()),
            InferenceStrategy::default(),
        );
        TrackAnalyzer::new(
            FeatureExtractor::default(),
            RuleEngine::new(Arc::new(StaticRuleStore::bundled())),
            VocalPipeline::new(Arc::new(NoStemSeparator), transcriber, scratch),
        )
    }

    fn write_tone(path: &Path, freq: f32) {
        let sr = ANALYSIS_SAMPLE_RATE;
        let samples: Vec<f32> = (0..sr as usize * 2)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.3)
            .collect();
        cadence_core::audio_file::write_wav(path, &samples, sr, 1).unwrap();
    }

    #[test]
    fn test_batch_reports_every_track_in_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for (i, freq) in [220.0, 330.0, 440.0].into_iter().enumerate() {
            let path = dir.path().join(format!("track{}.wav", i));
            write_tone(&path, freq);
            paths.push(path);
        }
        paths.insert(1, dir.path().join("missing.wav"));

        let built = AtomicUsize::new(0);
        let options = BatchOptions {
            parallel_workers: 2,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();
        let results = run_batch_with(
            paths.clone(),
            &options,
            || {
                built.fetch_add(1, Ordering::SeqCst);
                analyzer(&dir.path().join("scratch"))
            },
            tx,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(results.len(), 4);
        let order: Vec<&PathBuf> = results.iter().map(|r| &r.path).collect();
        assert_eq!(order, paths.iter().collect::<Vec<_>>());
        assert!(!results[1].success);
        assert!(results[1].error.is_some());
        assert!(results.iter().enumerate().all(|(i, r)| r.success == (i != 1)));

        let events: Vec<BatchProgress> = rx.iter().collect();
        assert!(matches!(events.first(), Some(BatchProgress::Started { total: 4 })));
        assert!(matches!(events.last(), Some(BatchProgress::AllComplete { results }) if results.len() == 4));
        let completed = events
            .iter()
            .filter(|e| matches!(e, BatchProgress::TrackCompleted(_)))
            .count();
        assert_eq!(completed, 4);
    }

    #[test]
    fn test_cancelled_batch_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_tone(&path, 220.0);

        let (tx, rx) = mpsc::channel();
        let results = run_batch_with(
            vec![path],
            &BatchOptions::default(),
            || analyzer(dir.path()),
            tx,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();

        assert!(results.is_empty());
        let events: Vec<BatchProgress> = rx.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], BatchProgress::AllComplete { ref results } if results.is_empty()));
    }
}
