//! Cadence Analysis - genre, mood, instrument and vocal analysis of music tracks
//!
//! Builds on the features extracted by `cadence-core`:
//!
//! - `rules`: hot-reloadable YAML genre rules
//! - `heuristics`: mood, instrument and vocal-presence heuristics
//! - `separation` / `transcription` / `vocals`: vocal stem separation,
//!   lyrics transcription and vocal gender inference
//! - `models`: model downloads and the in-memory model cache
//! - `analyzer` / `batch`: single-track and parallel orchestration

pub mod analyzer;
pub mod batch;
pub mod config;
pub mod device;
pub mod heuristics;
pub mod models;
pub mod progress;
pub mod rules;
pub mod separation;
pub mod transcription;
pub mod vocals;

pub use analyzer::{AnalysisRequest, Classification, TrackAnalysis, TrackAnalyzer, TrackPreview};
pub use batch::{run_batch_analysis, run_batch_with, BatchOptions, BatchProgress, TrackResult};
pub use config::Config;
pub use device::{ComputeDevice, InferenceStrategy};
pub use models::ModelCache;
pub use progress::{AnalysisStage, ProgressEvent, ProgressReporter};
pub use vocals::{VocalAnalysisResult, VocalOptions, VocalPipeline};

pub use cadence_core::features::FeatureBundle;
