//! Analysis progress reporting
//!
//! A [`ProgressReporter`] forwards checkpoint events to a callback or an
//! `mpsc` channel. Percentages never go backwards: an event reporting less
//! than what was already reported is raised to the previous value.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::Serialize;

/// Checkpoints of a full track analysis, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    ExtractingFeatures,
    FeaturesReady,
    ClassifyingGenre,
    DetectingInstruments,
    SeparatingVocals,
    Transcribing,
    InferringGender,
    Complete,
}

impl AnalysisStage {
    pub fn percent(self) -> u8 {
        match self {
            Self::ExtractingFeatures => 5,
            Self::FeaturesReady => 25,
            Self::ClassifyingGenre => 30,
            Self::DetectingInstruments => 35,
            Self::SeparatingVocals => 40,
            Self::Transcribing => 60,
            Self::InferringGender => 80,
            Self::Complete => 100,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::ExtractingFeatures => "Extracting audio features",
            Self::FeaturesReady => "Audio features extracted",
            Self::ClassifyingGenre => "Classifying genre",
            Self::DetectingInstruments => "Detecting instruments",
            Self::SeparatingVocals => "Separating vocals",
            Self::Transcribing => "Transcribing lyrics",
            Self::InferringGender => "Detecting vocal gender",
            Self::Complete => "Analysis complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: AnalysisStage,
    /// 0..=100
    pub percent: u8,
    pub message: String,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Sink for progress events
pub struct ProgressReporter {
    sink: Option<ProgressCallback>,
    reached: AtomicU8,
}

impl ProgressReporter {
    /// Reporter that drops every event
    pub fn silent() -> Self {
        Self {
            sink: None,
            reached: AtomicU8::new(0),
        }
    }

    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        Self {
            sink: Some(Arc::new(callback)),
            reached: AtomicU8::new(0),
        }
    }

    /// Forward events over a channel; a closed receiver is ignored
    pub fn from_channel(tx: Sender<ProgressEvent>) -> Self {
        Self::new(move |event| {
            let _ = tx.send(event);
        })
    }

    /// Report a checkpoint with its default message
    pub fn stage(&self, stage: AnalysisStage) {
        self.emit(stage, stage.percent(), stage.message());
    }

    pub fn emit(&self, stage: AnalysisStage, percent: u8, message: impl Into<String>) {
        let percent = percent.min(100);
        let previous = self.reached.fetch_max(percent, Ordering::SeqCst);
        let percent = percent.max(previous);

        let message = message.into();
        log::debug!("progress: {}% {}", percent, message);

        if let Some(sink) = &self.sink {
            sink(ProgressEvent {
                stage,
                percent,
                message,
            });
        }
    }

    /// Highest percentage reported so far
    pub fn reached(&self) -> u8 {
        self.reached.load(Ordering::SeqCst)
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::silent()
    }
}
