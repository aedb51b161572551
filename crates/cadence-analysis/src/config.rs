//! Configuration for the analysis pipeline
//!
//! Stored as YAML. Default location: ~/.config/cadence/config.yaml

use std::path::{Path, PathBuf};

use anyhow::Result;
use cadence_core::config::{
    default_models_dir, default_rules_path, default_scratch_dir, load_config, save_config,
};
use cadence_core::features::TempoRange;
use serde::{Deserialize, Serialize};

use crate::separation::SeparationVariant;
use crate::transcription::QualityTier;
use crate::vocals::VocalOptions;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub rules: RulesConfig,
    pub vocals: VocalConfig,
    pub models: ModelsConfig,
    pub batch: BatchConfig,
}

/// Feature extraction settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Tempo candidate search range
    pub tempo: TempoRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Genre rule file, re-read on every classification
    pub path: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: default_rules_path(),
        }
    }
}

/// Vocal pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocalConfig {
    pub transcription_tier: QualityTier,
    pub separation_variant: SeparationVariant,
    /// Keep the separated vocal stem instead of deleting it
    pub keep_separated_stems: bool,
    /// Parent of the per-run scratch directories
    pub scratch_dir: PathBuf,
    /// Use a GPU execution provider when one is available
    pub use_gpu: bool,
    /// Explicit path to the whisper.cpp shared library
    pub whisper_library: Option<PathBuf>,
}

impl Default for VocalConfig {
    fn default() -> Self {
        Self {
            transcription_tier: QualityTier::default(),
            separation_variant: SeparationVariant::default(),
            keep_separated_stems: false,
            scratch_dir: default_scratch_dir(),
            use_gpu: true,
            whisper_library: None,
        }
    }
}

impl VocalConfig {
    /// Per-call options derived from these settings
    pub fn options(&self) -> VocalOptions {
        VocalOptions {
            transcription_tier: self.transcription_tier,
            separation_variant: self.separation_variant,
            keep_separated_stems: self.keep_separated_stems,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Where downloaded model files are kept
    pub cache_dir: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_models_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Tracks analysed in parallel, each worker holding its own models (1-16)
    pub parallel_workers: u8,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { parallel_workers: 2 }
    }
}

impl BatchConfig {
    pub const MIN_WORKERS: u8 = 1;
    pub const MAX_WORKERS: u8 = 16;

    pub fn validate(&mut self) {
        self.parallel_workers = self
            .parallel_workers
            .clamp(Self::MIN_WORKERS, Self::MAX_WORKERS);
    }
}

impl Config {
    /// Clamp every section to its supported range
    pub fn validate(&mut self) {
        self.analysis.tempo.validate();
        self.batch.validate();
    }

    /// Load and validate; a missing or invalid file gives the defaults
    pub fn load(path: &Path) -> Self {
        let mut config: Config = load_config(path);
        config.validate();
        log::info!(
            "Config::load: tempo {}-{} BPM, {} workers, tier {}",
            config.analysis.tempo.min_bpm,
            config.analysis.tempo.max_bpm,
            config.batch.parallel_workers,
            config.vocals.transcription_tier
        );
        config
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_config(self, path)
    }
}

/// `~/.config/cadence/config.yaml`
pub fn default_config_path() -> PathBuf {
    cadence_core::config::default_config_path("config.yaml")
}
