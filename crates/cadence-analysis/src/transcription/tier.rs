//! Transcription quality tiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ModelFile;

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Whisper model size, trading accuracy for speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl QualityTier {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// ggml weights for this tier
    pub fn model_file(self) -> ModelFile {
        let stem = match self {
            Self::Large => "large-v3",
            other => other.name(),
        };
        let filename = format!("ggml-{}.bin", stem);
        let url = format!("{}/{}", MODEL_BASE_URL, filename);
        ModelFile::new(filename, url)
    }

    pub fn all() -> &'static [Self] {
        &[Self::Tiny, Self::Base, Self::Small, Self::Medium, Self::Large]
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
