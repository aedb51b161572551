//! Separation model variants

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ModelFile;

/// Demucs model used to isolate vocals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SeparationVariant {
    /// 4 sources: drums, bass, other, vocals
    #[default]
    #[serde(rename = "htdemucs")]
    HtDemucs,
    /// 6 sources: adds guitar and piano
    #[serde(rename = "htdemucs_6s")]
    HtDemucs6s,
}

impl SeparationVariant {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::HtDemucs => "Demucs 4-stem (170MB)",
            Self::HtDemucs6s => "Demucs 6-stem (200MB)",
        }
    }

    /// Key used for the model file and cache entries
    pub fn name(self) -> &'static str {
        match self {
            Self::HtDemucs => "htdemucs",
            Self::HtDemucs6s => "htdemucs_6s",
        }
    }

    /// Must match the name used at ONNX export time
    pub fn filename(self) -> &'static str {
        match self {
            Self::HtDemucs => "htdemucs.onnx",
            Self::HtDemucs6s => "htdemucs_6s.onnx",
        }
    }

    pub fn download_url(self) -> &'static str {
        match self {
            Self::HtDemucs => "https://github.com/dataO1/Mesh/releases/download/models/htdemucs.onnx",
            Self::HtDemucs6s => {
                "https://github.com/dataO1/Mesh/releases/download/models/htdemucs_6s.onnx"
            }
        }
    }

    pub fn model_file(self) -> ModelFile {
        ModelFile::new(self.filename(), self.download_url())
    }

    /// Output source order of the model
    pub fn sources(self) -> &'static [&'static str] {
        match self {
            Self::HtDemucs => &["drums", "bass", "other", "vocals"],
            Self::HtDemucs6s => &["drums", "bass", "other", "vocals", "guitar", "piano"],
        }
    }

    pub fn vocal_index(self) -> Option<usize> {
        self.sources().iter().position(|s| *s == "vocals")
    }

    pub fn all() -> &'static [Self] {
        &[Self::HtDemucs, Self::HtDemucs6s]
    }
}

impl fmt::Display for SeparationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocal_index() {
        assert_eq!(SeparationVariant::HtDemucs.vocal_index(), Some(3));
        assert_eq!(SeparationVariant::HtDemucs6s.vocal_index(), Some(3));
    }

    #[test]
    fn test_config_names() {
        let parsed: SeparationVariant = serde_yaml::from_str("htdemucs_6s").unwrap();
        assert_eq!(parsed, SeparationVariant::HtDemucs6s);
        assert_eq!(SeparationVariant::default().model_file().filename, "htdemucs.onnx");
    }
}
