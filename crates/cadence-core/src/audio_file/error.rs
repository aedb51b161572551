//! Audio loading error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that make a file unusable for waveform analysis
#[derive(Error, Debug)]
pub enum AudioLoadError {
    #[error("Failed to open audio file: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio track found in {0}")]
    NoAudioTrack(PathBuf),

    #[error("Audio stream decoded to zero samples: {0}")]
    Empty(PathBuf),

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Tag metadata could not be read; container fields are still usable
#[derive(Error, Debug)]
#[error("Could not read tags from {path}: {reason}")]
pub struct MetadataPartialError {
    pub path: PathBuf,
    pub reason: String,
}

/// Result type for audio loading
pub type Result<T> = std::result::Result<T, AudioLoadError>;
