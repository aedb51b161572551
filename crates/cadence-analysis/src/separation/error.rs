//! Separation error types

use std::path::PathBuf;

use cadence_core::audio_file::AudioLoadError;
use thiserror::Error;

use crate::models::ModelStoreError;

#[derive(Error, Debug)]
pub enum SeparationError {
    #[error("Separation model unavailable: {0}")]
    Model(#[from] ModelStoreError),

    #[error("Failed to read audio for separation: {0}")]
    Audio(#[from] AudioLoadError),

    #[error("Backend initialization failed: {0}")]
    BackendInitFailed(String),

    #[error("Separation failed: {0}")]
    SeparationFailed(String),

    #[error("Failed to write stem file: {path}")]
    StemWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SeparationError>;
