//! Transcription error types

use cadence_core::audio_file::AudioLoadError;
use thiserror::Error;

use crate::models::ModelStoreError;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Whisper library unavailable: {0}")]
    LibraryUnavailable(String),

    #[error("Whisper model unavailable: {0}")]
    Model(#[from] ModelStoreError),

    #[error("Failed to load whisper model: {0}")]
    ContextInit(String),

    #[error("Failed to read vocal stem: {0}")]
    Audio(#[from] AudioLoadError),

    #[error("Transcription failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, TranscriptionError>;
