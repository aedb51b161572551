//! Vocal stem separation
//!
//! [`SeparationBackend`] abstracts the implementation; [`OrtBackend`] runs the
//! Demucs ONNX models through ONNX Runtime. Models are downloaded on first use
//! into the model directory.

mod backend;
mod error;
mod ort_backend;
mod variant;

pub use backend::{ProgressCallback, SeparationBackend, VocalStem};
pub use error::{Result, SeparationError};
pub use ort_backend::{OrtBackend, DEMUCS_SAMPLE_RATE, SEGMENT_OVERLAP};
pub use variant::SeparationVariant;
