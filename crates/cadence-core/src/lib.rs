//! Cadence Core - audio decoding and feature extraction shared by the analysis pipeline

pub mod audio_file;
pub mod config;
pub mod features;
pub mod spectral;
pub mod types;

pub use types::*;
