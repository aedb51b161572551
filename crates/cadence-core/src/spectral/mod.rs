//! Spectral building blocks shared by feature extraction and vocal analysis

pub mod chroma;
pub mod mel;
pub mod pitch;
pub mod stft;

pub use pitch::{mean_voiced_f0, PitchTracker};
pub use stft::{hann_window, Spectrogram, HOP_LENGTH, N_FFT};
