//! Pitch-class profiles
//!
//! Two flavours: a cheap STFT chroma reported as a descriptor, and a
//! log-frequency chroma (one band per equal-tempered semitone, constant-Q
//! style) used for key estimation, where low notes need finer resolution
//! than the 2048-point STFT gives.

use super::stft::Spectrogram;
use crate::types::NUM_PITCH_CLASSES;

/// Lowest MIDI note of the log-frequency chroma (C1)
const LOG_CHROMA_MIN_NOTE: u8 = 24;
/// Highest MIDI note of the log-frequency chroma (B7)
const LOG_CHROMA_MAX_NOTE: u8 = 107;
/// FFT size for the log-frequency chroma (about 2.7 Hz per bin at 22050)
const LOG_CHROMA_N_FFT: usize = 8192;
const LOG_CHROMA_HOP: usize = 2048;

pub fn midi_to_hz(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

/// Pitch class (0 = C) nearest to a frequency
fn pitch_class_of(hz: f32) -> usize {
    let note = (12.0 * (hz / 440.0).log2() + 69.0).round() as i64;
    note.rem_euclid(NUM_PITCH_CLASSES as i64) as usize
}

fn normalize_max(profile: &mut [f32; NUM_PITCH_CLASSES]) {
    let peak = profile.iter().fold(0.0f32, |m, &v| m.max(v));
    if peak > f32::EPSILON {
        for v in profile.iter_mut() {
            *v /= peak;
        }
    }
}

/// Per-frame STFT chroma (power folded onto pitch classes, max-normalised)
pub fn stft_chroma(spec: &Spectrogram) -> Vec<[f32; NUM_PITCH_CLASSES]> {
    let min_hz = midi_to_hz(LOG_CHROMA_MIN_NOTE as f32 - 0.5);
    let bin_classes: Vec<Option<usize>> = (0..spec.num_bins())
        .map(|k| {
            let hz = spec.bin_frequency(k);
            (hz >= min_hz).then(|| pitch_class_of(hz))
        })
        .collect();

    spec.frames
        .iter()
        .map(|frame| {
            let mut profile = [0.0f32; NUM_PITCH_CLASSES];
            for (mag, class) in frame.iter().zip(&bin_classes) {
                if let Some(pc) = class {
                    profile[*pc] += mag * mag;
                }
            }
            normalize_max(&mut profile);
            profile
        })
        .collect()
}

/// Time-averaged STFT chroma
pub fn mean_chroma(frames: &[[f32; NUM_PITCH_CLASSES]]) -> [f32; NUM_PITCH_CLASSES] {
    let mut mean = [0.0f32; NUM_PITCH_CLASSES];
    if frames.is_empty() {
        return mean;
    }
    for frame in frames {
        for (m, v) in mean.iter_mut().zip(frame) {
            *m += v;
        }
    }
    for m in mean.iter_mut() {
        *m /= frames.len() as f32;
    }
    mean
}

/// Per-frame log-frequency chroma over C1..B7
pub fn log_frequency_chroma(samples: &[f32], sample_rate: u32) -> Vec<[f32; NUM_PITCH_CLASSES]> {
    let spec = Spectrogram::with_params(samples, sample_rate, LOG_CHROMA_N_FFT, LOG_CHROMA_HOP);
    let nyquist = sample_rate as f32 / 2.0;

    // Bin ranges of each semitone band, nearest bin when the band is narrower than a bin.
    // Summing whole bands keeps a sinusoid's response roughly independent of its octave.
    let bands: Vec<(usize, std::ops::Range<usize>)> = (LOG_CHROMA_MIN_NOTE..=LOG_CHROMA_MAX_NOTE)
        .filter_map(|note| {
            let centre = midi_to_hz(note as f32);
            let hi_hz = midi_to_hz(note as f32 + 0.5);
            if hi_hz >= nyquist {
                return None;
            }
            let lo_hz = midi_to_hz(note as f32 - 0.5);
            let to_bin = |hz: f32| hz * LOG_CHROMA_N_FFT as f32 / sample_rate as f32;
            let lo = to_bin(lo_hz).ceil() as usize;
            let hi = to_bin(hi_hz).ceil() as usize;
            let range = if hi > lo {
                lo..hi
            } else {
                let nearest = to_bin(centre).round() as usize;
                nearest..nearest + 1
            };
            Some((note as usize % NUM_PITCH_CLASSES, range))
        })
        .collect();

    spec.frames
        .iter()
        .map(|frame| {
            let mut profile = [0.0f32; NUM_PITCH_CLASSES];
            for (pc, range) in &bands {
                profile[*pc] += frame[range.clone()].iter().sum::<f32>();
            }
            normalize_max(&mut profile);
            profile
        })
        .collect()
}
