//! Mel filterbank and log-power helpers

use super::stft::Spectrogram;

/// Mel bands used for onset detection and MFCC
pub const N_MELS: usize = 128;

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters, `n_mels` rows of `n_fft / 2 + 1` weights
pub fn mel_filterbank(n_mels: usize, n_fft: usize, sample_rate: u32, f_max: f32) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(f_max.min(sample_rate as f32 / 2.0));

    let n_points = n_mels + 2;
    let bin_points: Vec<f32> = (0..n_points)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32)
        .map(|m| mel_to_hz(m) * n_fft as f32 / sample_rate as f32)
        .collect();

    (0..n_mels)
        .map(|band| {
            let left = bin_points[band];
            let center = bin_points[band + 1];
            let right = bin_points[band + 2];
            (0..n_bins)
                .map(|bin| {
                    let f = bin as f32;
                    if f >= left && f <= center && center > left {
                        (f - left) / (center - left)
                    } else if f > center && f <= right && right > center {
                        (right - f) / (right - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Mel power spectrogram, `frames[t][band]`
pub fn mel_power(spec: &Spectrogram, n_mels: usize) -> Vec<Vec<f32>> {
    let filters = mel_filterbank(n_mels, spec.n_fft, spec.sample_rate, spec.sample_rate as f32 / 2.0);
    spec.frames
        .iter()
        .map(|frame| {
            filters
                .iter()
                .map(|filter| {
                    filter
                        .iter()
                        .zip(frame)
                        .map(|(&w, &mag)| w * mag * mag)
                        .sum()
                })
                .collect()
        })
        .collect()
}

/// Convert power to decibels in place, floored `top_db` below the global peak
pub fn power_to_db(frames: &mut [Vec<f32>], top_db: f32) {
    let mut peak = f32::NEG_INFINITY;
    for frame in frames.iter_mut() {
        for value in frame.iter_mut() {
            *value = 10.0 * value.max(1e-10).log10();
            peak = peak.max(*value);
        }
    }
    let floor = peak - top_db;
    for frame in frames.iter_mut() {
        for value in frame.iter_mut() {
            *value = value.max(floor);
        }
    }
}
