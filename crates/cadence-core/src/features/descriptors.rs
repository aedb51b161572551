//! Frame-level spectral and temporal descriptors, averaged over the track

use crate::spectral::{Spectrogram, HOP_LENGTH, N_FFT};

/// Number of cepstral coefficients reported
pub const N_MFCC: usize = 13;

/// Fraction of spectral magnitude below the rolloff frequency
pub const ROLLOFF_PERCENT: f32 = 0.85;

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, c), v| (s + v as f64, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Centred frames of `N_FFT` samples every `HOP_LENGTH`, padded by `pad`
fn centred_frames<'a>(
    samples: &'a [f32],
    pad: impl Fn(&'a [f32], isize) -> f32 + 'a,
) -> impl Iterator<Item = Vec<f32>> + 'a {
    let half = (N_FFT / 2) as isize;
    let n_frames = if samples.is_empty() { 0 } else { 1 + samples.len() / HOP_LENGTH };
    (0..n_frames).map(move |t| {
        let start = (t * HOP_LENGTH) as isize - half;
        (0..N_FFT as isize).map(|i| pad(samples, start + i)).collect()
    })
}

fn zero_padded(samples: &[f32], idx: isize) -> f32 {
    if idx >= 0 && (idx as usize) < samples.len() {
        samples[idx as usize]
    } else {
        0.0
    }
}

fn edge_padded(samples: &[f32], idx: isize) -> f32 {
    let last = samples.len() as isize - 1;
    samples[idx.clamp(0, last) as usize]
}

/// Mean of frame RMS
pub fn mean_rms(samples: &[f32]) -> f32 {
    mean(centred_frames(samples, zero_padded).map(|frame| {
        (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
    }))
}

/// Mean over frames of the magnitude-weighted mean frequency
pub fn spectral_centroid(spec: &Spectrogram) -> f32 {
    let freqs: Vec<f32> = (0..spec.num_bins()).map(|k| spec.bin_frequency(k)).collect();
    mean(spec.frames.iter().map(|frame| {
        let total: f32 = frame.iter().sum();
        if total <= f32::EPSILON {
            0.0
        } else {
            frame.iter().zip(&freqs).map(|(m, f)| m * f).sum::<f32>() / total
        }
    }))
}

/// Mean over frames of the frequency below which `ROLLOFF_PERCENT` of the magnitude lies
pub fn spectral_rolloff(spec: &Spectrogram) -> f32 {
    mean(spec.frames.iter().map(|frame| {
        let total: f32 = frame.iter().sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        let threshold = ROLLOFF_PERCENT * total;
        let mut cumulative = 0.0f32;
        for (k, &mag) in frame.iter().enumerate() {
            cumulative += mag;
            if cumulative >= threshold {
                return spec.bin_frequency(k);
            }
        }
        spec.bin_frequency(frame.len().saturating_sub(1))
    }))
}

/// Mean fraction of sign changes per frame
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    mean(centred_frames(samples, edge_padded).map(|frame| {
        // Treat tiny values as zero so noise floors don't count as crossings
        let positive = |s: f32| if s.abs() <= 1e-10 { true } else { s >= 0.0 };
        let crossings = frame
            .windows(2)
            .filter(|w| positive(w[0]) != positive(w[1]))
            .count();
        crossings as f32 / frame.len() as f32
    }))
}

/// Time-averaged MFCC from a dB-scaled mel spectrogram (`frames[t][band]`)
pub fn mean_mfcc(mel_db: &[Vec<f32>]) -> [f32; N_MFCC] {
    let mut out = [0.0f32; N_MFCC];
    if mel_db.is_empty() {
        return out;
    }

    let n_mels = mel_db[0].len();
    let basis = dct_basis(N_MFCC, n_mels);

    for frame in mel_db {
        for (coeff, row) in out.iter_mut().zip(&basis) {
            *coeff += row.iter().zip(frame).map(|(b, v)| b * v).sum::<f32>();
        }
    }
    for coeff in out.iter_mut() {
        *coeff /= mel_db.len() as f32;
    }
    out
}

/// Orthonormal DCT-II rows
fn dct_basis(n_coeffs: usize, n_inputs: usize) -> Vec<Vec<f32>> {
    let n = n_inputs as f32;
    (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_inputs)
                .map(|i| {
                    scale
                        * (std::f32::consts::PI * k as f32 * (2.0 * i as f32 + 1.0) / (2.0 * n))
                            .cos()
                })
                .collect()
        })
        .collect()
}
