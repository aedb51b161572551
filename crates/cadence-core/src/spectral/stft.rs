//! Short-time Fourier transform

use realfft::RealFftPlanner;

/// Default FFT size for feature extraction
pub const N_FFT: usize = 2048;
/// Default hop between frames
pub const HOP_LENGTH: usize = 512;

/// Periodic Hann window (the DFT-even variant used for spectral analysis)
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Magnitude spectrogram over centred, zero-padded frames
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// `frames[t][k]` = |X(t, k)|, `n_fft / 2 + 1` bins per frame
    pub frames: Vec<Vec<f32>>,
    pub n_fft: usize,
    pub hop_length: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    /// STFT with the default 2048/512 grid
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        Self::with_params(samples, sample_rate, N_FFT, HOP_LENGTH)
    }

    pub fn with_params(samples: &[f32], sample_rate: u32, n_fft: usize, hop_length: usize) -> Self {
        let mut frames = Vec::new();
        if samples.is_empty() {
            return Self {
                frames,
                n_fft,
                hop_length,
                sample_rate,
            };
        }

        let pad = n_fft / 2;
        let n_frames = 1 + samples.len() / hop_length;
        frames.reserve(n_frames);

        let window = hann_window(n_fft);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();

        for t in 0..n_frames {
            // Frame t is centred on sample t * hop
            let centre = (t * hop_length) as isize;
            for (i, slot) in input.iter_mut().enumerate() {
                let idx = centre - pad as isize + i as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = sample * window[i];
            }

            if let Err(e) = fft.process(&mut input, &mut spectrum) {
                log::warn!("Spectrogram: FFT failed on frame {}: {}", t, e);
                frames.push(vec![0.0; n_fft / 2 + 1]);
                continue;
            }
            frames.push(spectrum.iter().map(|c| c.norm()).collect());
        }

        Self {
            frames,
            n_fft,
            hop_length,
            sample_rate,
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centre frequency of bin `k` in Hz
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Frames per second
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_length as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_and_peak_bin() {
        let sr = 22050;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();

        let spec = Spectrogram::compute(&samples, sr as u32);
        assert_eq!(spec.num_frames(), 1 + sr / HOP_LENGTH);
        assert_eq!(spec.frames[0].len(), spec.num_bins());

        let mid = &spec.frames[spec.num_frames() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert!((spec.bin_frequency(peak) - 1000.0).abs() < 11.0);
    }

    #[test]
    fn test_empty_input_has_no_frames() {
        let spec = Spectrogram::compute(&[], 22050);
        assert_eq!(spec.num_frames(), 0);
    }
}
