//! Fundamental frequency tracking (YIN)
//!
//! The difference function is computed through an FFT cross-correlation so a
//! full track stays cheap. Frames quieter than the silence gate or without a
//! dip below the aperiodicity threshold are reported as unvoiced.

use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

/// C2
pub const DEFAULT_FMIN: f32 = 65.41;
/// C7
pub const DEFAULT_FMAX: f32 = 2093.0;

/// Frame-wise pitch tracker
#[derive(Debug, Clone)]
pub struct PitchTracker {
    pub sample_rate: u32,
    pub fmin: f32,
    pub fmax: f32,
    pub frame_length: usize,
    pub hop_length: usize,
    /// Cumulative-mean-normalised difference threshold
    pub threshold: f32,
    /// Frames with RMS below this are unvoiced
    pub silence_rms: f32,
}

impl PitchTracker {
    /// Tracker over C2..C7 with a 2048-sample frame
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            fmin: DEFAULT_FMIN,
            fmax: DEFAULT_FMAX,
            frame_length: 2048,
            hop_length: 512,
            threshold: 0.1,
            silence_rms: 1e-3,
        }
    }

    pub fn with_range(mut self, fmin: f32, fmax: f32) -> Self {
        self.fmin = fmin;
        self.fmax = fmax;
        self
    }

    fn lag_range(&self) -> (usize, usize) {
        let min_lag = ((self.sample_rate as f32 / self.fmax).floor() as usize).max(2);
        let max_lag = (self.sample_rate as f32 / self.fmin).ceil() as usize;
        // Keep a usable integration window
        let max_lag = max_lag.min(self.frame_length / 2);
        (min_lag, max_lag)
    }

    /// F0 per frame, `None` for unvoiced frames
    pub fn track(&self, samples: &[f32]) -> Vec<Option<f32>> {
        let n = self.frame_length;
        if samples.len() < n {
            return Vec::new();
        }

        let (min_lag, max_lag) = self.lag_range();
        if min_lag + 1 >= max_lag {
            return Vec::new();
        }
        let window = n - max_lag;

        let fft_len = (2 * n).next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let mut head = forward.make_input_vec();
        let mut full = forward.make_input_vec();
        let mut head_spec = forward.make_output_vec();
        let mut full_spec = forward.make_output_vec();
        let mut corr = inverse.make_output_vec();
        let mut diff = vec![0.0f32; max_lag + 1];
        let mut cmndf = vec![1.0f32; max_lag + 1];

        let n_frames = 1 + (samples.len() - n) / self.hop_length;
        let mut pitches = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let frame = &samples[t * self.hop_length..t * self.hop_length + n];

            let rms = (frame.iter().map(|s| s * s).sum::<f32>() / n as f32).sqrt();
            if rms < self.silence_rms {
                pitches.push(None);
                continue;
            }

            // r(tau) = sum_{j < window} x[j] * x[j + tau]
            head.iter_mut().for_each(|v| *v = 0.0);
            full.iter_mut().for_each(|v| *v = 0.0);
            head[..window].copy_from_slice(&frame[..window]);
            full[..n].copy_from_slice(frame);

            if forward.process(&mut head, &mut head_spec).is_err()
                || forward.process(&mut full, &mut full_spec).is_err()
            {
                pitches.push(None);
                continue;
            }
            let mut product: Vec<Complex<f32>> = head_spec
                .iter()
                .zip(&full_spec)
                .map(|(a, b)| a.conj() * b)
                .collect();
            // The inverse transform requires purely real DC and Nyquist bins
            product[0].im = 0.0;
            if let Some(last) = product.last_mut() {
                last.im = 0.0;
            }
            if inverse.process(&mut product, &mut corr).is_err() {
                pitches.push(None);
                continue;
            }
            let scale = 1.0 / fft_len as f32;

            // Energy of x[tau..tau + window] via prefix sums
            let mut prefix = Vec::with_capacity(n + 1);
            prefix.push(0.0f32);
            for &s in frame {
                let last = *prefix.last().unwrap_or(&0.0);
                prefix.push(last + s * s);
            }
            let energy = |start: usize| prefix[start + window] - prefix[start];
            let e0 = energy(0);

            diff[0] = 0.0;
            for tau in 1..=max_lag {
                diff[tau] = (e0 + energy(tau) - 2.0 * corr[tau] * scale).max(0.0);
            }

            cmndf[0] = 1.0;
            let mut running = 0.0f32;
            for tau in 1..=max_lag {
                running += diff[tau];
                cmndf[tau] = if running > 0.0 {
                    diff[tau] * tau as f32 / running
                } else {
                    1.0
                };
            }

            pitches.push(self.pick_period(&cmndf, min_lag, max_lag));
        }

        pitches
    }

    fn pick_period(&self, cmndf: &[f32], min_lag: usize, max_lag: usize) -> Option<f32> {
        let mut tau = min_lag;
        while tau < max_lag {
            if cmndf[tau] < self.threshold {
                while tau + 1 < max_lag && cmndf[tau + 1] < cmndf[tau] {
                    tau += 1;
                }
                let refined = parabolic_offset(cmndf, tau) + tau as f32;
                let f0 = self.sample_rate as f32 / refined;
                return (f0 >= self.fmin && f0 <= self.fmax).then_some(f0);
            }
            tau += 1;
        }
        None
    }
}

/// Sub-sample offset of a local minimum at `tau`
fn parabolic_offset(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return 0.0;
    }
    let (a, b, c) = (values[tau - 1], values[tau], values[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f32::EPSILON {
        0.0
    } else {
        (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
    }
}

/// Mean F0 over voiced frames, `None` when nothing was voiced
pub fn mean_voiced_f0(pitches: &[Option<f32>]) -> Option<f32> {
    let voiced: Vec<f32> = pitches.iter().flatten().copied().collect();
    if voiced.is_empty() {
        None
    } else {
        Some(voiced.iter().sum::<f32>() / voiced.len() as f32)
    }
}
