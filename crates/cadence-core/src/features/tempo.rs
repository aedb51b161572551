//! Tempo estimation
//!
//! An onset-strength envelope is derived from the log-mel spectrogram and
//! handed to an ordered chain of [`TempoStrategy`] implementations. The first
//! strategy that reports a non-zero tempo wins:
//!
//! 1. [`BeatTracker`] - dynamic-programming beat tracker, tempo from the mean
//!    inter-beat interval
//! 2. [`AutocorrelationTempo`] - onset autocorrelation weighted by a
//!    log-normal prior around 120 BPM
//!
//! Octave correction is applied afterwards because it depends on the
//! spectral centroid and energy band, which are computed first.

use serde::{Deserialize, Serialize};

use crate::types::EnergyBand;

/// Below this tempo a bright, loud track is assumed to be detected at half speed
pub const OCTAVE_CORRECTION_MAX_BPM: f64 = 110.0;
/// Minimum spectral centroid (Hz) for octave correction
pub const OCTAVE_CORRECTION_MIN_CENTROID: f32 = 2200.0;

/// Search range for tempo candidates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoRange {
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for TempoRange {
    fn default() -> Self {
        Self {
            min_bpm: 30.0,
            max_bpm: 300.0,
        }
    }
}

impl TempoRange {
    /// Clamp to sane limits and keep min below max
    pub fn validate(&mut self) {
        self.min_bpm = self.min_bpm.clamp(20.0, 120.0);
        self.max_bpm = self.max_bpm.clamp(120.0, 400.0);
        if self.min_bpm >= self.max_bpm {
            self.max_bpm = (self.min_bpm + 20.0).min(400.0);
        }
    }
}

/// Onset strength per STFT frame
#[derive(Debug, Clone)]
pub struct OnsetEnvelope {
    pub values: Vec<f32>,
    /// Envelope frames per second
    pub frame_rate: f32,
}

impl OnsetEnvelope {
    /// Mean positive first difference across the bands of a dB mel spectrogram
    pub fn from_mel_db(mel_db: &[Vec<f32>], frame_rate: f32) -> Self {
        let mut values = Vec::with_capacity(mel_db.len());
        if !mel_db.is_empty() {
            values.push(0.0);
        }
        for pair in mel_db.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let flux: f32 = cur
                .iter()
                .zip(prev)
                .map(|(c, p)| (c - p).max(0.0))
                .sum::<f32>()
                / cur.len().max(1) as f32;
            values.push(flux);
        }
        Self { values, frame_rate }
    }

    pub fn is_silent(&self) -> bool {
        self.values.iter().all(|v| v.abs() <= f32::EPSILON)
    }
}

/// One way of turning an onset envelope into a BPM value; 0.0 means "no answer"
pub trait TempoStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn estimate(&self, onset: &OnsetEnvelope) -> f64;
}

fn lognormal_weight(bpm: f64, centre: f64, octaves: f64) -> f64 {
    let x = (bpm / centre).log2() / octaves;
    (-0.5 * x * x).exp()
}

fn gaussian_smooth(values: &[f32], sigma: f64) -> Vec<f64> {
    let radius = (3.0 * sigma).ceil() as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|j| (-0.5 * (j as f64 / sigma).powi(2)).exp())
        .collect();
    let norm: f64 = kernel.iter().sum();
    (0..values.len() as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let idx = i + k as isize - radius;
                    (idx >= 0 && (idx as usize) < values.len()).then(|| w * values[idx as usize] as f64)
                })
                .sum::<f64>()
                / norm
        })
        .collect()
}

/// Global onset autocorrelation with a log-normal tempo prior
#[derive(Debug, Clone)]
pub struct AutocorrelationTempo {
    pub range: TempoRange,
    /// Centre of the tempo prior in BPM
    pub prior_bpm: f64,
    /// Standard deviation of the prior in octaves
    pub prior_octaves: f64,
}

impl AutocorrelationTempo {
    pub fn new(range: TempoRange) -> Self {
        Self {
            range,
            prior_bpm: 120.0,
            prior_octaves: 1.0,
        }
    }
}

impl TempoStrategy for AutocorrelationTempo {
    fn name(&self) -> &'static str {
        "autocorrelation"
    }

    fn estimate(&self, onset: &OnsetEnvelope) -> f64 {
        if onset.is_silent() || onset.frame_rate <= 0.0 {
            return 0.0;
        }
        let fps = onset.frame_rate as f64;
        let n = onset.values.len();

        // Smoothing keeps fractional periods from splitting a peak across two lags
        let smoothed = gaussian_smooth(&onset.values, 1.0);
        let mean = smoothed.iter().sum::<f64>() / n as f64;
        let centred: Vec<f64> = smoothed.iter().map(|v| v - mean).collect();

        let min_lag = ((60.0 * fps / self.range.max_bpm).floor() as usize).max(1);
        let max_lag = ((60.0 * fps / self.range.min_bpm).ceil() as usize).min(n.saturating_sub(1));
        if min_lag + 1 >= max_lag {
            return 0.0;
        }

        let score_at = |lag: usize| -> f64 {
            let ac = centred[..n - lag]
                .iter()
                .zip(&centred[lag..])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / (n - lag) as f64;
            ac * lognormal_weight(60.0 * fps / lag as f64, self.prior_bpm, self.prior_octaves)
        };

        let scores: Vec<f64> = (min_lag..=max_lag).map(score_at).collect();
        let (best_idx, &best) = match scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        {
            Some(found) => found,
            None => return 0.0,
        };
        if best <= 0.0 {
            return 0.0;
        }

        let mut lag = (min_lag + best_idx) as f64;
        if best_idx > 0 && best_idx + 1 < scores.len() {
            let (a, b, c) = (scores[best_idx - 1], best, scores[best_idx + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > f64::EPSILON {
                lag += (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
            }
        }

        60.0 * fps / lag
    }
}

/// Dynamic-programming beat tracker seeded with the autocorrelation tempo
#[derive(Debug, Clone)]
pub struct BeatTracker {
    pub seed: AutocorrelationTempo,
    /// Penalty for deviating from the seed period
    pub tightness: f64,
}

impl BeatTracker {
    pub fn new(range: TempoRange) -> Self {
        Self {
            seed: AutocorrelationTempo::new(range),
            tightness: 100.0,
        }
    }

    /// Beat positions (envelope frame indices) for a given tempo
    pub fn track(&self, onset: &OnsetEnvelope, bpm: f64) -> Vec<usize> {
        let n = onset.values.len();
        let fps = onset.frame_rate as f64;
        if bpm <= 0.0 || n < 2 {
            return Vec::new();
        }
        let period = (60.0 * fps / bpm).round();
        if period < 1.0 || (n as f64) <= period {
            return Vec::new();
        }

        let mean = onset.values.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let var = onset
            .values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        let std = var.sqrt();
        if std <= f64::EPSILON {
            return Vec::new();
        }
        let norm: Vec<f64> = onset.values.iter().map(|&v| v as f64 / std).collect();

        // Local score: onsets smoothed by a Gaussian a fraction of a beat wide
        let p = period as isize;
        let window: Vec<f64> = (-p..=p)
            .map(|j| (-0.5 * (j as f64 * 32.0 / period).powi(2)).exp())
            .collect();
        let localscore: Vec<f64> = (0..n as isize)
            .map(|i| {
                window
                    .iter()
                    .enumerate()
                    .filter_map(|(k, w)| {
                        let idx = i + k as isize - p;
                        (idx >= 0 && (idx as usize) < n).then(|| w * norm[idx as usize])
                    })
                    .sum()
            })
            .collect();

        let mut cumscore = vec![0.0f64; n];
        let mut backlink: Vec<Option<usize>> = vec![None; n];
        let max_back = (2.0 * period).round() as usize;
        let min_back = ((period / 2.0).round() as usize).max(1);
        let score_floor = 0.01 * localscore.iter().cloned().fold(0.0, f64::max);
        let mut first_beat = true;

        for i in 0..n {
            let mut best: Option<(usize, f64)> = None;
            if i >= min_back {
                let lo = i.saturating_sub(max_back);
                for prev in lo..=i - min_back {
                    let interval = (i - prev) as f64 / period;
                    let score = cumscore[prev] - self.tightness * interval.ln().powi(2);
                    if best.map_or(true, |(_, s)| score > s) {
                        best = Some((prev, score));
                    }
                }
            }

            cumscore[i] = localscore[i] + best.map_or(0.0, |(_, s)| s);
            if first_beat && localscore[i] < score_floor {
                backlink[i] = None;
                cumscore[i] = localscore[i];
            } else {
                first_beat = false;
                backlink[i] = best.map(|(prev, _)| prev);
            }
        }

        // Last beat: the final local maximum of cumscore that is reasonably strong
        let maxima: Vec<usize> = (0..n)
            .filter(|&i| {
                let left = i == 0 || cumscore[i] > cumscore[i - 1];
                let right = i + 1 == n || cumscore[i] >= cumscore[i + 1];
                left && right
            })
            .collect();
        if maxima.is_empty() {
            return Vec::new();
        }
        let mut values: Vec<f64> = maxima.iter().map(|&i| cumscore[i]).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let median = values[values.len() / 2];
        let last = match maxima.iter().rev().find(|&&i| cumscore[i] >= 0.5 * median) {
            Some(&i) => i,
            None => return Vec::new(),
        };

        let mut beats = vec![last];
        let mut cursor = last;
        while let Some(prev) = backlink[cursor] {
            beats.push(prev);
            cursor = prev;
        }
        beats.reverse();

        // Drop weak beats at either end
        let rms = (beats.iter().map(|&b| localscore[b].powi(2)).sum::<f64>() / beats.len() as f64).sqrt();
        let threshold = 0.5 * rms;
        let start = beats.iter().position(|&b| localscore[b] >= threshold).unwrap_or(0);
        let end = beats
            .iter()
            .rposition(|&b| localscore[b] >= threshold)
            .map_or(beats.len(), |e| e + 1);
        beats[start..end.max(start)].to_vec()
    }
}

impl TempoStrategy for BeatTracker {
    fn name(&self) -> &'static str {
        "beat-tracker"
    }

    fn estimate(&self, onset: &OnsetEnvelope) -> f64 {
        let seed = self.seed.estimate(onset);
        let beats = self.track(onset, seed);
        if beats.len() < 2 {
            return 0.0;
        }
        let span = (beats[beats.len() - 1] - beats[0]) as f64;
        let mean_interval = span / (beats.len() - 1) as f64;
        if mean_interval <= 0.0 {
            return 0.0;
        }
        60.0 * onset.frame_rate as f64 / mean_interval
    }
}

/// Ordered fallback chain of tempo strategies
pub struct TempoEstimator {
    strategies: Vec<Box<dyn TempoStrategy>>,
}

impl TempoEstimator {
    /// Beat tracker first, autocorrelation as fallback
    pub fn new(range: TempoRange) -> Self {
        Self::with_strategies(vec![
            Box::new(BeatTracker::new(range)),
            Box::new(AutocorrelationTempo::new(range)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn TempoStrategy>>) -> Self {
        Self { strategies }
    }

    /// First non-zero strategy result, or 0.0
    pub fn raw_tempo(&self, onset: &OnsetEnvelope) -> f64 {
        for strategy in &self.strategies {
            let bpm = strategy.estimate(onset);
            if bpm.is_finite() && bpm > 0.0 {
                log::debug!("TempoEstimator: {} -> {:.2} BPM", strategy.name(), bpm);
                return bpm;
            }
            log::debug!("TempoEstimator: {} gave no tempo, falling back", strategy.name());
        }
        0.0
    }

    /// Raw tempo with octave correction, rounded to one decimal
    pub fn estimate(&self, onset: &OnsetEnvelope, centroid: f32, energy: EnergyBand) -> f64 {
        round_tempo(correct_octave(self.raw_tempo(onset), centroid, energy))
    }
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new(TempoRange::default())
    }
}

/// Double a slow reading once when the track is bright and loud
pub fn correct_octave(bpm: f64, centroid: f32, energy: EnergyBand) -> f64 {
    if bpm < OCTAVE_CORRECTION_MAX_BPM
        && centroid > OCTAVE_CORRECTION_MIN_CENTROID
        && energy == EnergyBand::High
    {
        bpm * 2.0
    } else {
        bpm
    }
}

pub fn round_tempo(bpm: f64) -> f64 {
    (bpm * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::mel::{mel_power, power_to_db, N_MELS};
    use crate::spectral::Spectrogram;

    struct Fixed(f64);

    impl TempoStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn estimate(&self, _onset: &OnsetEnvelope) -> f64 {
            self.0
        }
    }

    fn envelope_of(samples: &[f32], sr: u32) -> OnsetEnvelope {
        let spec = Spectrogram::compute(samples, sr);
        let mut mel = mel_power(&spec, N_MELS);
        power_to_db(&mut mel, 80.0);
        OnsetEnvelope::from_mel_db(&mel, spec.frame_rate())
    }

    fn click_track(bpm: f32, sr: u32, secs: f32) -> Vec<f32> {
        let mut samples = vec![0.0f32; (sr as f32 * secs) as usize];
        let interval = (60.0 / bpm * sr as f32) as usize;
        let click_len = (0.03 * sr as f32) as usize;
        let mut start = 0;
        while start < samples.len() {
            for i in 0..click_len.min(samples.len() - start) {
                let t = i as f32 / sr as f32;
                let decay = (-t * 150.0).exp();
                samples[start + i] = decay
                    * 0.8
                    * ((2.0 * std::f32::consts::PI * 1000.0 * t).sin()
                        + 0.5 * (2.0 * std::f32::consts::PI * 3100.0 * t).sin());
            }
            start += interval;
        }
        samples
    }

    #[test]
    fn test_octave_correction_doubles_once() {
        assert_eq!(round_tempo(correct_octave(95.0, 2500.0, EnergyBand::High)), 190.0);
        assert_eq!(round_tempo(correct_octave(190.0, 2500.0, EnergyBand::High)), 190.0);
    }

    #[test]
    fn test_octave_correction_needs_all_conditions() {
        assert_eq!(correct_octave(95.0, 2500.0, EnergyBand::Medium), 95.0);
        assert_eq!(correct_octave(95.0, 2200.0, EnergyBand::High), 95.0);
        assert_eq!(correct_octave(110.0, 2500.0, EnergyBand::High), 110.0);
    }

    #[test]
    fn test_rounding_to_one_decimal() {
        assert_eq!(round_tempo(123.456), 123.5);
        assert_eq!(round_tempo(0.0), 0.0);
    }

    #[test]
    fn test_fallback_used_when_primary_reports_zero() {
        let onset = OnsetEnvelope {
            values: vec![0.0; 10],
            frame_rate: 43.0,
        };
        let chain = TempoEstimator::with_strategies(vec![Box::new(Fixed(0.0)), Box::new(Fixed(128.0))]);
        assert_eq!(chain.raw_tempo(&onset), 128.0);

        let first_wins =
            TempoEstimator::with_strategies(vec![Box::new(Fixed(100.0)), Box::new(Fixed(128.0))]);
        assert_eq!(first_wins.raw_tempo(&onset), 100.0);

        let nothing = TempoEstimator::with_strategies(vec![Box::new(Fixed(0.0)), Box::new(Fixed(0.0))]);
        assert_eq!(nothing.estimate(&onset, 3000.0, EnergyBand::High), 0.0);
    }

    #[test]
    fn test_silence_has_no_tempo() {
        let onset = envelope_of(&vec![0.0; 22050 * 4], 22050);
        assert!(onset.is_silent());
        assert_eq!(TempoEstimator::default().raw_tempo(&onset), 0.0);
    }

    #[test]
    fn test_click_track_tempo() {
        let onset = envelope_of(&click_track(120.0, 22050, 12.0), 22050);

        let ac = AutocorrelationTempo::new(TempoRange::default()).estimate(&onset);
        assert!((ac - 120.0).abs() < 4.0, "autocorrelation {}", ac);

        let bpm = TempoEstimator::default().raw_tempo(&onset);
        assert!((bpm - 120.0).abs() < 2.0, "tempo {}", bpm);
    }

    #[test]
    fn test_beats_land_on_clicks() {
        let onset = envelope_of(&click_track(100.0, 22050, 10.0), 22050);
        let tracker = BeatTracker::new(TempoRange::default());
        let beats = tracker.track(&onset, 100.0);
        assert!(beats.len() >= 12, "only {} beats", beats.len());

        let period = 0.6 * onset.frame_rate as f64;
        for pair in beats.windows(2) {
            let gap = (pair[1] - pair[0]) as f64;
            assert!((gap - period).abs() <= 2.0, "gap {} vs period {}", gap, period);
        }
    }

    #[test]
    fn test_tempo_range_validate() {
        let mut range = TempoRange {
            min_bpm: 200.0,
            max_bpm: 100.0,
        };
        range.validate();
        assert_eq!(range.min_bpm, 120.0);
        assert_eq!(range.max_bpm, 140.0);
    }
}
