//! Demucs vocal separation through ONNX Runtime
//!
//! The input is decoded, resampled to 44.1 kHz stereo and normalised by the
//! mean and standard deviation of its mono mix. Demucs runs over fixed-length
//! windows that overlap by a quarter; overlapping outputs are cross-faded with
//! linear ramps. The vocal source is de-normalised and returned interleaved.
//!
//! Sessions are kept in the [`ModelCache`] per variant and reused across
//! tracks.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use cadence_core::audio_file::{decode_interleaved, resample_channels};
use ndarray::Array3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use super::backend::{ProgressCallback, SeparationBackend, VocalStem};
use super::error::{Result, SeparationError};
use super::variant::SeparationVariant;
use crate::device::InferenceStrategy;
use crate::models::{ModelCache, ModelStore, StageKind};

/// Rate the Demucs models were trained at
pub const DEMUCS_SAMPLE_RATE: u32 = 44_100;

/// Fraction of each window shared with the next one
pub const SEGMENT_OVERLAP: f32 = 0.25;

/// Below this peak the vocal output is treated as absent
const SILENT_STEM_PEAK: f32 = 1e-4;

fn init_error(e: impl std::fmt::Display) -> SeparationError {
    SeparationError::BackendInitFailed(e.to_string())
}

fn inference_error(e: impl std::fmt::Display) -> SeparationError {
    SeparationError::SeparationFailed(e.to_string())
}

/// Loaded session; `run` needs exclusive access
type SharedSession = Arc<Mutex<Session>>;

/// Backend using ONNX Runtime directly via the `ort` crate
pub struct OrtBackend {
    models: ModelStore,
    strategy: InferenceStrategy,
    cache: Arc<ModelCache>,
}

impl OrtBackend {
    pub fn new(models: ModelStore, strategy: InferenceStrategy, cache: Arc<ModelCache>) -> Self {
        log::info!(
            "OrtBackend: {:?}, {:?} precision, {}s windows",
            strategy.device,
            strategy.precision,
            strategy.separation_segment_secs
        );
        Self {
            models,
            strategy,
            cache,
        }
    }

    /// Session for `variant`, downloading and loading the model on first use
    fn session(&self, variant: SeparationVariant) -> Result<SharedSession> {
        self.cache
            .get_or_load(StageKind::Separation, variant.name(), || {
                let model_path = self.models.ensure(&variant.model_file(), None)?;
                let session = self.load_session(&model_path)?;
                Ok(Arc::new(Mutex::new(session)))
            })
    }

    fn load_session(&self, model_path: &Path) -> Result<Session> {
        log::info!("load_session: Loading ONNX model from {:?}", model_path);

        let builder = Session::builder()
            .map_err(init_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(init_error)?;

        #[cfg(feature = "cuda")]
        let builder = if self.strategy.device.is_accelerator() {
            use ort::execution_providers::CUDAExecutionProvider;
            builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(init_error)?
        } else {
            builder
        };

        #[cfg(all(feature = "directml", not(feature = "cuda")))]
        let builder = if self.strategy.device.is_accelerator() {
            use ort::execution_providers::DirectMLExecutionProvider;
            builder
                .with_execution_providers([DirectMLExecutionProvider::default().build()])
                .map_err(init_error)?
        } else {
            builder
        };

        builder
            .commit_from_file(model_path)
            .map_err(|e| init_error(format!("Failed to load ONNX model: {}", e)))
    }

    fn segment_frames(&self) -> usize {
        ((self.strategy.separation_segment_secs * DEMUCS_SAMPLE_RATE as f64) as usize).max(1)
    }
}

impl SeparationBackend for OrtBackend {
    fn separate_vocals(
        &self,
        input_path: &Path,
        variant: SeparationVariant,
        progress: Option<ProgressCallback>,
    ) -> Result<Option<VocalStem>> {
        let Some(vocal_index) = variant.vocal_index() else {
            log::info!("separate_vocals: {} has no vocal source", variant);
            return Ok(None);
        };

        if let Some(cb) = &progress {
            cb(0.0);
        }

        let session = self.session(variant)?;
        let (mut left, mut right) = load_stereo(input_path)?;
        log::info!(
            "separate_vocals: {:?}, {:.1}s at {}Hz",
            input_path.file_name().unwrap_or_default(),
            left.len() as f64 / DEMUCS_SAMPLE_RATE as f64,
            DEMUCS_SAMPLE_RATE
        );

        if let Some(cb) = &progress {
            cb(0.1);
        }

        let norm = Normalization::from_reference(&left, &right);
        norm.apply(&mut left);
        norm.apply(&mut right);

        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let separated = run_segments(
            &mut session,
            &left,
            &right,
            self.segment_frames(),
            vocal_index,
            progress.as_ref(),
        )?;

        let Some((mut vocals_l, mut vocals_r)) = separated else {
            return Ok(None);
        };
        norm.restore(&mut vocals_l);
        norm.restore(&mut vocals_r);

        let stem = VocalStem {
            samples: vocals_l
                .iter()
                .zip(&vocals_r)
                .flat_map(|(&l, &r)| [l, r])
                .collect(),
            sample_rate: DEMUCS_SAMPLE_RATE,
            channels: 2,
        };

        if let Some(cb) = &progress {
            cb(1.0);
        }

        if stem.peak() < SILENT_STEM_PEAK {
            log::info!("separate_vocals: Vocal output is silent");
            return Ok(None);
        }
        Ok(Some(stem))
    }

    fn supports_gpu(&self) -> bool {
        self.strategy.device.is_accelerator()
    }

    fn name(&self) -> &'static str {
        "ONNX Runtime"
    }
}

/// Decode to planar stereo at [`DEMUCS_SAMPLE_RATE`]
fn load_stereo(path: &Path) -> Result<(Vec<f32>, Vec<f32>)> {
    let decoded = decode_interleaved(path)?;
    let mut channels = decoded.deinterleave();
    channels.truncate(2);
    if channels.len() == 1 {
        channels.push(channels[0].clone());
    }

    let mut resampled = resample_channels(&channels, decoded.sample_rate, DEMUCS_SAMPLE_RATE)?;
    let right = resampled.pop().unwrap_or_default();
    let left = resampled.pop().unwrap_or_default();
    Ok((left, right))
}

/// Mean and standard deviation of the mono mix
#[derive(Debug, Clone, Copy, PartialEq)]
struct Normalization {
    mean: f32,
    std: f32,
}

impl Normalization {
    fn from_reference(left: &[f32], right: &[f32]) -> Self {
        let n = left.len().min(right.len());
        if n == 0 {
            return Self { mean: 0.0, std: 0.0 };
        }
        let mono = left.iter().zip(right).map(|(l, r)| (l + r) * 0.5);
        let mean = mono.clone().map(f64::from).sum::<f64>() / n as f64;
        let var = mono.map(|x| (x as f64 - mean).powi(2)).sum::<f64>() / n as f64;
        Self {
            mean: mean as f32,
            std: var.sqrt() as f32,
        }
    }

    fn apply(&self, samples: &mut [f32]) {
        let scale = self.std + 1e-8;
        for s in samples.iter_mut() {
            *s = (*s - self.mean) / scale;
        }
    }

    fn restore(&self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = *s * self.std + self.mean;
        }
    }
}

/// Start frames of each window; the last one reaches the end of the input
fn segment_starts(total_frames: usize, segment: usize, stride: usize) -> Vec<usize> {
    if total_frames <= segment {
        return vec![0];
    }
    let count = (total_frames - segment).div_ceil(stride) + 1;
    (0..count).map(|i| i * stride).collect()
}

/// Window weights: linear ramps over the overlap, flat in between, never zero
fn crossfade_weights(segment: usize, overlap: usize) -> Vec<f32> {
    let ramp = overlap.max(1);
    (0..segment)
        .map(|i| (i + 1).min(segment - i).min(ramp) as f32 / ramp as f32)
        .collect()
}

/// Run the model window by window and return the cross-faded vocal channels
///
/// `Ok(None)` when the model output has no source at `vocal_index`.
fn run_segments(
    session: &mut Session,
    left: &[f32],
    right: &[f32],
    segment: usize,
    vocal_index: usize,
    progress: Option<&ProgressCallback>,
) -> Result<Option<(Vec<f32>, Vec<f32>)>> {
    let n = left.len().min(right.len());
    if n == 0 {
        return Ok(None);
    }

    let overlap = (segment as f32 * SEGMENT_OVERLAP) as usize;
    let stride = (segment - overlap).max(1);
    let weights = crossfade_weights(segment, overlap);
    let starts = segment_starts(n, segment, stride);

    let mut out_l = vec![0.0f32; n];
    let mut out_r = vec![0.0f32; n];
    let mut weight_sum = vec![0.0f32; n];

    for (i, &start) in starts.iter().enumerate() {
        let len = segment.min(n - start);

        // [batch=1, channels=2, samples], zero-padded to the window length
        let mut input = Array3::<f32>::zeros((1, 2, segment));
        for t in 0..len {
            input[[0, 0, t]] = left[start + t];
            input[[0, 1, t]] = right[start + t];
        }

        let tensor = Tensor::from_array(input).map_err(inference_error)?;
        let outputs = session
            .run(ort::inputs!["input" => tensor])
            .map_err(|e| inference_error(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| inference_error("No output tensor"))?
            .1;
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(inference_error)?;

        // [1, sources, 2, samples]
        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims.len() != 4 || dims[2] != 2 {
            return Err(inference_error(format!(
                "Unexpected output shape {:?}, expected [1, sources, 2, N]",
                dims
            )));
        }
        let sources = dims[1] as usize;
        let out_len = dims[3] as usize;
        if vocal_index >= sources {
            log::warn!("run_segments: Model produced {} sources, no vocals", sources);
            return Ok(None);
        }

        let left_base = out_len * (2 * vocal_index);
        let right_base = out_len * (1 + 2 * vocal_index);
        for t in 0..len.min(out_len) {
            let w = weights[t];
            out_l[start + t] += data[left_base + t] * w;
            out_r[start + t] += data[right_base + t] * w;
            weight_sum[start + t] += w;
        }

        if let Some(cb) = progress {
            cb(0.1 + 0.85 * (i + 1) as f32 / starts.len() as f32);
        }
    }

    for ((l, r), &w) in out_l.iter_mut().zip(out_r.iter_mut()).zip(&weight_sum) {
        if w > 0.0 {
            *l /= w;
            *r /= w;
        }
    }

    log::debug!("run_segments: {} windows of {} frames", starts.len(), segment);
    Ok(Some((out_l, out_r)))
}
