//! Sample rate conversion

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::{AudioLoadError, Result};

/// Input frames fed to the resampler per call
const CHUNK_SIZE: usize = 1024;

fn resample_err(e: impl std::fmt::Display) -> AudioLoadError {
    AudioLoadError::Resample(e.to_string())
}

/// Resample planar channels from `from_rate` to `to_rate`.
///
/// All channels must have the same length. Output length is
/// `round(len * to_rate / from_rate)` with the filter delay removed.
pub fn resample_channels(input: &[Vec<f32>], from_rate: u32, to_rate: u32) -> Result<Vec<Vec<f32>>> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let num_channels = input.len();
    let len = input[0].len();
    if len == 0 {
        return Ok(vec![Vec::new(); num_channels]);
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, num_channels).map_err(resample_err)?;

    let expected = (len as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); num_channels];

    let append = |output: &mut Vec<Vec<f32>>, chunk: Vec<Vec<f32>>| {
        for (dst, src) in output.iter_mut().zip(chunk) {
            dst.extend_from_slice(&src);
        }
    };

    let mut pos = 0;
    while pos + CHUNK_SIZE <= len {
        let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..pos + CHUNK_SIZE]).collect();
        let out = resampler.process(&chunk, None).map_err(resample_err)?;
        append(&mut output, out);
        pos += CHUNK_SIZE;
    }

    if pos < len {
        let chunk: Vec<&[f32]> = input.iter().map(|c| &c[pos..]).collect();
        let out = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(resample_err)?;
        append(&mut output, out);
    }

    // Flush the filter tail
    while output[0].len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(resample_err)?;
        if out.first().map_or(true, |c| c.is_empty()) {
            break;
        }
        append(&mut output, out);
    }

    for channel in &mut output {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected);
    }

    Ok(output)
}
