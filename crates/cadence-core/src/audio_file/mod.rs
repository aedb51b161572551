//! Audio file decoding
//!
//! Every supported container (WAV, FLAC, MP3, OGG, AAC/M4A...) is decoded
//! through Symphonia into interleaved f32 samples. Analysis code asks for a
//! mono waveform at a fixed rate via [`load_mono`]; the stem separator asks
//! for the native interleaved stream via [`decode_interleaved`].

mod error;
mod metadata;
mod resample;

pub use error::{AudioLoadError, MetadataPartialError, Result};
pub use metadata::{read_metadata, read_stream_info, read_tags, StreamInfo, TrackMetadata};
pub use resample::resample_channels;

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Interleaved audio at its native sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl DecodedAudio {
    /// Frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Split interleaved samples into one buffer per channel
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let channels = self.channels.max(1) as usize;
        let mut planar = vec![Vec::with_capacity(self.frame_count()); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }
        planar
    }
}

/// Open a file and probe its container, returning the format reader
pub(crate) fn probe_format(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path).map_err(|e| AudioLoadError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioLoadError::UnsupportedFormat(e.to_string()))?;

    Ok(probed.format)
}

/// Decode the first audio track of a file into interleaved f32 samples
pub fn decode_interleaved(path: &Path) -> Result<DecodedAudio> {
    let mut format = probe_format(path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioLoadError::NoAudioTrack(path.to_path_buf()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioLoadError::UnsupportedFormat("Unknown sample rate".to_string()))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioLoadError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("decode_interleaved: Error reading packet from {:?}: {}", path, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("decode_interleaved: Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => {
                log::warn!("decode_interleaved: Decoder stopped on {:?}: {}", path, e);
                break;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count() as u16;
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() || channels == 0 {
        return Err(AudioLoadError::Empty(path.to_path_buf()));
    }

    log::debug!(
        "decode_interleaved: {:?} -> {} samples, {}Hz, {} channels",
        path,
        samples.len(),
        sample_rate,
        channels
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode a file, fold it to mono and resample it to `sample_rate`
pub fn load_mono(path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    let decoded = decode_interleaved(path)?;
    let mono = decoded.to_mono();
    let mut resampled = resample_channels(&[mono], decoded.sample_rate, sample_rate)?;
    let samples = resampled.pop().unwrap_or_default();

    if samples.is_empty() {
        return Err(AudioLoadError::Empty(path.to_path_buf()));
    }

    log::info!(
        "load_mono: {:?} loaded, {:.1}s at {}Hz",
        path.file_name().unwrap_or_default(),
        samples.len() as f64 / sample_rate as f64,
        sample_rate
    );

    Ok(samples)
}

/// Write interleaved samples as a 32-bit float WAV file
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> std::io::Result<()> {
    use hound::{SampleFormat, WavSpec, WavWriter};

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let to_io = |e: hound::Error| std::io::Error::new(std::io::ErrorKind::Other, e.to_string());

    let mut writer = WavWriter::create(path, spec).map_err(to_io)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(to_io)?;
    }
    writer.finalize().map_err(to_io)?;
    Ok(())
}
