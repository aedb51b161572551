//! Container and tag metadata
//!
//! Two independent layers: stream info comes from the Symphonia probe (no
//! decoding), tags come from lofty. Either layer may fail without affecting
//! the other; failures are logged and leave the corresponding fields empty.

use std::collections::BTreeMap;
use std::path::Path;

use lofty::file::TaggedFileExt;
use lofty::tag::{ItemKey, ItemValue};
use serde::{Deserialize, Serialize};
use symphonia::core::codecs::CODEC_TYPE_NULL;

use super::error::{AudioLoadError, MetadataPartialError, Result};
use super::probe_format;

/// Basic stream properties read from the container header
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub codec: Option<String>,
}

/// Everything known about a file besides its waveform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub codec: Option<String>,
    /// Text tags keyed by a human-readable name ("Track Title", "Artist", ...)
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl TrackMetadata {
    pub fn title(&self) -> Option<&str> {
        self.tags.get("Track Title").map(String::as_str)
    }

    pub fn artist(&self) -> Option<&str> {
        self.tags
            .get("Track Artist")
            .or_else(|| self.tags.get("Album Artist"))
            .map(String::as_str)
    }
}

/// Read stream info and tags, logging whichever layer fails
pub fn read_metadata(path: &Path) -> TrackMetadata {
    let mut metadata = TrackMetadata::default();

    match read_stream_info(path) {
        Ok(info) => {
            metadata.duration_secs = info.duration_secs;
            metadata.sample_rate = info.sample_rate;
            metadata.channels = info.channels;
            metadata.codec = info.codec;
        }
        Err(e) => log::warn!("read_metadata: No stream info for {:?}: {}", path, e),
    }

    match read_tags(path) {
        Ok(tags) => metadata.tags = tags,
        Err(e) => log::warn!("read_metadata: {}", e),
    }

    metadata
}

/// Probe the container for duration, sample rate, channel count and codec
pub fn read_stream_info(path: &Path) -> Result<StreamInfo> {
    let format = probe_format(path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioLoadError::NoAudioTrack(path.to_path_buf()))?;

    let params = &track.codec_params;
    let duration_secs = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Some(frames as f64 / rate as f64),
        _ => None,
    };
    let codec = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .map(|descriptor| descriptor.short_name.to_string());

    Ok(StreamInfo {
        duration_secs,
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count() as u16),
        codec,
    })
}

/// Read the text items of the file's primary tag
pub fn read_tags(path: &Path) -> std::result::Result<BTreeMap<String, String>, MetadataPartialError> {
    let tagged = lofty::read_from_path(path).map_err(|e| MetadataPartialError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut tags = BTreeMap::new();
    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        for item in tag.items() {
            if let ItemValue::Text(text) = item.value() {
                tags.insert(display_key(item.key()), text.clone());
            }
        }
    }

    Ok(tags)
}

/// "TrackTitle" -> "Track Title", unknown raw keys are title-cased
fn display_key(key: &ItemKey) -> String {
    match key {
        ItemKey::Unknown(raw) => title_case(raw),
        other => split_camel_case(&format!("{:?}", other)),
    }
}

fn split_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == ' ' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
