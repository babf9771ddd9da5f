//! FFprobe-based stream metadata extraction.

use crate::error::AppError;
use crate::media::{MediaMetadata, MediaStreamInfo};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

/// Used when the source does not report a parseable frame rate.
const FALLBACK_FRAMERATE: f64 = 24.0;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    bit_rate: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    level: Option<i32>,
    #[serde(default)]
    pix_fmt: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    bit_rate: Option<String>,
    #[serde(default)]
    channels: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

pub(crate) fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn parse_number<T: std::str::FromStr>(s: Option<&String>) -> Option<T> {
    s.and_then(|v| v.trim().parse().ok())
}

impl From<FfprobeStream> for MediaStreamInfo {
    fn from(s: FfprobeStream) -> Self {
        MediaStreamInfo {
            index: s.index,
            codec_name: s.codec_name.unwrap_or_default(),
            bit_rate: parse_number(s.bit_rate.as_ref()).unwrap_or(0),
            pix_fmt: s.pix_fmt.unwrap_or_default(),
            profile: s.profile.unwrap_or_default(),
            level: s.level.unwrap_or(0),
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            avg_frame_rate: s.avg_frame_rate.unwrap_or_else(|| "0/0".into()),
            r_frame_rate: s.r_frame_rate.unwrap_or_else(|| "0/0".into()),
            channels: s.channels.unwrap_or(0),
            duration: parse_number(s.duration.as_ref()).unwrap_or(0.0),
            is_default: s.disposition.default > 0,
            tags: s.tags,
        }
    }
}

/// Parse ffprobe JSON output into MediaMetadata.
pub fn parse_ffprobe_json(json: &str) -> Result<MediaMetadata, AppError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::Probe(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let mut meta = MediaMetadata::default();
    for stream in output.streams.unwrap_or_default() {
        match stream.codec_type.as_deref() {
            Some("video") => meta.video_streams.push(stream.into()),
            Some("audio") => meta.audio_streams.push(stream.into()),
            Some("subtitle") => meta.subtitle_streams.push(stream.into()),
            _ => {}
        }
    }

    let format_bit_rate = output
        .format
        .as_ref()
        .and_then(|f| parse_number::<u64>(f.bit_rate.as_ref()))
        .unwrap_or(0);
    let first_video = meta.video_streams.iter().find(|s| s.is_valid());
    meta.bit_rate = first_video
        .map(MediaStreamInfo::effective_bit_rate)
        .filter(|b| *b > 0)
        .unwrap_or(format_bit_rate);
    meta.framerate = first_video
        .and_then(|s| parse_frame_rate(&s.r_frame_rate))
        .filter(|f| *f > 0.0)
        .unwrap_or(FALLBACK_FRAMERATE);

    if let Some(format) = output.format {
        meta.duration = parse_number(format.duration.as_ref()).unwrap_or(0.0);
        for (key, value) in format.tags {
            meta.tags.entry(key.to_lowercase()).or_insert(value);
        }
    }

    Ok(meta)
}

/// Run ffprobe on a media file and return its stream metadata.
pub fn probe(ffprobe: &Path, input: &Path) -> Result<MediaMetadata, AppError> {
    let path_str = input.to_string_lossy();

    log::debug!(
        target: "dash_encode::ffmpeg::ffprobe",
        "probe: ffprobe={}, path={}",
        ffprobe.display(),
        path_str
    );

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "--",
            &path_str,
        ])
        .output()
        .map_err(|e| AppError::Spawn {
            program: ffprobe.display().to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Probe(format!(
            "ffprobe failed on {}: {}",
            path_str,
            stderr.trim()
        )));
    }

    let json = String::from_utf8(output.stdout)
        .map_err(|_| AppError::Probe("ffprobe output was not valid UTF-8".to_string()))?;

    parse_ffprobe_json(&json)
}
