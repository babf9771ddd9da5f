//! Encode configuration: validated paths and ladder plus tunable options.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;
use crate::quality::{DEFAULT_CRUSH_TOLERANCE, Quality};

/// Characters stripped from the output base name.
const ILLEGAL_FILENAME_CHARS: &[char] = &['#', '&', '*', '<', '>', '/', '?', ':', '"', '%'];

/// Default audio bitrate ceiling per output channel, in bits per second.
pub const DEFAULT_MAX_PER_CHANNEL_BITRATE: u32 = 1024 * 96;

const DEFAULT_STREAM_FLAGS: &[&str] = &["-sn", "-ignore_unknown", "-map_chapters", "-1"];
const DEFAULT_MP4BOX_FLAGS: &[&str] = &[
    "-profile",
    "dashavc264:onDemand",
    "-sample-groups-traf",
    "-subsegs-per-sidx",
    "0",
    "-bs-switching",
    "no",
    "-rap",
    "-frag-rap",
    "-quiet",
];

/// Audio downmix policy for sources with more than two channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownmixMode {
    #[default]
    None,
    /// Plain `-ac 2` downmix.
    Default,
    /// Stereo pan filter that weights the center channel over sides and rears.
    Nightmode,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncodeOptions {
    /// Allow the copy rung to pass the source video through untouched. Default false.
    pub enable_stream_copy: Option<bool>,
    /// Keep every ladder rung even if it exceeds the source bitrate. Default false.
    pub disable_crushing: Option<bool>,
    /// Fraction of the source bitrate a rung must stay below. Default 0.95.
    pub crush_tolerance: Option<f64>,
    /// `-maxrate` as a multiple of the target bitrate. Default 1.5.
    pub max_rate_multiplier: Option<f64>,
    /// `-bufsize` as a multiple of `-maxrate`. Default 2.0.
    pub buffer_multiplier: Option<f64>,
    /// Extra FFmpeg argv tokens placed right after the input flags. Default none.
    pub additional_flags: Option<Vec<String>>,
    /// Extra argv tokens for every video output.
    pub additional_video_flags: Option<Vec<String>>,
    /// Extra argv tokens for every audio output.
    pub additional_audio_flags: Option<Vec<String>>,
    /// MP4Box argv tokens placed before `-dash`.
    pub additional_mp4box_flags: Option<Vec<String>>,
    pub downmix: Option<DownmixMode>,
    /// Audio bitrate ceiling per output channel, bits per second.
    pub max_per_channel_bitrate: Option<u32>,
    /// Replaces the manifest ProgramInformation title when set.
    pub program_title: Option<String>,
    /// Replaces the manifest ProgramInformation moreInformationURL when set.
    pub program_information_url: Option<String>,
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

impl EncodeOptions {
    pub fn effective_enable_stream_copy(&self) -> bool {
        self.enable_stream_copy.unwrap_or(false)
    }

    pub fn effective_disable_crushing(&self) -> bool {
        self.disable_crushing.unwrap_or(false)
    }

    /// 0 is a valid tolerance and crushes the ladder down to the copy rung.
    pub fn effective_crush_tolerance(&self) -> f64 {
        self.crush_tolerance
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(DEFAULT_CRUSH_TOLERANCE)
    }

    pub fn effective_max_rate_multiplier(&self) -> f64 {
        self.max_rate_multiplier
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(1.5)
    }

    pub fn effective_buffer_multiplier(&self) -> f64 {
        self.buffer_multiplier
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(2.0)
    }

    pub fn effective_additional_flags(&self) -> Vec<String> {
        self.additional_flags.clone().unwrap_or_default()
    }

    pub fn effective_additional_video_flags(&self) -> Vec<String> {
        self.additional_video_flags
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_STREAM_FLAGS))
    }

    pub fn effective_additional_audio_flags(&self) -> Vec<String> {
        self.additional_audio_flags
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_STREAM_FLAGS))
    }

    pub fn effective_additional_mp4box_flags(&self) -> Vec<String> {
        self.additional_mp4box_flags
            .clone()
            .unwrap_or_else(|| owned(DEFAULT_MP4BOX_FLAGS))
    }

    pub fn effective_downmix(&self) -> DownmixMode {
        self.downmix.unwrap_or_default()
    }

    pub fn effective_max_per_channel_bitrate(&self) -> u32 {
        self.max_per_channel_bitrate
            .filter(|b| *b > 0)
            .unwrap_or(DEFAULT_MAX_PER_CHANNEL_BITRATE)
    }
}

/// Strip characters that are unsafe in output file names.
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect()
}

/// A validated encode request.
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Base name shared by every output artifact.
    pub output_name: String,
    pub qualities: Vec<Quality>,
    /// Output frame rate; 0 inherits the source rate.
    pub framerate: u32,
    /// Frames between forced keyframes; 0 means three seconds of frames.
    pub keyframe_interval: u32,
    pub options: EncodeOptions,
}

impl EncodeConfig {
    /// Validates inputs before anything is spawned:
    /// the input file and output directory exist, the ladder is non-empty,
    /// and ladder bitrates are distinct.
    pub fn new(
        input_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        qualities: Vec<Quality>,
        output_name: Option<&str>,
    ) -> Result<Self, AppError> {
        let input_path = input_path.as_ref();
        let output_dir = output_dir.as_ref();

        if !input_path.is_file() {
            return Err(AppError::config(format!(
                "Input path does not exist: {}",
                input_path.display()
            )));
        }
        if !output_dir.is_dir() {
            return Err(AppError::config(format!(
                "Output directory does not exist: {}",
                output_dir.display()
            )));
        }
        if qualities.is_empty() {
            return Err(AppError::config(
                "No qualities specified. At least one quality is required.",
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = qualities.iter().find(|q| !seen.insert(q.bitrate)) {
            return Err(AppError::config(format!(
                "Duplicate quality bitrate {} kb/s. Bitrates must be distinct.",
                dup.bitrate
            )));
        }

        let output_name = match output_name {
            Some(name) => {
                let cleaned = clean_file_name(name);
                if cleaned.trim().is_empty() {
                    return Err(AppError::config(
                        "Output name is empty after removal of illegal characters.",
                    ));
                }
                cleaned
            }
            None => input_path
                .file_stem()
                .map(|s| clean_file_name(&s.to_string_lossy()))
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::config("Input path has no file name"))?,
        };

        Ok(Self {
            input_path: std::path::absolute(input_path)?,
            output_dir: output_dir.to_path_buf(),
            output_name,
            qualities,
            framerate: 0,
            keyframe_interval: 0,
            options: EncodeOptions::default(),
        })
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_keyframe_interval(mut self, keyframe_interval: u32) -> Self {
        self.keyframe_interval = keyframe_interval;
        self
    }

    pub fn with_options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }

    /// `<output_dir>/<output_name>.mpd`
    pub fn mpd_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.mpd", self.output_name))
    }
}
