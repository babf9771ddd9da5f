//! Per-stream FFmpeg argument generators and the two full tool invocations.
//!
//! Every generator produces an immutable stream command holding its argv
//! tokens (ending with the output path) and the output path itself. Full
//! invocations keep argv for execution and a tab-joined rendering for logs and
//! error reports; tabs never appear inside quoted paths, so the rendering can
//! be split back into fragments unambiguously.

mod audio;
mod mp4box;
mod subtitle;
mod transcode;
mod video;

use std::path::{Path, PathBuf};

pub use audio::{AudioEncodeSettings, SUPPORTED_OUTPUT_CODECS, build_audio_command};
pub use mp4box::{PackagingCommand, build_mp4box_command, key_interval_ms};
pub use subtitle::{SUPPORTED_SUBTITLE_CODECS, build_subtitle_command};
pub use transcode::{TranscodeCommand, TranscodeCommandBuilder};
pub use video::{VideoEncodeSettings, build_video_command};

/// Delimiter between fragments in rendered commands.
pub const FRAGMENT_DELIMITER: &str = "\t";

/// Shared view over the three stream command variants.
pub trait StreamCommand {
    /// Source stream index.
    fn index(&self) -> u32;
    fn path(&self) -> &Path;
    /// Argv tokens, output path last.
    fn args(&self) -> &[String];

    /// Space-joined fragment with the output path quoted.
    fn argument(&self) -> String {
        render_fragment(self.args())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamCommand {
    pub index: u32,
    /// Target bitrate label in kb/s; 0 for the source-quality rung.
    pub bitrate: u32,
    /// True when the stream is passed through without re-encoding.
    pub copy: bool,
    pub path: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioStreamCommand {
    pub index: u32,
    /// `"<language> <title>"`, used as the packaging role.
    pub name: String,
    pub language: String,
    pub path: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStreamCommand {
    pub index: u32,
    pub language: String,
    pub path: PathBuf,
    pub args: Vec<String>,
}

macro_rules! impl_stream_command {
    ($($ty:ty),*) => {
        $(impl StreamCommand for $ty {
            fn index(&self) -> u32 {
                self.index
            }
            fn path(&self) -> &Path {
                &self.path
            }
            fn args(&self) -> &[String] {
                &self.args
            }
        })*
    };
}

impl_stream_command!(VideoStreamCommand, AudioStreamCommand, SubtitleStreamCommand);

pub(crate) fn quote(value: &str) -> String {
    format!("\"{}\"", value)
}

/// Joins tokens with spaces, quoting the final (path) token.
pub(crate) fn render_fragment(args: &[String]) -> String {
    match args.split_last() {
        Some((path, rest)) if !rest.is_empty() => format!("{} {}", rest.join(" "), quote(path)),
        Some((path, _)) => quote(path),
        None => String::new(),
    }
}

pub(crate) fn push_flag(args: &mut Vec<String>, flag: &str, value: impl Into<String>) {
    args.push(flag.to_string());
    args.push(value.into());
}

/// Adds `flag value` only when `value` is non-empty.
pub(crate) fn push_flag_if_set(args: &mut Vec<String>, flag: &str, value: &str) {
    if !value.trim().is_empty() {
        push_flag(args, flag, value);
    }
}
