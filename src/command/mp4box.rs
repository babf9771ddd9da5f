use std::path::{Path, PathBuf};

use super::{AudioStreamCommand, FRAGMENT_DELIMITER, VideoStreamCommand, quote};
use crate::ffmpeg::path_to_string;

/// Segment duration used when framerate or keyframe interval is unknown.
pub const DEFAULT_KEY_INTERVAL_MS: u32 = 3000;

/// A complete MP4Box invocation packaging stream files into a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagingCommand {
    pub args: Vec<String>,
    /// Tab-joined rendering used in logs and errors.
    pub rendered: String,
    pub mpd_path: PathBuf,
    /// `<stem>_dashinit.mp4` next to the manifest, one per input. These are
    /// the files MP4Box writes in on-demand mode.
    pub segment_paths: Vec<PathBuf>,
}

/// DASH segment duration in milliseconds: `keyframe_interval / framerate * 1000`.
pub fn key_interval_ms(keyframe_interval: u32, framerate: u32) -> u32 {
    if keyframe_interval == 0 || framerate == 0 {
        return DEFAULT_KEY_INTERVAL_MS;
    }
    (f64::from(keyframe_interval) / f64::from(framerate) * 1000.0).round() as u32
}

fn segment_path(input: &Path, mpd_dir: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_string_lossy();
    Some(mpd_dir.join(format!("{}_dashinit.mp4", stem)))
}

fn input_with_role(path: &Path, role: &str) -> String {
    let path = path_to_string(path);
    if role.trim().is_empty() {
        path
    } else {
        format!("{}:role={}", path, role)
    }
}

/// Build the packaging invocation. Video inputs carry their bitrate label as
/// role, audio inputs their `"<language> <title>"` name.
pub fn build_mp4box_command(
    video: &[VideoStreamCommand],
    audio: &[AudioStreamCommand],
    mpd_path: &Path,
    key_interval_ms: u32,
    additional_flags: &[String],
) -> PackagingCommand {
    let mut flags: Vec<String> = additional_flags.to_vec();
    flags.push("-dash".to_string());
    flags.push(key_interval_ms.to_string());
    flags.push("-out".to_string());
    flags.push(path_to_string(mpd_path));

    let inputs: Vec<String> = video
        .iter()
        .map(|v| input_with_role(&v.path, &v.bitrate.to_string()))
        .chain(audio.iter().map(|a| input_with_role(&a.path, &a.name)))
        .collect();

    let mpd_dir = mpd_path.parent().unwrap_or_else(|| Path::new(""));
    let segment_paths = video
        .iter()
        .map(|v| v.path.as_path())
        .chain(audio.iter().map(|a| a.path.as_path()))
        .filter_map(|p| segment_path(p, mpd_dir))
        .collect();

    let mut rendered: Vec<String> = additional_flags.to_vec();
    rendered.push(format!("-dash {}", key_interval_ms));
    rendered.push(format!("-out {}", quote(&path_to_string(mpd_path))));
    rendered.push("--".to_string());
    rendered.extend(inputs.iter().map(|i| quote(i)));

    let mut args = flags;
    args.push("--".to_string());
    args.extend(inputs);

    PackagingCommand {
        args,
        rendered: rendered.join(FRAGMENT_DELIMITER),
        mpd_path: mpd_path.to_path_buf(),
        segment_paths,
    }
}
