use std::path::Path;

use super::{VideoStreamCommand, push_flag, push_flag_if_set};
use crate::copy_infer::COPYABLE_CODEC;
use crate::ffmpeg::path_to_string;
use crate::media::MediaStreamInfo;
use crate::quality::Quality;

const VIDEO_ENCODER: &str = "libx264";

/// Encode parameters shared by every video rung of one transcode.
#[derive(Debug, Clone)]
pub struct VideoEncodeSettings {
    /// Output frame rate; 0 omits `-r`.
    pub framerate: u32,
    /// Frames between forced keyframes; 0 omits the x264 GOP directive.
    pub keyframe_interval: u32,
    /// Bitrate (kb/s) used for a 0-bitrate rung that must be re-encoded.
    pub default_bitrate: u32,
    pub max_rate_multiplier: f64,
    pub buffer_multiplier: f64,
    /// Whether 0-bitrate rungs may pass the source through.
    pub copy_allowed: bool,
    pub extra_flags: Vec<String>,
}

impl Default for VideoEncodeSettings {
    fn default() -> Self {
        Self {
            framerate: 0,
            keyframe_interval: 0,
            default_bitrate: 0,
            max_rate_multiplier: 1.5,
            buffer_multiplier: 2.0,
            copy_allowed: false,
            extra_flags: Vec::new(),
        }
    }
}

/// `<base>_<bitrate|original>.mp4`
fn video_file_name(base: &str, bitrate: u32) -> String {
    if bitrate == 0 {
        format!("{}_original.mp4", base)
    } else {
        format!("{}_{}.mp4", base, bitrate)
    }
}

fn scaled_kbps(value: u32, multiplier: f64) -> u64 {
    (f64::from(value) * multiplier).round() as u64
}

/// Build the FFmpeg output fragment for one (stream, rung) pair.
///
/// A passthrough rung emits only the map, `-vcodec copy`, extras and path.
/// Otherwise, in order: size, `-b:v/-maxrate/-bufsize`, preset, profile,
/// level, pixel format, `-r`, `-vcodec libx264 -x264-params
/// keyint=<N>:scenecut=0`, extras, path. Scenecut is disabled so keyframes
/// land exactly on interval boundaries in every representation.
pub fn build_video_command(
    stream: &MediaStreamInfo,
    quality: &Quality,
    output_dir: &Path,
    output_base: &str,
    settings: &VideoEncodeSettings,
) -> VideoStreamCommand {
    let path = output_dir.join(video_file_name(output_base, quality.bitrate));
    let copy = settings.copy_allowed
        && quality.is_copy()
        && !quality.has_size()
        && stream.codec_name.eq_ignore_ascii_case(COPYABLE_CODEC);

    let mut args = Vec::with_capacity(32);
    push_flag(&mut args, "-map", format!("0:{}", stream.index));

    if copy {
        push_flag(&mut args, "-vcodec", "copy");
    } else {
        if quality.has_size() {
            push_flag(&mut args, "-s", format!("{}x{}", quality.width, quality.height));
        }

        let target = if quality.bitrate == 0 {
            settings.default_bitrate
        } else {
            quality.bitrate
        };
        if target > 0 {
            let max_rate = scaled_kbps(target, settings.max_rate_multiplier);
            let buffer = (max_rate as f64 * settings.buffer_multiplier).round() as u64;
            push_flag(&mut args, "-b:v", format!("{}k", target));
            push_flag(&mut args, "-maxrate", format!("{}k", max_rate));
            push_flag(&mut args, "-bufsize", format!("{}k", buffer));
        }

        push_flag_if_set(&mut args, "-preset", &quality.preset);
        push_flag_if_set(&mut args, "-profile:v", &quality.profile);
        push_flag_if_set(&mut args, "-level", &quality.level);
        push_flag_if_set(&mut args, "-pix_fmt", &quality.pixel_format);

        if settings.framerate > 0 {
            push_flag(&mut args, "-r", settings.framerate.to_string());
        }

        push_flag(&mut args, "-vcodec", VIDEO_ENCODER);
        if settings.keyframe_interval > 0 {
            push_flag(
                &mut args,
                "-x264-params",
                format!("keyint={}:scenecut=0", settings.keyframe_interval),
            );
        }
    }

    args.extend(settings.extra_flags.iter().cloned());
    args.push(path_to_string(&path));

    VideoStreamCommand {
        index: stream.index,
        bitrate: quality.bitrate,
        copy,
        path,
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::StreamCommand;
    use std::path::PathBuf;

    fn h264_stream(index: u32) -> MediaStreamInfo {
        MediaStreamInfo {
            index,
            codec_name: "h264".into(),
            ..Default::default()
        }
    }

    fn settings() -> VideoEncodeSettings {
        VideoEncodeSettings {
            framerate: 30,
            keyframe_interval: 90,
            default_bitrate: 2500,
            ..Default::default()
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let pos = args.iter().position(|a| a == flag)?;
        args.get(pos + 1).map(String::as_str)
    }

    #[test]
    fn bitrate_triple_uses_multipliers() {
        let cmd = build_video_command(
            &h264_stream(0),
            &Quality::new(1280, 720, 2000, "fast"),
            Path::new("/out"),
            "movie",
            &settings(),
        );
        assert_eq!(value_after(&cmd.args, "-b:v"), Some("2000k"));
        assert_eq!(value_after(&cmd.args, "-maxrate"), Some("3000k"));
        assert_eq!(value_after(&cmd.args, "-bufsize"), Some("6000k"));
    }

    #[test]
    fn custom_multipliers() {
        let s = VideoEncodeSettings {
            max_rate_multiplier: 2.0,
            buffer_multiplier: 1.0,
            ..settings()
        };
        let cmd = build_video_command(
            &h264_stream(0),
            &Quality::new(0, 0, 1000, "fast"),
            Path::new("/out"),
            "movie",
            &s,
        );
        assert_eq!(value_after(&cmd.args, "-maxrate"), Some("2000k"));
        assert_eq!(value_after(&cmd.args, "-bufsize"), Some("2000k"));
    }

    #[test]
    fn keyframe_directive_and_framerate() {
        let cmd = build_video_command(
            &h264_stream(0),
            &Quality::new(1280, 720, 2000, "fast"),
            Path::new("/out"),
            "movie",
            &settings(),
        );
        assert!(cmd.argument().contains("keyint=90:scenecut=0"));
        assert_eq!(value_after(&cmd.args, "-r"), Some("30"));
        assert_eq!(value_after(&cmd.args, "-vcodec"), Some("libx264"));
    }

    #[test]
    fn full_fragment_order() {
        let cmd = build_video_command(
            &h264_stream(2),
            &Quality::new(1280, 720, 2000, "fast"),
            Path::new("/out"),
            "movie",
            &VideoEncodeSettings {
                extra_flags: vec!["-sn".into()],
                ..settings()
            },
        );
        assert_eq!(
            cmd.argument(),
            "-map 0:2 -s 1280x720 -b:v 2000k -maxrate 3000k -bufsize 6000k -preset fast \
             -profile:v high -level 4.0 -pix_fmt yuv420p -r 30 -vcodec libx264 \
             -x264-params keyint=90:scenecut=0 -sn \"/out/movie_2000.mp4\""
        );
        assert_eq!(cmd.path, PathBuf::from("/out/movie_2000.mp4"));
        assert_eq!(cmd.index, 2);
        assert!(!cmd.copy);
    }

    #[test]
    fn size_requires_both_dimensions() {
        let cmd = build_video_command(
            &h264_stream(0),
            &Quality::new(1280, 0, 2000, "fast"),
            Path::new("/out"),
            "movie",
            &settings(),
        );
        assert!(!cmd.args.iter().any(|a| a == "-s"));
    }

    #[test]
    fn empty_constraints_are_omitted() {
        let mut q = Quality::new(0, 0, 800, "");
        q.profile.clear();
        q.level.clear();
        q.pixel_format.clear();
        let cmd = build_video_command(&h264_stream(0), &q, Path::new("/out"), "movie", &settings());
        for flag in ["-preset", "-profile:v", "-level", "-pix_fmt"] {
            assert!(!cmd.args.iter().any(|a| a == flag), "{} present", flag);
        }
    }

    #[test]
    fn copy_rung_passes_through() {
        let s = VideoEncodeSettings {
            copy_allowed: true,
            ..settings()
        };
        let cmd = build_video_command(&h264_stream(0), &Quality::copy(), Path::new("/out"), "movie", &s);
        assert!(cmd.copy);
        assert_eq!(cmd.argument(), "-map 0:0 -vcodec copy \"/out/movie_original.mp4\"");
    }

    #[test]
    fn copy_rung_without_permission_uses_default_bitrate() {
        let cmd = build_video_command(
            &h264_stream(0),
            &Quality::copy(),
            Path::new("/out"),
            "movie",
            &settings(),
        );
        assert!(!cmd.copy);
        assert_eq!(value_after(&cmd.args, "-b:v"), Some("2500k"));
        assert_eq!(value_after(&cmd.args, "-maxrate"), Some("3750k"));
        assert_eq!(cmd.path, PathBuf::from("/out/movie_original.mp4"));
    }

    #[test]
    fn zero_target_omits_triple() {
        let s = VideoEncodeSettings {
            default_bitrate: 0,
            ..settings()
        };
        let cmd = build_video_command(&h264_stream(0), &Quality::copy(), Path::new("/out"), "movie", &s);
        assert!(!cmd.args.iter().any(|a| a == "-b:v"));
        assert!(!cmd.args.iter().any(|a| a == "-maxrate"));
    }

    #[test]
    fn non_h264_source_is_never_copied() {
        let s = VideoEncodeSettings {
            copy_allowed: true,
            ..settings()
        };
        let mut stream = h264_stream(0);
        stream.codec_name = "hevc".into();
        let cmd = build_video_command(&stream, &Quality::copy(), Path::new("/out"), "movie", &s);
        assert!(!cmd.copy);
        assert_eq!(value_after(&cmd.args, "-vcodec"), Some("libx264"));
    }
}
