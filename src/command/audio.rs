use std::path::Path;

use super::{AudioStreamCommand, push_flag};
use crate::config::{DEFAULT_MAX_PER_CHANNEL_BITRATE, DownmixMode};
use crate::ffmpeg::path_to_string;
use crate::media::MediaStreamInfo;

/// Source codecs MP4Box can package without re-encoding.
pub const SUPPORTED_OUTPUT_CODECS: &[&str] = &["opus", "aac", "mp3", "h264", "vp8"];

const FALLBACK_CODEC: &str = "aac";
const NIGHTMODE_FILTER: &str = "pan=stereo|FL=FC+0.30*FL+0.30*BL|FR=FC+0.30*FR+0.30*BR";

#[derive(Debug, Clone)]
pub struct AudioEncodeSettings {
    pub downmix: DownmixMode,
    /// Bits per second per output channel.
    pub max_per_channel_bitrate: u32,
    pub extra_flags: Vec<String>,
}

impl Default for AudioEncodeSettings {
    fn default() -> Self {
        Self {
            downmix: DownmixMode::None,
            max_per_channel_bitrate: DEFAULT_MAX_PER_CHANNEL_BITRATE,
            extra_flags: Vec::new(),
        }
    }
}

fn is_supported_codec(codec: &str) -> bool {
    SUPPORTED_OUTPUT_CODECS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(codec.trim()))
}

fn output_channels(stream: &MediaStreamInfo, downmix: DownmixMode) -> u64 {
    match stream.channels {
        0 => 2,
        n if n > 2 && downmix != DownmixMode::None => 2,
        n => u64::from(n),
    }
}

/// Fallback bitrate in bits/s: source × 1.1, capped at the per-channel ceiling.
fn fallback_bitrate(stream: &MediaStreamInfo, settings: &AudioEncodeSettings) -> u64 {
    let ceiling =
        u64::from(settings.max_per_channel_bitrate) * output_channels(stream, settings.downmix);
    match stream.effective_bit_rate() {
        0 => ceiling,
        source => ceiling.min((source as f64 * 1.1).round() as u64),
    }
}

/// Build the FFmpeg output fragment for one audio stream.
pub fn build_audio_command(
    stream: &MediaStreamInfo,
    output_dir: &Path,
    output_base: &str,
    settings: &AudioEncodeSettings,
) -> AudioStreamCommand {
    let language = match stream.language() {
        Some(lang) => lang.to_string(),
        None if stream.is_default => "default".to_string(),
        None => "und".to_string(),
    };
    let title = stream
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| stream.index.to_string());

    let path = output_dir.join(format!(
        "{}_audio_{}_{}.mp4",
        output_base, language, stream.index
    ));

    let mut args = Vec::with_capacity(16);
    push_flag(&mut args, "-map", format!("0:{}", stream.index));

    if !is_supported_codec(&stream.codec_name) {
        push_flag(&mut args, "-c:a", FALLBACK_CODEC);
        push_flag(&mut args, "-b:a", fallback_bitrate(stream, settings).to_string());
    }

    if stream.channels > 2 {
        match settings.downmix {
            DownmixMode::Default => push_flag(&mut args, "-ac", "2"),
            DownmixMode::Nightmode => push_flag(&mut args, "-af", NIGHTMODE_FILTER),
            DownmixMode::None => {}
        }
    }

    args.extend(settings.extra_flags.iter().cloned());
    args.push(path_to_string(&path));

    AudioStreamCommand {
        index: stream.index,
        name: format!("{} {}", language, title),
        language,
        path,
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::StreamCommand;
    use std::path::PathBuf;

    fn audio(index: u32, codec: &str, channels: u32, bit_rate: u64) -> MediaStreamInfo {
        MediaStreamInfo {
            index,
            codec_name: codec.into(),
            channels,
            bit_rate,
            ..Default::default()
        }
    }

    fn with_tags(mut stream: MediaStreamInfo, tags: &[(&str, &str)]) -> MediaStreamInfo {
        stream.tags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        stream
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        let pos = args.iter().position(|a| a == flag)?;
        args.get(pos + 1).map(String::as_str)
    }

    #[test]
    fn supported_codec_is_only_mapped() {
        let stream = with_tags(audio(1, "aac", 2, 128_000), &[("language", "eng"), ("title", "Stereo")]);
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &AudioEncodeSettings::default());
        assert_eq!(cmd.argument(), "-map 0:1 \"/out/movie_audio_eng_1.mp4\"");
        assert_eq!(cmd.name, "eng Stereo");
        assert_eq!(cmd.language, "eng");
        assert_eq!(cmd.path, PathBuf::from("/out/movie_audio_eng_1.mp4"));
    }

    #[test]
    fn unsupported_codec_is_transcoded_at_capped_bitrate() {
        let stream = audio(1, "flac", 2, 1_000_000);
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &AudioEncodeSettings::default());
        assert_eq!(value_after(&cmd.args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&cmd.args, "-b:a"), Some("196608"));
    }

    #[test]
    fn low_source_bitrate_is_scaled_up_by_ten_percent() {
        let stream = audio(1, "ac3", 2, 100_000);
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &AudioEncodeSettings::default());
        assert_eq!(value_after(&cmd.args, "-b:a"), Some("110000"));
    }

    #[test]
    fn unknown_source_bitrate_uses_ceiling() {
        let stream = audio(1, "truehd", 8, 0);
        let settings = AudioEncodeSettings {
            downmix: DownmixMode::Default,
            ..Default::default()
        };
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &settings);
        assert_eq!(value_after(&cmd.args, "-b:a"), Some("196608"));
        assert_eq!(value_after(&cmd.args, "-ac"), Some("2"));
    }

    #[test]
    fn nightmode_downmix_uses_pan_filter() {
        let stream = audio(2, "ac3", 6, 384_000);
        let settings = AudioEncodeSettings {
            downmix: DownmixMode::Nightmode,
            ..Default::default()
        };
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &settings);
        assert_eq!(value_after(&cmd.args, "-af"), Some(NIGHTMODE_FILTER));
        assert!(!cmd.args.iter().any(|a| a == "-ac"));
    }

    #[test]
    fn stereo_is_never_downmixed() {
        let stream = audio(2, "aac", 2, 128_000);
        let settings = AudioEncodeSettings {
            downmix: DownmixMode::Default,
            ..Default::default()
        };
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &settings);
        assert!(!cmd.args.iter().any(|a| a == "-ac"));
    }

    #[test]
    fn no_downmix_keeps_all_channels_in_ceiling() {
        let stream = audio(1, "dts", 6, 0);
        let cmd = build_audio_command(&stream, Path::new("/out"), "movie", &AudioEncodeSettings::default());
        assert_eq!(value_after(&cmd.args, "-b:a"), Some("589824"));
    }

    #[test]
    fn language_and_title_fallbacks() {
        let mut default = audio(3, "aac", 2, 0);
        default.is_default = true;
        let cmd = build_audio_command(&default, Path::new("/out"), "movie", &AudioEncodeSettings::default());
        assert_eq!(cmd.language, "default");
        assert_eq!(cmd.name, "default 3");

        let plain = audio(4, "aac", 2, 0);
        let cmd = build_audio_command(&plain, Path::new("/out"), "movie", &AudioEncodeSettings::default());
        assert_eq!(cmd.name, "und 4");
        assert!(cmd.path.ends_with("movie_audio_und_4.mp4"));
    }

    #[test]
    fn extras_precede_path() {
        let settings = AudioEncodeSettings {
            extra_flags: vec!["-sn".into(), "-map_chapters".into(), "-1".into()],
            ..Default::default()
        };
        let cmd = build_audio_command(&audio(1, "aac", 2, 0), Path::new("/out"), "m", &settings);
        assert_eq!(
            cmd.args,
            vec!["-map", "0:1", "-sn", "-map_chapters", "-1", "/out/m_audio_und_1.mp4"]
        );
    }
}
