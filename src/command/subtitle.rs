use std::path::Path;

use super::{SubtitleStreamCommand, push_flag};
use crate::ffmpeg::path_to_string;
use crate::media::MediaStreamInfo;

/// Text subtitle codecs FFmpeg can convert to WebVTT. Bitmap formats such as
/// PGS are not in the list.
pub const SUPPORTED_SUBTITLE_CODECS: &[&str] = &["webvtt", "ass", "mov_text", "subrip", "text"];

/// Build an extraction fragment for one subtitle stream, or `None` when the
/// codec cannot be converted to WebVTT.
pub fn build_subtitle_command(
    stream: &MediaStreamInfo,
    output_dir: &Path,
    output_base: &str,
) -> Option<SubtitleStreamCommand> {
    let codec = stream.codec_name.trim();
    if !SUPPORTED_SUBTITLE_CODECS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(codec))
    {
        log::debug!(
            target: "dash_encode::command",
            "Skipping subtitle stream {} with unsupported codec {:?}",
            stream.index,
            codec
        );
        return None;
    }

    let language = stream.language().unwrap_or("und").to_string();
    let path = output_dir.join(format!(
        "{}_subtitle_{}_{}.vtt",
        output_base, language, stream.index
    ));

    let mut args = Vec::with_capacity(3);
    push_flag(&mut args, "-map", format!("0:{}", stream.index));
    args.push(path_to_string(&path));

    Some(SubtitleStreamCommand {
        index: stream.index,
        language,
        path,
        args,
    })
}
