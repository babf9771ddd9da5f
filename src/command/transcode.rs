use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{
    AudioEncodeSettings, AudioStreamCommand, FRAGMENT_DELIMITER, StreamCommand,
    SubtitleStreamCommand, VideoEncodeSettings, VideoStreamCommand, build_audio_command,
    build_subtitle_command, build_video_command, quote,
};
use crate::ffmpeg::path_to_string;
use crate::media::MediaStreamInfo;
use crate::quality::Quality;

/// A complete FFmpeg invocation producing every stream file of one encode.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeCommand {
    /// Argv passed to FFmpeg.
    pub args: Vec<String>,
    /// Tab-joined human readable rendering used in logs and errors.
    pub rendered: String,
    pub video: Vec<VideoStreamCommand>,
    pub audio: Vec<AudioStreamCommand>,
    pub subtitle: Vec<SubtitleStreamCommand>,
}

impl TranscodeCommand {
    /// Output paths of every stream, video first.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.video
            .iter()
            .map(|c| c.path.clone())
            .chain(self.audio.iter().map(|c| c.path.clone()))
            .chain(self.subtitle.iter().map(|c| c.path.clone()))
            .collect()
    }
}

/// Output paths shared by more than one video command, each listed once.
/// File names carry no stream index, so several source video streams with
/// the same ladder collide.
fn repeated_paths(commands: &[VideoStreamCommand]) -> Vec<&Path> {
    let mut seen = HashSet::new();
    let mut repeated = Vec::new();
    for path in commands.iter().map(|c| c.path.as_path()) {
        if !seen.insert(path) && !repeated.contains(&path) {
            repeated.push(path);
        }
    }
    repeated
}

/// Collects stream commands for one input and renders the FFmpeg invocation.
///
/// Fragment order is fixed: input flags, caller flags, video, audio, subtitle.
pub struct TranscodeCommandBuilder {
    input_path: PathBuf,
    output_dir: PathBuf,
    output_base: String,
    additional_flags: Vec<String>,
    video: Vec<VideoStreamCommand>,
    audio: Vec<AudioStreamCommand>,
    subtitle: Vec<SubtitleStreamCommand>,
}

impl TranscodeCommandBuilder {
    pub fn new(input_path: &Path, output_dir: &Path, output_base: &str) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            output_base: output_base.to_string(),
            additional_flags: Vec::new(),
            video: Vec::new(),
            audio: Vec::new(),
            subtitle: Vec::new(),
        }
    }

    pub fn with_additional_flags(mut self, flags: Vec<String>) -> Self {
        self.additional_flags = flags;
        self
    }

    /// One output per valid stream and rung. Attachment-like streams are skipped.
    pub fn with_video_commands(
        mut self,
        streams: &[MediaStreamInfo],
        qualities: &[Quality],
        settings: &VideoEncodeSettings,
    ) -> Self {
        for stream in streams.iter().filter(|s| s.is_valid()) {
            for quality in qualities {
                self.video.push(build_video_command(
                    stream,
                    quality,
                    &self.output_dir,
                    &self.output_base,
                    settings,
                ));
            }
        }
        for path in repeated_paths(&self.video) {
            log::warn!(
                target: "dash_encode::command",
                "Several video outputs write {}; only the last one survives",
                path.display()
            );
        }
        self
    }

    pub fn with_audio_commands(
        mut self,
        streams: &[MediaStreamInfo],
        settings: &AudioEncodeSettings,
    ) -> Self {
        for stream in streams {
            self.audio.push(build_audio_command(
                stream,
                &self.output_dir,
                &self.output_base,
                settings,
            ));
        }
        self
    }

    pub fn with_subtitle_commands(mut self, streams: &[MediaStreamInfo]) -> Self {
        self.subtitle.extend(
            streams
                .iter()
                .filter_map(|s| build_subtitle_command(s, &self.output_dir, &self.output_base)),
        );
        self
    }

    pub fn build(self) -> TranscodeCommand {
        let input = path_to_string(&self.input_path);

        let mut args = vec![
            "-i".to_string(),
            input.clone(),
            "-y".to_string(),
            "-hide_banner".to_string(),
        ];
        let mut fragments = vec![format!("-i {} -y -hide_banner", quote(&input))];

        args.extend(self.additional_flags.iter().cloned());
        fragments.extend(self.additional_flags.iter().cloned());

        let streams = self
            .video
            .iter()
            .map(|c| c as &dyn StreamCommand)
            .chain(self.audio.iter().map(|c| c as &dyn StreamCommand))
            .chain(self.subtitle.iter().map(|c| c as &dyn StreamCommand));
        for command in streams {
            args.extend(command.args().iter().cloned());
            fragments.push(command.argument());
        }

        TranscodeCommand {
            args,
            rendered: fragments.join(FRAGMENT_DELIMITER),
            video: self.video,
            audio: self.audio,
            subtitle: self.subtitle,
        }
    }
}
