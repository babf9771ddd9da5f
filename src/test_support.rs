//! Helpers for integration test targets that drive real FFmpeg and MP4Box.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::encoder::Encoder;
use crate::error::AppError;
use crate::ffmpeg::{ToolPaths, path_to_string};

/// Synthetic source media layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMedia {
    /// H.264 video only.
    Plain,
    /// H.264 video plus one stereo AAC track tagged `eng`.
    WithAudio,
    /// Video, 5.1 FLAC audio and an embedded SubRip track tagged `fre`.
    WithAudioAndSubtitles,
}

/// Encoder over the discovered tools, writing intermediates to `working_dir`.
pub fn encoder_for_test(working_dir: &Path) -> Result<Encoder, AppError> {
    Ok(Encoder::new(ToolPaths::discover()?)?.with_working_dir(working_dir))
}

fn lavfi_video(duration_secs: f32) -> Vec<String> {
    vec![
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!("testsrc=duration={}:size=640x360:rate=25", duration_secs),
    ]
}

fn lavfi_audio(duration_secs: f32, layout: &str) -> Vec<String> {
    vec![
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!(
            "sine=frequency=440:duration={}:sample_rate=48000,aformat=channel_layouts={}",
            duration_secs, layout
        ),
    ]
}

fn write_srt(path: &Path) -> Result<(), AppError> {
    std::fs::write(
        path,
        "1\n00:00:00,000 --> 00:00:01,000\nBonjour\n\n2\n00:00:01,000 --> 00:00:02,000\nSalut\n",
    )?;
    Ok(())
}

/// Render a short synthetic clip with FFmpeg into `output` (mkv container).
pub fn create_test_media(
    ffmpeg: &Path,
    output: &Path,
    duration_secs: f32,
    kind: TestMedia,
) -> Result<PathBuf, AppError> {
    let mut args: Vec<String> = vec!["-loglevel".into(), "error".into(), "-y".into()];
    args.extend(lavfi_video(duration_secs));

    match kind {
        TestMedia::Plain => {
            args.extend(["-map", "0:v"].map(String::from));
        }
        TestMedia::WithAudio => {
            args.extend(lavfi_audio(duration_secs, "stereo"));
            args.extend(
                ["-map", "0:v", "-map", "1:a", "-c:a", "aac", "-metadata:s:a:0", "language=eng"]
                    .map(String::from),
            );
        }
        TestMedia::WithAudioAndSubtitles => {
            let srt = output.with_extension("srt");
            write_srt(&srt)?;
            args.extend(lavfi_audio(duration_secs, "5.1"));
            args.extend(["-i".to_string(), path_to_string(&srt)]);
            args.extend(
                [
                    "-map",
                    "0:v",
                    "-map",
                    "1:a",
                    "-map",
                    "2:s",
                    "-c:a",
                    "flac",
                    "-c:s",
                    "srt",
                    "-metadata:s:s:0",
                    "language=fre",
                ]
                .map(String::from),
            );
        }
    }
    args.extend(
        ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-profile:v", "high", "-level", "4.0"]
            .map(String::from),
    );
    args.push(path_to_string(output));

    let status = Command::new(ffmpeg)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        return Err(AppError::from(format!(
            "FFmpeg failed to create test media {}",
            output.display()
        )));
    }
    Ok(output.to_path_buf())
}
