//! Encode orchestrator: probe, ladder, transcode, package, post-process.
//!
//! One call to [`Encoder::encode`] walks
//! `Probed -> Laddered -> Encoding -> Packaging -> PostProcessing -> Done`,
//! ending in `Failed` on the first error. Stream files are written to the
//! encoder's working directory and removed once packaged or on failure; the
//! manifest, its segment files and subtitles end up in the output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::command::{
    AudioEncodeSettings, PackagingCommand, StreamCommand, TranscodeCommand,
    TranscodeCommandBuilder, VideoEncodeSettings, build_mp4box_command, key_interval_ms,
};
use crate::config::EncodeConfig;
use crate::copy_infer::can_copy;
use crate::error::AppError;
use crate::ffmpeg::{ToolPaths, ffprobe, parse_encode_progress, run_process};
use crate::files::clean_files;
use crate::manifest::{self, Mpd, ProgramInfo};
use crate::media::MediaMetadata;
use crate::quality::{Quality, crush_qualities};
use crate::subtitles;

/// Minimum interval between encode progress reports.
const PROGRESS_EMIT_INTERVAL: Duration = Duration::from_millis(150);
const PROGRESS_EMIT_STEP: f64 = 0.01;
/// Keyframe interval in seconds when the caller leaves it unset.
const DEFAULT_KEYFRAME_SECONDS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    Probed,
    Laddered,
    Encoding,
    Packaging,
    PostProcessing,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EncodeStage {
    Encode,
    Dashify,
    PostProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeStageProgress {
    pub stage: EncodeStage,
    /// Fraction of the stage completed, 0..=1.
    pub progress: f64,
}

pub type ProgressCallback = Arc<dyn Fn(EncodeStageProgress) + Send + Sync>;

/// Outcome of a successful encode.
#[derive(Debug, Clone)]
pub struct EncodeResult {
    pub mpd_path: PathBuf,
    pub mpd: Mpd,
    pub transcode_command: TranscodeCommand,
    pub packaging_command: PackagingCommand,
    pub metadata: MediaMetadata,
    /// Seconds; first video stream duration, else the container's.
    pub duration: f64,
}

impl EncodeResult {
    /// Every file the manifest references, relative to its directory.
    pub fn media_files(&self) -> Vec<String> {
        manifest::media_files(&self.mpd)
    }
}

/// Emits progress only when enough time passed or the value moved enough.
struct ProgressThrottle {
    last_emit: Instant,
    last_progress: f64,
}

impl ProgressThrottle {
    fn new() -> Self {
        Self {
            last_emit: Instant::now(),
            last_progress: 0.0,
        }
    }

    fn should_emit(&mut self, progress: f64) -> bool {
        let now = Instant::now();
        let emit = now.duration_since(self.last_emit) >= PROGRESS_EMIT_INTERVAL
            || (progress - self.last_progress).abs() >= PROGRESS_EMIT_STEP
            || progress >= 1.0;
        if emit {
            self.last_emit = now;
            self.last_progress = progress;
        }
        emit
    }
}

/// Tracks and logs state transitions of one encode.
struct Run<'a> {
    input: &'a Path,
    state: EncodeState,
    progress: Option<ProgressCallback>,
}

impl<'a> Run<'a> {
    fn new(input: &'a Path, progress: Option<ProgressCallback>) -> Self {
        log::info!(
            target: "dash_encode::encoder",
            "{}: {:?}",
            input.display(),
            EncodeState::Probed
        );
        Self {
            input,
            state: EncodeState::Probed,
            progress,
        }
    }

    fn advance(&mut self, next: EncodeState) {
        log::info!(
            target: "dash_encode::encoder",
            "{}: {:?} -> {:?}",
            self.input.display(),
            self.state,
            next
        );
        self.state = next;
    }

    fn fail(&mut self, err: AppError) -> AppError {
        if err.is_cancelled() {
            log::info!(
                target: "dash_encode::encoder",
                "{}: cancelled during {:?}",
                self.input.display(),
                self.state
            );
        } else {
            log::error!(
                target: "dash_encode::encoder",
                "{}: failed during {:?}: {}",
                self.input.display(),
                self.state,
                err
            );
        }
        self.state = EncodeState::Failed;
        err
    }

    fn report(&self, stage: EncodeStage, progress: f64) {
        if let Some(cb) = &self.progress {
            cb(EncodeStageProgress { stage, progress });
        }
    }
}

/// Frame rate and keyframe interval actually used for the encode.
fn effective_timing(config: &EncodeConfig, metadata: &MediaMetadata) -> (u32, u32) {
    let framerate = if config.framerate > 0 {
        config.framerate
    } else {
        metadata.framerate.round().max(1.0) as u32
    };
    let keyframe_interval = if config.keyframe_interval > 0 {
        config.keyframe_interval
    } else {
        framerate * DEFAULT_KEYFRAME_SECONDS
    };
    (framerate, keyframe_interval)
}

/// Whether the 0-bitrate rung at the top of `qualities` may pass the source
/// video through. A caller supplied frame rate forces a re-encode.
fn stream_copy_allowed(
    config: &EncodeConfig,
    qualities: &[Quality],
    metadata: &MediaMetadata,
) -> bool {
    if !config.options.effective_enable_stream_copy() || config.framerate > 0 {
        return false;
    }
    match qualities.first() {
        Some(top) if top.is_copy() => can_copy(
            &top.pixel_format,
            &top.level,
            &top.profile,
            &metadata.valid_video_streams(),
        ),
        _ => false,
    }
}

fn program_info(config: &EncodeConfig) -> ProgramInfo {
    ProgramInfo {
        title: config.options.program_title.clone(),
        more_information_url: config.options.program_information_url.clone(),
    }
}

/// Packages media files into MPEG-DASH with FFmpeg and MP4Box.
#[derive(Debug, Clone)]
pub struct Encoder {
    tools: ToolPaths,
    working_dir: PathBuf,
}

impl Encoder {
    /// Fails with `ToolNotFound` if any tool path does not exist.
    pub fn new(tools: ToolPaths) -> Result<Self, AppError> {
        tools.validate()?;
        Ok(Self {
            tools,
            working_dir: std::env::temp_dir(),
        })
    }

    /// Directory for intermediate stream files.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn probe(&self, input: &Path) -> Result<MediaMetadata, AppError> {
        ffprobe::probe(&self.tools.ffprobe, input)
    }

    /// Probe the input and run the full pipeline.
    pub fn encode(
        &self,
        config: &EncodeConfig,
        progress: Option<ProgressCallback>,
        cancel: &CancelToken,
    ) -> Result<EncodeResult, AppError> {
        cancel.check()?;
        let metadata = self.probe(&config.input_path)?;
        self.encode_probed(config, metadata, progress, cancel)
    }

    /// Run the pipeline against already probed metadata.
    pub fn encode_probed(
        &self,
        config: &EncodeConfig,
        metadata: MediaMetadata,
        progress: Option<ProgressCallback>,
        cancel: &CancelToken,
    ) -> Result<EncodeResult, AppError> {
        let mut run = Run::new(&config.input_path, progress);
        self.run_pipeline(&mut run, config, metadata, cancel)
            .map_err(|e| run.fail(e))
    }

    fn run_pipeline(
        &self,
        run: &mut Run<'_>,
        config: &EncodeConfig,
        metadata: MediaMetadata,
        cancel: &CancelToken,
    ) -> Result<EncodeResult, AppError> {
        let video_streams = metadata.valid_video_streams();
        if video_streams.is_empty() {
            return Err(AppError::NoVideoStream(config.input_path.clone()));
        }

        let options = &config.options;
        let qualities = if options.effective_disable_crushing() {
            config.qualities.clone()
        } else {
            crush_qualities(
                &config.qualities,
                metadata.kbit_rate(),
                options.effective_crush_tolerance(),
            )
        };
        let copy_allowed = stream_copy_allowed(config, &qualities, &metadata);
        let (framerate, keyframe_interval) = effective_timing(config, &metadata);
        run.advance(EncodeState::Laddered);
        log::info!(
            target: "dash_encode::encoder",
            "Ladder: [{}], copy={}, framerate={}, keyint={}",
            qualities
                .iter()
                .map(Quality::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            copy_allowed,
            framerate,
            keyframe_interval
        );
        cancel.check()?;

        let video_settings = VideoEncodeSettings {
            framerate,
            keyframe_interval,
            default_bitrate: metadata.kbit_rate(),
            max_rate_multiplier: options.effective_max_rate_multiplier(),
            buffer_multiplier: options.effective_buffer_multiplier(),
            copy_allowed,
            extra_flags: options.effective_additional_video_flags(),
        };
        let audio_settings = AudioEncodeSettings {
            downmix: options.effective_downmix(),
            max_per_channel_bitrate: options.effective_max_per_channel_bitrate(),
            extra_flags: options.effective_additional_audio_flags(),
        };
        let transcode = TranscodeCommandBuilder::new(
            &config.input_path,
            &self.working_dir,
            &config.output_name,
        )
        .with_additional_flags(options.effective_additional_flags())
        .with_video_commands(&video_streams, &qualities, &video_settings)
        .with_audio_commands(&metadata.audio_streams, &audio_settings)
        .with_subtitle_commands(&metadata.subtitle_streams)
        .build();

        run.advance(EncodeState::Encoding);
        self.transcode(run, &transcode, metadata.media_duration(), cancel)?;

        if cancel.is_cancelled() {
            clean_files(transcode.output_paths());
            return Err(AppError::cancelled());
        }

        run.advance(EncodeState::Packaging);
        let packaging = build_mp4box_command(
            &transcode.video,
            &transcode.audio,
            &config.mpd_path(),
            key_interval_ms(keyframe_interval, framerate),
            &options.effective_additional_mp4box_flags(),
        );
        self.package(run, &transcode, &packaging, &config.output_dir, cancel)?;

        let mut placed = Vec::new();
        let post = self.post_process(run, config, &transcode, &packaging, &mut placed, cancel);
        let mpd = match post {
            Ok(mpd) => mpd,
            Err(e) => {
                remove_partial_manifest(&packaging, &config.output_dir);
                clean_files(transcode.subtitle.iter().map(|c| c.path()));
                clean_files(&placed);
                return Err(e);
            }
        };
        run.advance(EncodeState::Done);

        Ok(EncodeResult {
            mpd_path: packaging.mpd_path.clone(),
            mpd,
            duration: metadata.media_duration(),
            transcode_command: transcode,
            packaging_command: packaging,
            metadata,
        })
    }

    /// Move subtitles next to the manifest and merge them into it. Every
    /// subtitle file written to the output directory is recorded in `placed`
    /// so the caller can remove it on failure.
    fn post_process(
        &self,
        run: &mut Run<'_>,
        config: &EncodeConfig,
        transcode: &TranscodeCommand,
        packaging: &PackagingCommand,
        placed: &mut Vec<PathBuf>,
        cancel: &CancelToken,
    ) -> Result<Mpd, AppError> {
        cancel.check()?;
        run.advance(EncodeState::PostProcessing);
        run.report(EncodeStage::PostProcess, 0.0);

        let next_index = transcode
            .video
            .iter()
            .map(|c| c.index)
            .chain(transcode.audio.iter().map(|c| c.index))
            .chain(transcode.subtitle.iter().map(|c| c.index))
            .max()
            .map_or(0, |i| i + 1);
        placed.extend(
            transcode
                .subtitle
                .iter()
                .filter_map(|c| c.path.file_name())
                .map(|name| config.output_dir.join(name)),
        );
        let mut subs = subtitles::relocate(transcode.subtitle.clone(), &config.output_dir)?;
        let sidecars = subtitles::discover_sidecars(
            &config.input_path,
            &config.output_dir,
            &config.output_name,
            next_index,
        )?;
        placed.extend(sidecars.iter().map(|c| c.path.clone()));
        subs.extend(sidecars);
        run.report(EncodeStage::PostProcess, 0.5);

        let mpd = manifest::post_process_file(&packaging.mpd_path, &subs, &program_info(config))?;
        run.report(EncodeStage::PostProcess, 1.0);
        Ok(mpd)
    }

    fn transcode(
        &self,
        run: &Run<'_>,
        command: &TranscodeCommand,
        duration: f64,
        cancel: &CancelToken,
    ) -> Result<(), AppError> {
        log::debug!(
            target: "dash_encode::encoder",
            "FFmpeg command: {}",
            command.rendered
        );
        run.report(EncodeStage::Encode, 0.0);

        let mut throttle = ProgressThrottle::new();
        let mut on_stderr = |line: &str| {
            if let Some(p) = parse_encode_progress(line, duration) {
                if throttle.should_emit(p) {
                    run.report(EncodeStage::Encode, p);
                }
            }
        };
        let result = run_process(
            &self.tools.ffmpeg,
            &command.args,
            &mut |_| {},
            &mut on_stderr,
            cancel,
        );

        let output = match result {
            Ok(output) if output.success() => output,
            Ok(output) => {
                clean_files(command.output_paths());
                if cancel.is_cancelled() {
                    return Err(AppError::cancelled());
                }
                return Err(AppError::TranscodeFailed {
                    code: output.exit_code,
                    command: command.rendered.clone(),
                    log: output.log(),
                });
            }
            Err(e) => {
                clean_files(command.output_paths());
                if e.is_cancelled() {
                    return Err(e);
                }
                return Err(AppError::TranscodeFailed {
                    code: -1,
                    command: command.rendered.clone(),
                    log: e.to_string(),
                });
            }
        };
        log::debug!(
            target: "dash_encode::encoder",
            "FFmpeg produced {} stream file(s) ({} log lines)",
            command.output_paths().len(),
            output.stderr.len()
        );
        run.report(EncodeStage::Encode, 1.0);
        Ok(())
    }

    fn package(
        &self,
        run: &Run<'_>,
        transcode: &TranscodeCommand,
        command: &PackagingCommand,
        output_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<(), AppError> {
        log::debug!(
            target: "dash_encode::encoder",
            "MP4Box command: {}",
            command.rendered
        );
        run.report(EncodeStage::Dashify, 0.0);

        let result = run_process(
            &self.tools.mp4box,
            &command.args,
            &mut |_| {},
            &mut |_| {},
            cancel,
        );

        // Packaged or not, the per-stream MP4s are no longer needed.
        let intermediates: Vec<&Path> = transcode
            .video
            .iter()
            .map(|c| c.path())
            .chain(transcode.audio.iter().map(|c| c.path()))
            .collect();
        let subtitle_paths: Vec<&Path> = transcode.subtitle.iter().map(|c| c.path()).collect();

        let outcome = match result {
            Ok(output) if output.success() && command.mpd_path.is_file() => Ok(()),
            Ok(output) if output.success() => {
                remove_partial_manifest(command, output_dir);
                Err(AppError::ManifestNotCreated(command.mpd_path.clone()))
            }
            Ok(output) => {
                remove_partial_manifest(command, output_dir);
                if cancel.is_cancelled() {
                    Err(AppError::cancelled())
                } else {
                    Err(AppError::PackagingFailed {
                        code: output.exit_code,
                        command: command.rendered.clone(),
                        transcode_command: transcode.rendered.clone(),
                        log: output.log(),
                    })
                }
            }
            Err(e) => {
                remove_partial_manifest(command, output_dir);
                if e.is_cancelled() {
                    Err(e)
                } else {
                    Err(AppError::PackagingFailed {
                        code: -1,
                        command: command.rendered.clone(),
                        transcode_command: transcode.rendered.clone(),
                        log: e.to_string(),
                    })
                }
            }
        };

        clean_files(&intermediates);
        if outcome.is_err() {
            clean_files(&subtitle_paths);
        } else {
            run.report(EncodeStage::Dashify, 1.0);
        }
        outcome
    }
}

/// Delete what a failed or abandoned packaging run left in `output_dir`: the
/// segment files MP4Box names after its inputs, every file the manifest
/// references, and the manifest itself.
fn remove_partial_manifest(command: &PackagingCommand, output_dir: &Path) {
    clean_files(&command.segment_paths);
    let mpd_path = &command.mpd_path;
    if !mpd_path.is_file() {
        return;
    }
    match manifest::load(mpd_path) {
        Ok(mpd) => clean_files(
            manifest::media_files(&mpd)
                .iter()
                .map(|f| output_dir.join(f)),
        ),
        Err(e) => log::warn!(
            target: "dash_encode::encoder",
            "Could not read partial manifest {}: {}",
            mpd_path.display(),
            e
        ),
    }
    clean_files([mpd_path]);
}

/// Run [`Encoder::encode`] on the blocking thread pool.
pub async fn encode_async(
    encoder: Arc<Encoder>,
    config: EncodeConfig,
    progress: Option<ProgressCallback>,
    cancel: CancelToken,
) -> Result<EncodeResult, AppError> {
    tokio::task::spawn_blocking(move || encoder.encode(&config, progress, &cancel))
        .await
        .map_err(|e| AppError::from(format!("Encode task failed: {}", e)))?
}
