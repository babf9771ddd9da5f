//! Request handling behind the sidecar's JSON-lines methods.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::{EncodeConfig, EncodeOptions};
use crate::encoder::{Encoder, ProgressCallback, encode_async};
use crate::error::AppError;
use crate::ffmpeg::{Tool, ToolPaths, ffprobe, get_tool_path};
use crate::media::MediaMetadata;
use crate::quality::{DEFAULT_PRESET, DefaultQuality, Quality};

const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCapabilitiesResult {
    pub protocol_version: u8,
    pub tools: ToolPaths,
}

/// Parameters of `dash.encode`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashEncodeParams {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub output_name: Option<String>,
    /// Built-in ladder, used when `qualities` is absent.
    pub quality: Option<DefaultQuality>,
    pub qualities: Option<Vec<Quality>>,
    /// x264 preset for the built-in ladder.
    pub preset: Option<String>,
    pub framerate: Option<u32>,
    pub keyframe_interval: Option<u32>,
    #[serde(default)]
    pub options: EncodeOptions,
}

impl DashEncodeParams {
    fn ladder(&self) -> Vec<Quality> {
        match &self.qualities {
            Some(qualities) => qualities.clone(),
            None => self
                .quality
                .unwrap_or_default()
                .ladder(self.preset.as_deref().unwrap_or(DEFAULT_PRESET)),
        }
    }

    pub fn into_config(self) -> Result<EncodeConfig, AppError> {
        let ladder = self.ladder();
        Ok(EncodeConfig::new(
            &self.input_path,
            &self.output_dir,
            ladder,
            self.output_name.as_deref(),
        )?
        .with_framerate(self.framerate.unwrap_or(0))
        .with_keyframe_interval(self.keyframe_interval.unwrap_or(0))
        .with_options(self.options))
    }
}

/// Result of `dash.encode`.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashEncodeSummary {
    pub mpd_path: PathBuf,
    pub media_files: Vec<String>,
    pub duration: f64,
    pub ffmpeg_command: String,
    pub mp4box_command: String,
}

fn block_on_async<T>(future: impl Future<Output = Result<T, AppError>>) -> Result<T, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::from(format!("Failed to initialize async runtime: {}", e)))?;
    runtime.block_on(future)
}

pub fn app_capabilities() -> Result<AppCapabilitiesResult, AppError> {
    Ok(AppCapabilitiesResult {
        protocol_version: PROTOCOL_VERSION,
        tools: ToolPaths::discover()?,
    })
}

pub fn probe_media(input_path: PathBuf) -> Result<MediaMetadata, AppError> {
    let ffprobe_path = get_tool_path(Tool::Ffprobe)?;
    ffprobe::probe(ffprobe_path, &input_path)
}

/// Run a full encode with the discovered tools, reporting stage progress to
/// `event_emitter`. Blocks the calling thread.
pub fn dash_encode_with_events(
    params: DashEncodeParams,
    event_emitter: Option<ProgressCallback>,
    cancel: CancelToken,
) -> Result<DashEncodeSummary, AppError> {
    let config = params.into_config()?;
    let encoder = Arc::new(Encoder::new(ToolPaths::discover()?)?);

    let result = block_on_async(encode_async(encoder, config, event_emitter, cancel))?;
    Ok(DashEncodeSummary {
        media_files: result.media_files(),
        mpd_path: result.mpd_path,
        duration: result.duration,
        ffmpeg_command: result.transcode_command.rendered,
        mp4box_command: result.packaging_command.rendered,
    })
}
