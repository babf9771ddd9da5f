//! App error type for the encoder and sidecar. Implements Display and Serialize for RPC clients.

use std::path::PathBuf;

use crate::ffmpeg::parse_tool_error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    ToolNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("No usable video stream in {}", .0.display())]
    NoVideoStream(PathBuf),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg failed (code {code}): {command}")]
    TranscodeFailed {
        code: i32,
        command: String,
        log: String,
    },

    #[error("MP4Box failed (code {code}): {command}")]
    PackagingFailed {
        code: i32,
        command: String,
        transcode_command: String,
        log: String,
    },

    #[error("MP4Box exited successfully but no manifest was written to {}", .0.display())]
    ManifestNotCreated(PathBuf),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),
}

impl AppError {
    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AppError::TranscodeFailed { code, log, .. }
            | AppError::PackagingFailed { code, log, .. } => {
                let payload = parse_tool_error(log, Some(*code));
                let json =
                    serde_json::json!({ "summary": payload.summary, "detail": payload.detail });
                serializer.serialize_str(&json.to_string())
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<quick_xml::DeError> for AppError {
    fn from(err: quick_xml::DeError) -> Self {
        AppError::Manifest(err.to_string())
    }
}

impl From<quick_xml::SeError> for AppError {
    fn from(err: quick_xml::SeError) -> Self {
        AppError::Manifest(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        if s == "Cancelled" {
            AppError::Cancelled
        } else {
            AppError::Message(s)
        }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}
