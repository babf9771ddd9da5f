pub mod cancel;
pub mod command;
pub mod config;
pub mod copy_infer;
pub mod encoder;
pub mod error;
pub mod ffmpeg;
pub mod files;
pub mod manifest;
pub mod media;
pub mod quality;
pub mod sidecar_api;
pub mod subtitles;
#[cfg(feature = "integration-test-api")]
pub mod test_support;

pub use cancel::CancelToken;
pub use config::{DownmixMode, EncodeConfig, EncodeOptions};
pub use encoder::{EncodeResult, EncodeStage, EncodeStageProgress, Encoder, encode_async};
pub use error::AppError;
pub use quality::{DefaultQuality, Quality};
