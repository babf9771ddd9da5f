pub mod discovery;
mod error;
pub mod ffprobe;
mod progress;
mod runner;

pub use discovery::{Tool, ToolPaths, get_tool_path};
pub use error::{ToolErrorPayload, parse_tool_error};
pub use progress::{parse_encode_progress, parse_timestamp};
pub use runner::{RunOutput, run_process};

use std::path::Path;

/// Converts a path to a String for argv and log output.
pub fn path_to_string(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}
