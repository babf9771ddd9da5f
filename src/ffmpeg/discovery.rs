use crate::error::AppError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

/// An external tool the encoder drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
    Mp4Box,
}

impl Tool {
    fn binary_name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
            Tool::Mp4Box => "MP4Box",
        }
    }

    fn env_var(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "FFMPEG_PATH",
            Tool::Ffprobe => "FFPROBE_PATH",
            Tool::Mp4Box => "MP4BOX_PATH",
        }
    }

    fn install_hint(self) -> &'static str {
        match self {
            Tool::Ffmpeg | Tool::Ffprobe => {
                "  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: Download from https://ffmpeg.org/download.html"
            }
            Tool::Mp4Box => {
                "  - macOS: brew install gpac\n  - Linux: sudo apt install gpac\n  - Windows: Download from https://gpac.io/downloads/"
            }
        }
    }
}

/// Resolved paths to the three external tools.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub mp4box: PathBuf,
}

impl ToolPaths {
    pub fn new(
        ffmpeg: impl Into<PathBuf>,
        ffprobe: impl Into<PathBuf>,
        mp4box: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            mp4box: mp4box.into(),
        }
    }

    /// Resolve all three tools (env override, common paths, PATH).
    pub fn discover() -> Result<Self, AppError> {
        Ok(Self {
            ffmpeg: get_tool_path(Tool::Ffmpeg)?.to_path_buf(),
            ffprobe: get_tool_path(Tool::Ffprobe)?.to_path_buf(),
            mp4box: get_tool_path(Tool::Mp4Box)?.to_path_buf(),
        })
    }

    /// Fails if any configured path does not point at an existing file.
    pub fn validate(&self) -> Result<(), AppError> {
        for (tool, path) in [
            (Tool::Ffmpeg, &self.ffmpeg),
            (Tool::Ffprobe, &self.ffprobe),
            (Tool::Mp4Box, &self.mp4box),
        ] {
            if !path.is_file() {
                return Err(AppError::ToolNotFound(format!(
                    "{} not found at {}",
                    tool.binary_name(),
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn find_in_path(name: &str) -> Option<PathBuf> {
    let output = Command::new("where").arg(name).output().ok()?;
    first_line_path(output)
}

#[cfg(not(target_os = "windows"))]
fn find_in_path(name: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(name).output().ok()?;
    first_line_path(output)
}

fn first_line_path(output: std::process::Output) -> Option<PathBuf> {
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout);
    let first = path.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(PathBuf::from(first))
    }
}

fn common_dirs() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/opt/local/bin"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin"),
            PathBuf::from("C:\\Program Files\\GPAC"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![PathBuf::from("/usr/bin"), PathBuf::from("/usr/local/bin")]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

fn executable_file_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Paths to try for ffprobe given an ffmpeg binary path (suffixed first, then plain).
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let parent = match ffmpeg_path.parent() {
        Some(p) => p,
        None => return vec![],
    };
    let mut candidates = Vec::with_capacity(2);
    let suffix = ffmpeg_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.strip_prefix("ffmpeg"))
        .filter(|suffix| !suffix.is_empty());
    if let Some(suffix) = suffix {
        candidates.push(parent.join(executable_file_name(&format!("ffprobe{suffix}"))));
    }
    candidates.push(parent.join(executable_file_name("ffprobe")));
    candidates
}

fn resolve_tool_path(tool: Tool) -> Result<PathBuf, AppError> {
    let name = tool.binary_name();

    if let Ok(env_path) = std::env::var(tool.env_var()) {
        let p = PathBuf::from(&env_path);
        if p.exists() {
            log::debug!(
                target: "dash_encode::ffmpeg::discovery",
                "{} path from {} env: {}",
                name,
                tool.env_var(),
                p.display()
            );
            return Ok(p);
        }
        log::warn!(
            target: "dash_encode::ffmpeg::discovery",
            "{} points at missing file {}; falling back to discovery",
            tool.env_var(),
            p.display()
        );
    }

    // ffprobe ships alongside ffmpeg, including suffixed bundle builds
    if tool == Tool::Ffprobe {
        if let Ok(ffmpeg) = get_tool_path(Tool::Ffmpeg) {
            if let Some(p) = ffprobe_candidates(ffmpeg).into_iter().find(|c| c.exists()) {
                return Ok(p);
            }
        }
    }

    for dir in common_dirs() {
        let path = dir.join(executable_file_name(name));
        if path.exists() {
            log::debug!(
                target: "dash_encode::ffmpeg::discovery",
                "{} found in common path: {}",
                name,
                path.display()
            );
            return Ok(path);
        }
    }

    if let Some(p) = find_in_path(name).filter(|p| p.exists()) {
        log::debug!(
            target: "dash_encode::ffmpeg::discovery",
            "{} found in PATH: {}",
            name,
            p.display()
        );
        return Ok(p);
    }

    log::error!(
        target: "dash_encode::ffmpeg::discovery",
        "{} not found in PATH or common locations",
        name
    );
    Err(AppError::ToolNotFound(format!(
        "{} not found. Please install it or set {}:\n{}",
        name,
        tool.env_var(),
        tool.install_hint()
    )))
}

static FFMPEG_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();
static FFPROBE_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();
static MP4BOX_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get a tool path. Cached for process lifetime; failures are not cached.
pub fn get_tool_path(tool: Tool) -> Result<&'static Path, AppError> {
    let cache = match tool {
        Tool::Ffmpeg => &FFMPEG_PATH_CACHE,
        Tool::Ffprobe => &FFPROBE_PATH_CACHE,
        Tool::Mp4Box => &MP4BOX_PATH_CACHE,
    };
    if let Some(path) = cache.get() {
        return Ok(path.as_path());
    }
    let resolved = resolve_tool_path(tool)?;
    Ok(cache.get_or_init(|| resolved).as_path())
}
