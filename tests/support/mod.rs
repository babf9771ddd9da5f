#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dash_encode_core::ffmpeg::ToolPaths;

/// Probe output served by the fake ffprobe: one 25 fps H.264 stream at
/// 2000 kb/s, one AAC track, one SubRip track and one PGS track.
pub const PROBE_JSON: &str = r#"{
  "streams": [
    {
      "index": 0, "codec_type": "video", "codec_name": "h264", "profile": "High",
      "level": 40, "pix_fmt": "yuv420p", "width": 1280, "height": 720,
      "r_frame_rate": "25/1", "avg_frame_rate": "25/1", "bit_rate": "2048000",
      "duration": "10.000000", "disposition": { "default": 1 }
    },
    {
      "index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2,
      "bit_rate": "128000", "avg_frame_rate": "0/0",
      "disposition": { "default": 1 }, "tags": { "language": "eng", "title": "Stereo" }
    },
    {
      "index": 2, "codec_type": "subtitle", "codec_name": "subrip",
      "tags": { "language": "fre" }
    },
    {
      "index": 3, "codec_type": "subtitle", "codec_name": "hdmv_pgs_subtitle"
    }
  ],
  "format": { "duration": "10.000000", "bit_rate": "2200000" }
}"#;

const FFPROBE_TEMPLATE: &str = r#"#!/bin/sh
cat <<'JSON'
@PROBE@
JSON
"#;

/// Touches every `.mp4`/`.vtt` output argument, reports one status line and
/// exits with the configured code.
const FFMPEG_TEMPLATE: &str = r#"#!/bin/sh
prev=""
for a in "$@"; do
  if [ "$prev" != "-i" ]; then
    case "$a" in
      *.mp4|*.vtt) : > "$a" ;;
    esac
  fi
  prev="$a"
done
echo "frame=  125 fps=0.0 q=-1.0 size=     256kB time=00:00:05.00 bitrate= 419.4kbits/s speed=10x" >&2
@SLEEP@
exit @EXIT@
"#;

/// Writes a minimal manifest at `-out` with one Representation per input and
/// touches a `<name>_dashinit.mp4` segment file for each.
const MP4BOX_TEMPLATE: &str = r#"#!/bin/sh
out=""
inputs=0
id=0
reps=""
while [ $# -gt 0 ]; do
  if [ "$inputs" = 1 ]; then
    path="${1%%:role=*}"
    name=$(basename "$path" .mp4)
    id=$((id + 1))
    reps="$reps<Representation id=\"$id\" mimeType=\"video/mp4\" bandwidth=\"1000\"><BaseURL>${name}_dashinit.mp4</BaseURL></Representation>"
    : > "$(dirname "$out")/${name}_dashinit.mp4"
  else
    case "$1" in
      -out) out="$2"; shift ;;
      --) inputs=1 ;;
    esac
  fi
  shift
done
if [ "@MANIFEST@" = "garbage" ]; then
  printf '<MPD><Period>' > "$out"
elif [ "@MANIFEST@" = "valid" ]; then
  cat > "$out" <<MPD
<?xml version="1.0"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011" mediaPresentationDuration="PT10S">
 <ProgramInformation moreInformationURL="http://gpac.io"><Title>fake</Title></ProgramInformation>
 <Period duration="PT10S"><AdaptationSet segmentAlignment="true">$reps</AdaptationSet></Period>
</MPD>
MPD
fi
@SLEEP@
exit @EXIT@
"#;

/// What the fake MP4Box leaves at its `-out` path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeManifest {
    Valid,
    Missing,
    /// An ill-formed document.
    Garbage,
}

impl FakeManifest {
    fn as_str(self) -> &'static str {
        match self {
            FakeManifest::Valid => "valid",
            FakeManifest::Missing => "missing",
            FakeManifest::Garbage => "garbage",
        }
    }
}

/// Configures the fake tools' behavior.
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    pub ffmpeg_exit: i32,
    /// Seconds the fake FFmpeg sleeps after writing its outputs.
    pub ffmpeg_sleep: u32,
    /// When false the script is written without execute permission.
    pub ffmpeg_executable: bool,
    pub mp4box_exit: i32,
    /// Seconds the fake MP4Box sleeps after writing the manifest.
    pub mp4box_sleep: u32,
    pub mp4box_executable: bool,
    pub mp4box_manifest: FakeManifest,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            ffmpeg_exit: 0,
            ffmpeg_sleep: 0,
            ffmpeg_executable: true,
            mp4box_exit: 0,
            mp4box_sleep: 0,
            mp4box_executable: true,
            mp4box_manifest: FakeManifest::Valid,
        }
    }
}

/// Scratch layout for one pipeline run: fake tools, an input file, a working
/// dir for intermediates and an output dir.
pub struct FakeEnv {
    dir: tempfile::TempDir,
    pub tools: ToolPaths,
    pub input: PathBuf,
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str, executable: bool) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, body).expect("write fake tool");
    let mode = if executable { 0o755 } else { 0o644 };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .expect("chmod fake tool");
}

fn sleep_line(seconds: u32) -> String {
    if seconds > 0 {
        format!("exec sleep {}", seconds)
    } else {
        String::new()
    }
}

#[cfg(unix)]
impl FakeEnv {
    pub fn new(behavior: FakeBehavior) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        let input_dir = dir.path().join("input");
        let work_dir = dir.path().join("work");
        let output_dir = dir.path().join("output");
        for d in [&bin, &input_dir, &work_dir, &output_dir] {
            std::fs::create_dir_all(d).expect("create dir");
        }

        let ffmpeg = bin.join("ffmpeg");
        write_script(
            &ffmpeg,
            &FFMPEG_TEMPLATE
                .replace("@SLEEP@", &sleep_line(behavior.ffmpeg_sleep))
                .replace("@EXIT@", &behavior.ffmpeg_exit.to_string()),
            behavior.ffmpeg_executable,
        );
        let ffprobe = bin.join("ffprobe");
        write_script(&ffprobe, &FFPROBE_TEMPLATE.replace("@PROBE@", PROBE_JSON), true);
        let mp4box = bin.join("MP4Box");
        write_script(
            &mp4box,
            &MP4BOX_TEMPLATE
                .replace("@MANIFEST@", behavior.mp4box_manifest.as_str())
                .replace("@SLEEP@", &sleep_line(behavior.mp4box_sleep))
                .replace("@EXIT@", &behavior.mp4box_exit.to_string()),
            behavior.mp4box_executable,
        );

        let input = input_dir.join("movie.mkv");
        std::fs::write(&input, b"not really a movie").expect("write input");

        Self {
            dir,
            tools: ToolPaths::new(ffmpeg, ffprobe, mp4box),
            input,
            work_dir,
            output_dir,
        }
    }

    pub fn input_dir(&self) -> &Path {
        self.input.parent().expect("input has parent")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Sorted file names in `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
