//! Subtitle files that live outside the packaged MP4s: relocation of
//! extracted streams and discovery of sidecar `.vtt` files next to the input.

use std::path::{Path, PathBuf};

use crate::command::SubtitleStreamCommand;
use crate::error::AppError;
use crate::ffmpeg::path_to_string;
use crate::files::clean_files;

/// `(ISO 639-1, ISO 639-2/B, ISO 639-2/T)`. Lookups normalise to 639-2/B.
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("ar", "ara", "ara"),
    ("bg", "bul", "bul"),
    ("ca", "cat", "cat"),
    ("cs", "cze", "ces"),
    ("da", "dan", "dan"),
    ("de", "ger", "deu"),
    ("el", "gre", "ell"),
    ("en", "eng", "eng"),
    ("es", "spa", "spa"),
    ("et", "est", "est"),
    ("fa", "per", "fas"),
    ("fi", "fin", "fin"),
    ("fr", "fre", "fra"),
    ("he", "heb", "heb"),
    ("hi", "hin", "hin"),
    ("hr", "hrv", "hrv"),
    ("hu", "hun", "hun"),
    ("id", "ind", "ind"),
    ("is", "ice", "isl"),
    ("it", "ita", "ita"),
    ("ja", "jpn", "jpn"),
    ("ko", "kor", "kor"),
    ("lt", "lit", "lit"),
    ("lv", "lav", "lav"),
    ("ms", "may", "msa"),
    ("nl", "dut", "nld"),
    ("no", "nor", "nor"),
    ("pl", "pol", "pol"),
    ("pt", "por", "por"),
    ("ro", "rum", "ron"),
    ("ru", "rus", "rus"),
    ("sk", "slo", "slk"),
    ("sl", "slv", "slv"),
    ("sr", "srp", "srp"),
    ("sv", "swe", "swe"),
    ("th", "tha", "tha"),
    ("tr", "tur", "tur"),
    ("uk", "ukr", "ukr"),
    ("vi", "vie", "vie"),
    ("zh", "chi", "zho"),
];

pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Normalised language code for `token`, if it names a known language.
pub fn lookup_language(token: &str) -> Option<&'static str> {
    let token = token.trim();
    LANGUAGES
        .iter()
        .find(|(one, bib, term)| {
            [one, bib, term]
                .iter()
                .any(|code| code.eq_ignore_ascii_case(token))
        })
        .map(|(_, bib, _)| *bib)
}

/// Language of a sidecar file name like `movie.en.forced.vtt`: the first
/// dot component between the stem and the extension that is a known code.
pub fn language_from_file_name(file_name: &str) -> &'static str {
    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() <= 2 {
        return UNDETERMINED_LANGUAGE;
    }
    parts[1..parts.len() - 1]
        .iter()
        .find_map(|p| lookup_language(p))
        .unwrap_or(UNDETERMINED_LANGUAGE)
}

/// Move extracted subtitle files into `output_dir`, replacing existing files.
/// Returns the commands with their paths updated.
pub fn relocate(
    subtitles: Vec<SubtitleStreamCommand>,
    output_dir: &Path,
) -> Result<Vec<SubtitleStreamCommand>, AppError> {
    subtitles
        .into_iter()
        .map(|mut sub| {
            let Some(file_name) = sub.path.file_name() else {
                return Ok(sub);
            };
            let target = output_dir.join(file_name);
            if target != sub.path {
                if target.exists() {
                    std::fs::remove_file(&target)?;
                }
                move_file(&sub.path, &target)?;
                sub.path = target;
            }
            Ok(sub)
        })
        .collect()
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Copy `.vtt` files next to `input_path` that share its file stem into
/// `output_dir`, numbering them from `start_index`.
pub fn discover_sidecars(
    input_path: &Path,
    output_dir: &Path,
    output_base: &str,
    start_index: u32,
) -> Result<Vec<SubtitleStreamCommand>, AppError> {
    let (Some(dir), Some(stem)) = (input_path.parent(), input_path.file_stem()) else {
        return Ok(Vec::new());
    };
    let stem = stem.to_string_lossy();

    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(stem.as_ref()) && n.ends_with(".vtt"))
        .collect();
    names.sort();

    let mut index = start_index;
    let mut found: Vec<SubtitleStreamCommand> = Vec::with_capacity(names.len());
    for name in names {
        let language = language_from_file_name(&name);
        let target = output_dir.join(format!(
            "{}_subtitle_{}_{}.vtt",
            output_base, language, index
        ));
        if let Err(e) = std::fs::copy(dir.join(&name), &target) {
            clean_files(found.iter().map(|c| c.path.as_path()));
            return Err(e.into());
        }
        log::debug!(
            target: "dash_encode::subtitles",
            "Found sidecar subtitle {} ({}) -> {}",
            name,
            language,
            target.display()
        );
        found.push(SubtitleStreamCommand {
            index,
            language: format!("{}_{}", language, index),
            args: vec![path_to_string(&target)],
            path: target,
        });
        index += 1;
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes_normalise() {
        assert_eq!(lookup_language("en"), Some("eng"));
        assert_eq!(lookup_language("ENG"), Some("eng"));
        assert_eq!(lookup_language("deu"), Some("ger"));
        assert_eq!(lookup_language("xx"), None);
    }

    #[test]
    fn language_from_dot_components() {
        assert_eq!(language_from_file_name("movie.en.vtt"), "eng");
        assert_eq!(language_from_file_name("movie.forced.fr.vtt"), "fre");
        assert_eq!(language_from_file_name("movie.vtt"), "und");
        assert_eq!(language_from_file_name("movie.commentary.vtt"), "und");
    }

    #[test]
    fn sidecars_are_copied_and_numbered() {
        let input_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("movie.mkv");
        std::fs::write(&input, b"x").unwrap();
        std::fs::write(input_dir.path().join("movie.en.vtt"), b"WEBVTT").unwrap();
        std::fs::write(input_dir.path().join("movie.zz.vtt"), b"WEBVTT").unwrap();
        std::fs::write(input_dir.path().join("movie.en.srt"), b"1").unwrap();
        std::fs::write(input_dir.path().join("other.en.vtt"), b"WEBVTT").unwrap();

        let subs = discover_sidecars(&input, output_dir.path(), "out", 7).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].index, 7);
        assert_eq!(subs[0].language, "eng_7");
        assert_eq!(subs[0].path, output_dir.path().join("out_subtitle_eng_7.vtt"));
        assert_eq!(subs[1].language, "und_8");
        assert!(subs[1].path.exists());
        assert!(input_dir.path().join("movie.en.vtt").exists());
    }

    #[test]
    fn relocate_moves_into_output_dir() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let src = work.path().join("m_subtitle_eng_2.vtt");
        std::fs::write(&src, b"WEBVTT").unwrap();
        std::fs::write(out.path().join("m_subtitle_eng_2.vtt"), b"stale").unwrap();

        let moved = relocate(
            vec![SubtitleStreamCommand {
                index: 2,
                language: "eng".into(),
                path: src.clone(),
                args: Vec::new(),
            }],
            out.path(),
        )
        .unwrap();

        let target = out.path().join("m_subtitle_eng_2.vtt");
        assert_eq!(moved[0].path, target);
        assert!(!src.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"WEBVTT");
    }
}
