use std::path::Path;

use super::model::{AdaptationSet, Descriptor, Mpd, ProgramInformation, Representation};
use super::{load, max_representation_id, save};
use crate::command::SubtitleStreamCommand;
use crate::error::AppError;

pub const SUBTITLE_ROLE_SCHEME: &str = "urn:gpac:dash:role:2013";
/// Nominal bandwidth advertised for WebVTT representations.
pub const SUBTITLE_BANDWIDTH: u64 = 256;

/// Replacement ProgramInformation. Both fields unset removes the element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInfo {
    pub title: Option<String>,
    pub more_information_url: Option<String>,
}

impl ProgramInfo {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.more_information_url.is_none()
    }
}

pub fn apply_program_info(mpd: &mut Mpd, info: &ProgramInfo) {
    mpd.program_information = if info.is_empty() {
        None
    } else {
        Some(ProgramInformation {
            title: info.title.clone(),
            more_information_url: info.more_information_url.clone(),
        })
    };
}

/// One text/vtt AdaptationSet holding a single Representation with `id`.
pub fn subtitle_adaptation_set(id: u64, subtitle: &SubtitleStreamCommand) -> AdaptationSet {
    let file_name = subtitle
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    AdaptationSet {
        mime_type: Some("text/vtt".to_string()),
        lang: Some(subtitle.language.clone()),
        content_type: Some("text".to_string()),
        role: Some(Descriptor {
            scheme_id_uri: SUBTITLE_ROLE_SCHEME.to_string(),
            value: Some(format!("{} {}", subtitle.language, id)),
        }),
        representations: vec![Representation {
            id: id.to_string(),
            bandwidth: SUBTITLE_BANDWIDTH,
            base_urls: vec![file_name],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Append one subtitle AdaptationSet per subtitle to every period, taking ids
/// from `next_id` upwards. Returns the next unused id.
pub fn add_subtitles(mpd: &mut Mpd, subtitles: &[SubtitleStreamCommand], next_id: u64) -> u64 {
    let mut next_id = next_id;
    for period in &mut mpd.periods {
        for subtitle in subtitles {
            period
                .adaptation_sets
                .push(subtitle_adaptation_set(next_id, subtitle));
            next_id += 1;
        }
    }
    next_id
}

/// Load the packaged manifest, fix program information, merge subtitles and
/// write it back in place.
pub fn post_process_file(
    path: &Path,
    subtitles: &[SubtitleStreamCommand],
    program_info: &ProgramInfo,
) -> Result<Mpd, AppError> {
    let mut mpd = load(path)?;
    apply_program_info(&mut mpd, program_info);

    let first_id = max_representation_id(&mpd) + 1;
    let next_id = add_subtitles(&mut mpd, subtitles, first_id);
    log::debug!(
        target: "dash_encode::manifest",
        "Added {} subtitle representation(s) to {} (ids {}..{})",
        next_id - first_id,
        path.display(),
        first_id,
        next_id
    );

    save(&mpd, path)?;
    Ok(mpd)
}
