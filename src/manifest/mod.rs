//! DASH manifest model, load/save, and post-processing of packager output.

mod model;
mod postprocess;

use std::path::Path;

use serde::Serialize;

use crate::error::AppError;

pub use model::{
    AdaptationSet, Descriptor, Initialization, MPD_NAMESPACE, Mpd, Period, ProgramInformation,
    Representation, SegmentBase, SegmentTemplate,
};
pub use postprocess::{
    ProgramInfo, SUBTITLE_BANDWIDTH, SUBTITLE_ROLE_SCHEME, add_subtitles, apply_program_info,
    post_process_file, subtitle_adaptation_set,
};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

pub fn parse(xml: &str) -> Result<Mpd, AppError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// Render with an XML declaration and the MPD namespace on the root element.
pub fn to_xml(mpd: &Mpd) -> Result<String, AppError> {
    let mut mpd = mpd.clone();
    mpd.xmlns = Some(MPD_NAMESPACE.to_string());

    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::with_root(&mut body, Some("MPD"))?;
    serializer.indent(' ', 2);
    mpd.serialize(serializer)?;

    Ok(format!("{}{}\n", XML_DECLARATION, body))
}

pub fn load(path: &Path) -> Result<Mpd, AppError> {
    let xml = std::fs::read_to_string(path)?;
    parse(&xml)
}

pub fn save(mpd: &Mpd, path: &Path) -> Result<(), AppError> {
    std::fs::write(path, to_xml(mpd)?)?;
    Ok(())
}

/// Every Representation BaseURL in document order.
pub fn media_files(mpd: &Mpd) -> Vec<String> {
    mpd.representations()
        .flat_map(|r| r.base_urls.iter().cloned())
        .collect()
}

/// Highest Representation id that parses as an unsigned integer; 0 if none do.
pub fn max_representation_id(mpd: &Mpd) -> u64 {
    mpd.representations()
        .filter_map(|r| r.id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}
