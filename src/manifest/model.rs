//! Serde mirror of the subset of the DASH MPD schema that MP4Box emits.
//!
//! Attributes use the `@name` convention of quick-xml. Elements the model does
//! not know are dropped when a document is loaded and saved again.

use serde::{Deserialize, Serialize};

pub const MPD_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mpd {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    #[serde(rename = "@profiles", default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<String>,
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub mpd_type: Option<String>,
    #[serde(rename = "@minBufferTime", default, skip_serializing_if = "Option::is_none")]
    pub min_buffer_time: Option<String>,
    #[serde(rename = "@maxSegmentDuration", default, skip_serializing_if = "Option::is_none")]
    pub max_segment_duration: Option<String>,
    #[serde(
        rename = "@mediaPresentationDuration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub media_presentation_duration: Option<String>,
    #[serde(rename = "ProgramInformation", default, skip_serializing_if = "Option::is_none")]
    pub program_information: Option<ProgramInformation>,
    #[serde(rename = "Period", default)]
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramInformation {
    #[serde(rename = "@moreInformationURL", default, skip_serializing_if = "Option::is_none")]
    pub more_information_url: Option<String>,
    #[serde(rename = "Title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@duration", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(rename = "AdaptationSet", default)]
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptationSet {
    #[serde(rename = "@contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "@group", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "@lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(rename = "@maxFrameRate", default, skip_serializing_if = "Option::is_none")]
    pub max_frame_rate: Option<String>,
    #[serde(rename = "@maxHeight", default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(rename = "@maxWidth", default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(rename = "@mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(rename = "@par", default, skip_serializing_if = "Option::is_none")]
    pub par: Option<String>,
    #[serde(rename = "@segmentAlignment", default, skip_serializing_if = "Option::is_none")]
    pub segment_alignment: Option<String>,
    #[serde(rename = "@startWithSAP", default, skip_serializing_if = "Option::is_none")]
    pub start_with_sap: Option<String>,
    #[serde(rename = "@subsegmentAlignment", default, skip_serializing_if = "Option::is_none")]
    pub subsegment_alignment: Option<String>,
    #[serde(
        rename = "@subsegmentStartsWithSAP",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub subsegment_starts_with_sap: Option<String>,
    #[serde(rename = "Role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Descriptor>,
    #[serde(rename = "SegmentTemplate", default, skip_serializing_if = "Option::is_none")]
    pub segment_template: Option<SegmentTemplate>,
    #[serde(rename = "Representation", default)]
    pub representations: Vec<Representation>,
}

/// `schemeIdUri`/`value` pair used by Role and AudioChannelConfiguration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "@schemeIdUri")]
    pub scheme_id_uri: String,
    #[serde(rename = "@value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(rename = "@codecs", default, skip_serializing_if = "Option::is_none")]
    pub codecs: Option<String>,
    #[serde(rename = "@width", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(rename = "@height", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "@frameRate", default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    #[serde(rename = "@sar", default, skip_serializing_if = "Option::is_none")]
    pub sar: Option<String>,
    #[serde(rename = "@audioSamplingRate", default, skip_serializing_if = "Option::is_none")]
    pub audio_sampling_rate: Option<String>,
    #[serde(rename = "@startWithSAP", default, skip_serializing_if = "Option::is_none")]
    pub start_with_sap: Option<String>,
    #[serde(rename = "@bandwidth", default)]
    pub bandwidth: u64,
    #[serde(
        rename = "AudioChannelConfiguration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_channel_configuration: Option<Descriptor>,
    #[serde(rename = "BaseURL", default, skip_serializing_if = "Vec::is_empty")]
    pub base_urls: Vec<String>,
    #[serde(rename = "SegmentBase", default, skip_serializing_if = "Option::is_none")]
    pub segment_base: Option<SegmentBase>,
    #[serde(rename = "SegmentTemplate", default, skip_serializing_if = "Option::is_none")]
    pub segment_template: Option<SegmentTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentBase {
    #[serde(rename = "@indexRange", default, skip_serializing_if = "Option::is_none")]
    pub index_range: Option<String>,
    #[serde(rename = "@indexRangeExact", default, skip_serializing_if = "Option::is_none")]
    pub index_range_exact: Option<String>,
    #[serde(rename = "Initialization", default, skip_serializing_if = "Option::is_none")]
    pub initialization: Option<Initialization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Initialization {
    #[serde(rename = "@range", default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentTemplate {
    #[serde(rename = "@duration", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(rename = "@initialization", default, skip_serializing_if = "Option::is_none")]
    pub initialization: Option<String>,
    #[serde(rename = "@media", default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(rename = "@startNumber", default, skip_serializing_if = "Option::is_none")]
    pub start_number: Option<u64>,
    #[serde(rename = "@timescale", default, skip_serializing_if = "Option::is_none")]
    pub timescale: Option<u64>,
}

impl Mpd {
    pub fn representations(&self) -> impl Iterator<Item = &Representation> {
        self.periods
            .iter()
            .flat_map(|p| &p.adaptation_sets)
            .flat_map(|a| &a.representations)
    }
}
