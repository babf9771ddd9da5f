//! Probed media description consumed by the ladder, copy inference and command generators.

use std::collections::BTreeMap;

/// One probed stream.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamInfo {
    /// Ordinal of the stream in the source container, used for `-map 0:<index>`.
    pub index: u32,
    pub codec_name: String,
    /// Bits per second; 0 when the container does not report it.
    pub bit_rate: u64,
    pub pix_fmt: String,
    pub profile: String,
    /// H.264 style integer level (e.g. 40 for 4.0); 0 when unknown.
    pub level: i32,
    pub width: u32,
    pub height: u32,
    pub avg_frame_rate: String,
    pub r_frame_rate: String,
    pub channels: u32,
    pub duration: f64,
    pub is_default: bool,
    pub tags: BTreeMap<String, String>,
}

impl MediaStreamInfo {
    /// Case-insensitive tag lookup.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn language(&self) -> Option<&str> {
        self.tag("language").filter(|l| !l.trim().is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.tag("title").filter(|t| !t.trim().is_empty())
    }

    /// False for attachment-like streams: cover images, and streams that have
    /// neither a usable bitrate nor a frame rate.
    pub fn is_valid(&self) -> bool {
        if self
            .tag("MIMETYPE")
            .is_some_and(|m| m.to_ascii_lowercase().starts_with("image/"))
        {
            return false;
        }
        let tagged_bps = self.tag("BPS").filter(|b| !b.trim().is_empty());
        let lacks_bitrate = self.bit_rate == 0 || tagged_bps.is_some_and(|b| b != "0");
        !(lacks_bitrate && self.avg_frame_rate == "0/0")
    }

    /// Bitrate from the stream, falling back to the Matroska `BPS` statistics tag.
    pub fn effective_bit_rate(&self) -> u64 {
        if self.bit_rate > 0 {
            return self.bit_rate;
        }
        self.tag("BPS")
            .and_then(|b| b.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Aggregated probe result for one input file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub video_streams: Vec<MediaStreamInfo>,
    pub audio_streams: Vec<MediaStreamInfo>,
    pub subtitle_streams: Vec<MediaStreamInfo>,
    /// Source bitrate in bits per second.
    pub bit_rate: u64,
    pub framerate: f64,
    pub duration: f64,
    /// Container tags with lower-cased keys.
    pub tags: BTreeMap<String, String>,
}

impl MediaMetadata {
    /// Source bitrate in kb/s, as used by the quality crusher.
    pub fn kbit_rate(&self) -> u32 {
        u32::try_from(self.bit_rate / 1024).unwrap_or(u32::MAX)
    }

    /// Video streams that carry real media.
    pub fn valid_video_streams(&self) -> Vec<MediaStreamInfo> {
        self.video_streams
            .iter()
            .filter(|s| s.is_valid())
            .cloned()
            .collect()
    }

    /// Duration of the first video stream, else of the container.
    pub fn media_duration(&self) -> f64 {
        self.video_streams
            .first()
            .map(|s| s.duration)
            .filter(|d| *d > 0.0)
            .unwrap_or(self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with_tags(tags: &[(&str, &str)]) -> MediaStreamInfo {
        MediaStreamInfo {
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn image_attachment_is_invalid() {
        let mut s = stream_with_tags(&[("mimetype", "image/jpeg")]);
        s.bit_rate = 1000;
        s.avg_frame_rate = "25/1".into();
        assert!(!s.is_valid());
    }

    #[test]
    fn no_bitrate_and_no_frame_rate_is_invalid() {
        let mut s = stream_with_tags(&[]);
        s.avg_frame_rate = "0/0".into();
        assert!(!s.is_valid());
    }

    #[test]
    fn no_bitrate_but_frame_rate_is_valid() {
        let mut s = stream_with_tags(&[]);
        s.avg_frame_rate = "24000/1001".into();
        assert!(s.is_valid());
    }

    #[test]
    fn effective_bit_rate_falls_back_to_bps_tag() {
        let s = stream_with_tags(&[("BPS-eng", "1"), ("BPS", "4500000")]);
        assert_eq!(s.effective_bit_rate(), 4_500_000);
    }

    #[test]
    fn media_duration_prefers_video_stream() {
        let meta = MediaMetadata {
            video_streams: vec![MediaStreamInfo {
                duration: 12.5,
                ..Default::default()
            }],
            duration: 13.0,
            ..Default::default()
        };
        assert_eq!(meta.media_duration(), 12.5);
        assert_eq!(MediaMetadata::default().media_duration(), 0.0);
    }

    #[test]
    fn kbit_rate_uses_1024_divisor() {
        let meta = MediaMetadata {
            bit_rate: 2_048_000,
            ..Default::default()
        };
        assert_eq!(meta.kbit_rate(), 2000);
    }
}
