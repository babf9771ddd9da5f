//! Quality ladder rungs, built-in ladders, and ladder crushing against the source bitrate.

use std::collections::HashSet;

pub const DEFAULT_PRESET: &str = "medium";
pub const DEFAULT_PROFILE: &str = "high";
pub const DEFAULT_LEVEL: &str = "4.0";
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Ladder entries at or above `input_kbps * DEFAULT_CRUSH_TOLERANCE` are dropped.
pub const DEFAULT_CRUSH_TOLERANCE: f64 = 0.95;

/// One ladder rung. A bitrate of 0 means "keep the source stream's quality".
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quality {
    pub width: u32,
    pub height: u32,
    /// Target bitrate in kb/s.
    pub bitrate: u32,
    pub preset: String,
    pub profile: String,
    pub level: String,
    pub pixel_format: String,
}

impl Default for Quality {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            bitrate: 0,
            preset: DEFAULT_PRESET.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

/// Rungs are identified by bitrate alone.
impl PartialEq for Quality {
    fn eq(&self, other: &Self) -> bool {
        self.bitrate == other.bitrate
    }
}

impl Eq for Quality {}

impl std::hash::Hash for Quality {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bitrate.hash(state);
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ {} kb/s - {}",
            self.width, self.height, self.bitrate, self.preset
        )
    }
}

impl Quality {
    pub fn new(width: u32, height: u32, bitrate: u32, preset: impl Into<String>) -> Self {
        Self {
            width,
            height,
            bitrate,
            preset: preset.into(),
            ..Default::default()
        }
    }

    /// The "copy" rung: no size, no bitrate, no preset.
    pub fn copy() -> Self {
        Self::new(0, 0, 0, "")
    }

    pub fn is_copy(&self) -> bool {
        self.bitrate == 0
    }

    pub fn has_size(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Built-in ladders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultQuality {
    Potato,
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

impl DefaultQuality {
    /// Three-rung ladder for this level, highest bitrate first.
    pub fn ladder(self, preset: &str) -> Vec<Quality> {
        let rungs: [(u32, u32, u32); 3] = match self {
            DefaultQuality::Potato => [(1280, 720, 1600), (854, 480, 800), (640, 360, 500)],
            DefaultQuality::Low => [(1280, 720, 2400), (1280, 720, 1600), (640, 360, 700)],
            DefaultQuality::Medium => [(1920, 1080, 3400), (1280, 720, 1800), (640, 360, 800)],
            DefaultQuality::High => [(1920, 1080, 6000), (1920, 1080, 4000), (1280, 720, 2000)],
            DefaultQuality::Ultra => [(1920, 1080, 8000), (1920, 1080, 6000), (1280, 720, 2000)],
        };
        rungs
            .into_iter()
            .map(|(w, h, b)| Quality::new(w, h, b, preset))
            .collect()
    }
}

/// Drop rungs that would not be meaningfully below the source bitrate.
///
/// Rungs with `bitrate < input_kbps * tolerance` are kept (deduplicated by
/// bitrate, first wins). If any rung was dropped and no copy rung survives, a
/// copy rung inheriting level, pixel format and profile from the first rung of
/// the original ladder is prepended. If nothing was dropped the ladder is
/// returned unchanged.
pub fn crush_qualities(qualities: &[Quality], input_kbps: u32, tolerance: f64) -> Vec<Quality> {
    let Some(first) = qualities.first() else {
        return Vec::new();
    };

    let threshold = f64::from(input_kbps) * tolerance;
    let mut seen = HashSet::new();
    let crushed: Vec<Quality> = qualities
        .iter()
        .filter(|q| f64::from(q.bitrate) < threshold)
        .filter(|q| seen.insert(q.bitrate))
        .cloned()
        .collect();

    if crushed.len() == qualities.len() {
        return qualities.to_vec();
    }

    if crushed.iter().any(Quality::is_copy) {
        return crushed;
    }

    let copy = Quality {
        level: first.level.clone(),
        pixel_format: first.pixel_format.clone(),
        profile: first.profile.clone(),
        ..Quality::copy()
    };
    log::debug!(
        target: "dash_encode::quality",
        "Crushed ladder from {} to {} rungs against {} kb/s; prepending copy rung",
        qualities.len(),
        crushed.len(),
        input_kbps
    );
    std::iter::once(copy).chain(crushed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitrates(ladder: &[Quality]) -> Vec<u32> {
        ladder.iter().map(|q| q.bitrate).collect()
    }

    #[test]
    fn drops_rungs_above_tolerance_and_prepends_copy() {
        let ladder = vec![
            Quality::new(1920, 1080, 4000, "fast"),
            Quality::new(1280, 720, 1950, "fast"),
            Quality::new(640, 360, 800, "fast"),
        ];
        let crushed = crush_qualities(&ladder, 2000, 0.95);
        assert_eq!(bitrates(&crushed), vec![0, 800]);
        assert_eq!(crushed[0].preset, "");
        assert_eq!(crushed[0].width, 0);
    }

    #[test]
    fn copy_rung_inherits_constraints_from_first_original_rung() {
        let mut top = Quality::new(1920, 1080, 9000, "slow");
        top.level = "4.2".into();
        top.profile = "main".into();
        top.pixel_format = "yuv420p10le".into();
        let ladder = vec![top, Quality::new(640, 360, 500, "slow")];
        let crushed = crush_qualities(&ladder, 3000, 0.95);
        assert_eq!(crushed[0].level, "4.2");
        assert_eq!(crushed[0].profile, "main");
        assert_eq!(crushed[0].pixel_format, "yuv420p10le");
    }

    #[test]
    fn unchanged_when_everything_fits() {
        let ladder = DefaultQuality::Medium.ladder("fast");
        let crushed = crush_qualities(&ladder, 10_000, 0.95);
        assert_eq!(bitrates(&crushed), bitrates(&ladder));
    }

    #[test]
    fn everything_dropped_leaves_only_copy() {
        let ladder = DefaultQuality::Ultra.ladder("fast");
        let crushed = crush_qualities(&ladder, 1000, 0.95);
        assert_eq!(bitrates(&crushed), vec![0]);
    }

    #[test]
    fn existing_copy_rung_is_not_duplicated() {
        let ladder = vec![
            Quality::copy(),
            Quality::new(1920, 1080, 5000, "fast"),
            Quality::new(640, 360, 500, "fast"),
        ];
        let crushed = crush_qualities(&ladder, 2000, 0.95);
        assert_eq!(bitrates(&crushed), vec![0, 500]);
    }

    #[test]
    fn crushing_is_idempotent() {
        let ladder = DefaultQuality::High.ladder("fast");
        let once = crush_qualities(&ladder, 4500, 0.95);
        let twice = crush_qualities(&once, 4500, 0.95);
        assert_eq!(bitrates(&once), bitrates(&twice));
        assert_eq!(bitrates(&once), vec![0, 4000, 2000]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let ladder = vec![Quality::new(0, 0, 950, "fast"), Quality::new(0, 0, 949, "fast")];
        let crushed = crush_qualities(&ladder, 1000, 0.95);
        assert_eq!(bitrates(&crushed), vec![0, 949]);
    }

    #[test]
    fn empty_ladder_stays_empty() {
        assert!(crush_qualities(&[], 1000, 0.95).is_empty());
    }

    #[test]
    fn equality_is_by_bitrate() {
        assert_eq!(
            Quality::new(1920, 1080, 800, "fast"),
            Quality::new(640, 360, 800, "slow")
        );
    }

    #[test]
    fn quality_deserializes_with_defaults() {
        let q: Quality = serde_json::from_str(r#"{"width":1280,"height":720,"bitrate":1800}"#).unwrap();
        assert_eq!(q.preset, "medium");
        assert_eq!(q.level, "4.0");
        assert_eq!(q.to_string(), "1280x720 @ 1800 kb/s - medium");
    }
}
