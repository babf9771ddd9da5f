//! Decides whether the source H.264 video can be stream-copied into the top
//! rung instead of re-encoded.

use crate::media::MediaStreamInfo;

/// Codec a stream must already be in to be copied.
pub const COPYABLE_CODEC: &str = "h264";

/// True if `max_level` (e.g. "4.2") parses and `max_level * 10 >= level`.
pub fn compare_levels(max_level: &str, level: i32) -> bool {
    match max_level.trim().parse::<f64>() {
        Ok(max) if max.is_finite() => (max * 10.0).round() as i64 >= i64::from(level),
        _ => false,
    }
}

/// Rank in baseline < main < high < high10/high422/high444. None if unknown.
fn profile_rank(profile: &str) -> Option<u8> {
    match profile.trim().to_ascii_lowercase().as_str() {
        "baseline" | "constrained baseline" => Some(1),
        "main" => Some(2),
        "high" => Some(3),
        "high10" | "high 10" | "high422" | "high 4:2:2" | "high 422" | "high444"
        | "high 4:4:4" | "high 444" | "high 4:4:4 predictive" => Some(4),
        _ => None,
    }
}

/// True if `profile` is equal to or less advanced than `max_profile`.
/// Unrecognized values on either side fail closed.
pub fn compare_profiles(max_profile: &str, profile: &str) -> bool {
    match (profile_rank(max_profile), profile_rank(profile)) {
        (Some(max), Some(rank)) => rank <= max,
        _ => false,
    }
}

/// True only if every stream is H.264 with exactly `pixel_format`, a level no
/// higher than `level` and a profile no more advanced than `profile`.
/// An empty stream list is vacuously copyable.
pub fn can_copy(
    pixel_format: &str,
    level: &str,
    profile: &str,
    streams: &[MediaStreamInfo],
) -> bool {
    streams.iter().all(|s| {
        s.codec_name.eq_ignore_ascii_case(COPYABLE_CODEC)
            && !s.pix_fmt.is_empty()
            && s.pix_fmt == pixel_format
            && compare_levels(level, s.level)
            && compare_profiles(profile, &s.profile)
    })
}
