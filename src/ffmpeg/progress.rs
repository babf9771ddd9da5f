use regex::Regex;
use std::sync::LazyLock;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=.+time=(\d\S+)").expect("invalid time regex"));

/// Parse an `HH:MM:SS(.frac)` timestamp into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse an FFmpeg stderr status line (`frame=... time=00:00:05.00 ...`) into
/// progress in [0, 1] against the known input duration.
pub fn parse_encode_progress(line: &str, duration_secs: f64) -> Option<f64> {
    if duration_secs <= 0.0 {
        return None;
    }
    let caps = TIME_RE.captures(line)?;
    let elapsed = parse_timestamp(&caps[1])?;
    Some((elapsed / duration_secs).clamp(0.0, 1.0))
}
