//! Map external tool exit codes to short summaries.
//!
//! FFmpeg exit codes are from ffmpeg.c: 1 (general), 69 (rate exceeded),
//! 123 (hard exit), 255 (signal). -1 is used when the process never produced
//! an exit code. The captured log tail is kept as detail.

use serde::Serialize;

/// Number of trailing log lines kept in the error detail.
const DETAIL_TAIL_LINES: usize = 40;
const ELLIPSIS: &str = "…";

/// Payload for `dash.job.error` events. Clients show summary; detail is expandable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolErrorPayload {
    pub summary: String,
    pub detail: String,
}

/// Maps an exit code to a short summary and keeps the tail of the log as detail.
pub fn parse_tool_error(log: &str, exit_code: Option<i32>) -> ToolErrorPayload {
    let summary = match exit_code {
        Some(code) => known_exit_code_summary(code)
            .unwrap_or_else(|| format!("Tool failed (exit code {}).", code)),
        None => first_line_truncated(log, 120),
    };
    ToolErrorPayload {
        summary,
        detail: log_tail(log, DETAIL_TAIL_LINES),
    }
}

fn known_exit_code_summary(code: i32) -> Option<String> {
    match code {
        -1 => Some("Tool terminated without an exit code.".into()),
        1 => Some("FFmpeg failed.".into()),
        69 => Some("Encoding rate limit exceeded.".into()),
        123 | 255 => Some("Encoding was stopped.".into()),
        _ => None,
    }
}

fn first_line_truncated(log: &str, max_len: usize) -> String {
    let first = log
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    if first.len() <= max_len {
        return first.to_string();
    }
    let mut cut = max_len.saturating_sub(ELLIPSIS.len());
    while !first.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &first[..cut], ELLIPSIS)
}

fn log_tail(log: &str, lines: usize) -> String {
    let all: Vec<&str> = log.trim().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_1() {
        let p = parse_tool_error("", Some(1));
        assert_eq!(p.summary, "FFmpeg failed.");
    }

    #[test]
    fn exit_code_255() {
        let p = parse_tool_error("", Some(255));
        assert_eq!(p.summary, "Encoding was stopped.");
    }

    #[test]
    fn unknown_code_short_summary() {
        let p = parse_tool_error("Invalid data found when processing input", Some(42));
        assert_eq!(p.summary, "Tool failed (exit code 42).");
        assert_eq!(p.detail, "Invalid data found when processing input");
    }

    #[test]
    fn no_code_uses_first_log_line() {
        let p = parse_tool_error("\nSome random error\nSecond line", None);
        assert_eq!(p.summary, "Some random error");
    }

    #[test]
    fn long_first_line_truncated() {
        let long = "a".repeat(150);
        let p = parse_tool_error(&long, None);
        assert!(p.summary.len() <= 120);
        assert!(p.summary.ends_with('…'));
    }

    #[test]
    fn detail_keeps_only_tail() {
        let log: Vec<String> = (0..100).map(|i| format!("line {}", i)).collect();
        let p = parse_tool_error(&log.join("\n"), Some(1));
        assert_eq!(p.detail.lines().count(), DETAIL_TAIL_LINES);
        assert!(p.detail.ends_with("line 99"));
        assert!(p.detail.starts_with("line 60"));
    }
}
