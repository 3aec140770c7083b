//! `kubectl logs --timestamps` line parsing and batch deduplication.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// `None` for lines without a leading RFC3339 token (e.g. "failed to open log file" notices).
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
}

/// RFC3339 timestamp at the start of the line, up to the first whitespace.
pub fn parse_timestamp_utc(token: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(token).ok().map(|dt| dt.with_timezone(&Utc))
}

/// `<timestamp> <message>`, split at the first whitespace run. Without a
/// readable timestamp the whole raw line is the message.
pub fn parse_line(raw: &str) -> LogLine {
    let (token, rest) = match raw.split_once(char::is_whitespace) {
        Some((token, rest)) => (token, rest.trim_start()),
        None => (raw, ""),
    };
    match parse_timestamp_utc(token) {
        Some(ts) => LogLine { timestamp: Some(ts), message: rest.to_string() },
        None => LogLine { timestamp: None, message: raw.to_string() },
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplicated {
    pub kept: Vec<String>,
    pub dropped: usize,
    pub watermark: Option<DateTime<Utc>>,
}

/// Drops lines stamped at or before `watermark`; untimestamped lines are always
/// kept. The returned watermark is the newest timestamp in the batch, dropped
/// lines included, clamped so it is never earlier than the old watermark.
/// A batch holding only older lines therefore leaves the watermark where it was.
pub fn deduplicate<S: AsRef<str>>(fresh: &[S], watermark: Option<DateTime<Utc>>) -> Deduplicated {
    let mut out = Deduplicated { watermark, ..Deduplicated::default() };
    let mut newest: Option<DateTime<Utc>> = None;
    for raw in fresh {
        let line = parse_line(raw.as_ref());
        if let Some(ts) = line.timestamp {
            newest = Some(newest.map_or(ts, |n| n.max(ts)));
        }
        match (line.timestamp, watermark) {
            (Some(ts), Some(mark)) if ts <= mark => out.dropped += 1,
            _ => out.kept.push(line.message),
        }
    }
    out.watermark = match (watermark, newest) {
        (Some(mark), Some(n)) => Some(mark.max(n)),
        (mark, n) => n.or(mark),
    };
    out
}
