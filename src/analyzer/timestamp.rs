//! Capture timestamp normalization
//!
//! tshark prints frame times like `Sep 30, 2025 15:22:49.374809000 +08`.
//! chrono wants at most nanosecond precision and a `+08:00` offset, so the
//! fraction is cut to microseconds and the offset padded before parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

const CAPTURE_FORMAT: &str = "%b %d, %Y %H:%M:%S%.f %:z";
const CAPTURE_FORMAT_NO_TZ: &str = "%b %d, %Y %H:%M:%S%.f";
const MAX_FRACTION_DIGITS: usize = 6;

/// Rewrite a tshark-style timestamp into a form chrono can parse.
pub fn normalize(raw: &str) -> String {
    let mut tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if tokens.len() < 4 {
        return tokens.join(" ");
    }

    if let Some((whole, frac)) = tokens[3].split_once('.') {
        if frac.is_ascii() && frac.len() > MAX_FRACTION_DIGITS {
            tokens[3] = format!("{}.{}", whole, &frac[..MAX_FRACTION_DIGITS]);
        }
    }

    if let Some(offset) = tokens.get_mut(4) {
        *offset = normalize_offset(offset);
    }

    tokens.join(" ")
}

fn normalize_offset(offset: &str) -> String {
    let Some(digits) = offset.strip_prefix(['+', '-']) else {
        return offset.to_string();
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return offset.to_string();
    }
    let sign = &offset[..1];
    match digits.len() {
        2 => format!("{}{}:00", sign, digits),
        4 => format!("{}{}:{}", sign, &digits[..2], &digits[2..]),
        _ => offset.to_string(),
    }
}

/// Parse a capture timestamp.
///
/// Accepts tshark frame times (with or without an offset, the latter read as
/// UTC), RFC 3339, and fractional epoch seconds.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let normalized = normalize(raw);
    if let Ok(ts) = DateTime::parse_from_str(&normalized, CAPTURE_FORMAT) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, CAPTURE_FORMAT_NO_TZ) {
        return Some(naive.and_utc());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_epoch(raw)
}

/// Fractional seconds since the Unix epoch, e.g. `1696071234.123456`.
pub fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
