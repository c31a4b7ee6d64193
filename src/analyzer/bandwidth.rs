//! Bandwidth characterization from tab-delimited packet captures
//!
//! Each record is a captured frame. Column 0 is the frame time and column 4
//! the frame length in bytes. Other columns are ignored.

use super::stats::summarize_with_zeros;
use super::{timestamp, Characterization, TimeSeries};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io;
use tracing::{debug, info, warn};

const TIME_COLUMN: usize = 0;
const LENGTH_COLUMN: usize = 4;
/// Resampling window for throughput, in seconds.
pub const WINDOW_SECS: i64 = 1;

/// Parse capture records and characterize throughput in Mbps.
///
/// Records with an unparseable time or length are dropped. An input with no
/// valid record yields an empty characterization.
pub fn characterize<R: io::Read>(reader: R, label: &str) -> Characterization {
    let frames = parse_frames(reader, label);
    if frames.is_empty() {
        warn!(label, "no valid capture records");
        return Characterization::default();
    }
    from_frames(&frames)
}

fn parse_frames<R: io::Read>(reader: R, label: &str) -> Vec<(DateTime<Utc>, u64)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut frames = Vec::new();
    let mut total = 0usize;
    for record in rdr.byte_records() {
        total += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!(label, error = %e, "skipping unreadable capture record");
                continue;
            }
        };
        let time = record
            .get(TIME_COLUMN)
            .map(String::from_utf8_lossy)
            .and_then(|raw| timestamp::parse(&raw));
        let length = record
            .get(LENGTH_COLUMN)
            .map(String::from_utf8_lossy)
            .and_then(|raw| raw.trim().parse::<u64>().ok());
        match (time, length) {
            (Some(t), Some(len)) => frames.push((t, len)),
            _ => debug!(label, line = total, "dropping malformed capture record"),
        }
    }

    let dropped = total - frames.len();
    if dropped > 0 {
        warn!(label, dropped, total, "dropped malformed capture records");
    }
    info!(label, valid = frames.len(), total, "parsed capture records");
    frames
}

fn from_frames(frames: &[(DateTime<Utc>, u64)]) -> Characterization {
    let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();
    for (time, len) in frames {
        let bucket = time.timestamp().div_euclid(WINDOW_SECS) * WINDOW_SECS;
        *buckets.entry(bucket).or_default() += len;
    }

    let mut series = TimeSeries::default();
    for (bucket, bytes) in &buckets {
        series.push(*bucket, bytes_to_mbps(*bytes));
    }

    let summary = summarize_with_zeros(&series.values(), series.gap_count(WINDOW_SECS));

    let first = frames.iter().map(|(t, _)| *t).min();
    let last = frames.iter().map(|(t, _)| *t).max();
    let duration_sec = match (first, last) {
        (Some(a), Some(b)) => (b - a).to_std().map(|d| d.as_secs_f64()).unwrap_or(0.0),
        _ => 0.0,
    };
    let samples_per_sec = if duration_sec > 0.0 {
        frames.len() as f64 / duration_sec
    } else {
        0.0
    };

    Characterization {
        duration_sec,
        mean_rate: summary.mean,
        max_rate: summary.max,
        min_rate: summary.min,
        std_dev: summary.std_dev,
        p50: summary.p50,
        p95: summary.p95,
        p99: summary.p99,
        sample_count: frames.len(),
        samples_per_sec,
        mean_jitter: None,
        max_jitter: None,
        time_series: series,
    }
}

fn bytes_to_mbps(bytes: u64) -> f64 {
    bytes as f64 * 8.0 / WINDOW_SECS as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(lines: &[String]) -> String {
        lines.join("\n")
    }

    fn record(epoch: i64, len: u64) -> String {
        format!("{}\t10.0.0.1\t10.0.0.2\tUDP\t{}", epoch, len)
    }

    #[test]
    fn one_kilobit_per_second() {
        let lines: Vec<String> = (0..10).map(|i| record(1_700_000_000 + i, 125)).collect();
        let c = characterize(capture(&lines).as_bytes(), "core");
        assert_eq!(c.sample_count, 10);
        assert!((c.mean_rate - 0.001).abs() < 1e-12);
        assert!((c.duration_sec - 9.0).abs() < 1e-9);
        assert!((c.samples_per_sec - 10.0 / 9.0).abs() < 1e-9);
        assert_eq!(c.time_series.len(), 10);
    }

    #[test]
    fn quiet_seconds_count_as_zero() {
        let lines = vec![record(100, 250), record(102, 250)];
        let c = characterize(capture(&lines).as_bytes(), "gnb");
        assert_eq!(c.time_series.len(), 2);
        assert_eq!(c.min_rate, 0.0);
        assert!((c.mean_rate - 0.002 * 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_records_are_dropped() {
        let lines = vec![
            record(100, 125),
            "garbage".to_string(),
            "yesterday\ta\tb\tc\t125".to_string(),
            format!("{}\ta\tb\tc\tnot-a-length", 101),
            record(101, 125),
        ];
        let c = characterize(capture(&lines).as_bytes(), "core");
        assert_eq!(c.sample_count, 2);
        assert!((c.duration_sec - 1.0).abs() < 1e-9);
    }

    #[test]
    fn tshark_times_bucket_by_second() {
        let text = "Sep 30, 2025 15:22:49.100000000 +08\ta\tb\tc\t1000\n\
                    Sep 30, 2025 15:22:49.900000000 +08\ta\tb\tc\t1000\n";
        let c = characterize(text.as_bytes(), "core");
        assert_eq!(c.time_series.len(), 1);
        assert!((c.max_rate - 0.016).abs() < 1e-12);
        assert!((c.duration_sec - 0.8).abs() < 1e-9);
    }

    #[test]
    fn distant_records_do_not_allocate_the_gap() {
        let lines = vec![record(0, 125), record(1_000_000_000_000, 125)];
        let c = characterize(capture(&lines).as_bytes(), "core");
        assert_eq!(c.sample_count, 2);
        assert_eq!(c.time_series.len(), 2);
        assert_eq!(c.min_rate, 0.0);
        assert!((c.max_rate - 0.001).abs() < 1e-12);
        assert_eq!(c.p50, 0.0);
    }

    #[test]
    fn non_ascii_time_column_is_dropped() {
        let text = "Sep 30, 2025 15:22:49.12345\u{e9}9 +08\ta\tb\tc\t100\n\
                    Sep 30, 2025 15:22:49.1 \u{e9}08\ta\tb\tc\t100\n\
                    1700000000\ta\tb\tc\t100\n";
        let c = characterize(text.as_bytes(), "core");
        assert_eq!(c.sample_count, 1);

        let mut invalid_utf8 = b"Sep 30, 2025 15:22:49.1234".to_vec();
        invalid_utf8.extend_from_slice(&[0xff, 0xfe, 0xfd]);
        invalid_utf8.extend_from_slice(b" +08\ta\tb\tc\t100\n");
        assert!(characterize(invalid_utf8.as_slice(), "core").is_empty());
    }

    #[test]
    fn empty_input_is_empty() {
        let c = characterize("".as_bytes(), "core");
        assert!(c.is_empty());
        assert_eq!(c.mean_rate, 0.0);
    }
}
