//! Latency characterization from ping logs
//!
//! Only lines carrying an RTT marker are counted. A line may start with a
//! bracketed epoch timestamp as printed by `ping -D`.

use super::stats::summarize;
use super::{Characterization, TimeSeries};
use link_control::{parse_rtt_ms, RTT_MARKER};
use std::io::BufRead;
use tracing::{info, warn};

/// Spacing assumed between echoes when the log carries no timestamps.
pub const ASSUMED_INTERVAL_SECS: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Echo {
    at: Option<f64>,
    rtt_ms: f64,
}

/// Characterize RTTs (ms) and jitter from a ping log.
///
/// The rate fields carry RTT statistics in milliseconds.
pub fn characterize<R: BufRead>(reader: R, assumed_interval_secs: f64) -> Characterization {
    let mut echoes = Vec::new();
    for line in reader.split(b'\n') {
        let line = match line {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(error = %e, "stopped reading ping log");
                break;
            }
        };
        if !line.contains(RTT_MARKER) {
            continue;
        }
        if let Some(rtt_ms) = parse_rtt_ms(&line) {
            echoes.push(Echo {
                at: bracketed_epoch(&line),
                rtt_ms,
            });
        }
    }

    if echoes.is_empty() {
        warn!("no ping replies found");
        return Characterization::default();
    }
    info!(replies = echoes.len(), "parsed ping replies");
    from_echoes(&echoes, assumed_interval_secs)
}

fn bracketed_epoch(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix('[')?;
    let end = rest.find(']')?;
    rest[..end].trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn from_echoes(echoes: &[Echo], assumed_interval_secs: f64) -> Characterization {
    let rtts: Vec<f64> = echoes.iter().map(|e| e.rtt_ms).collect();
    let summary = summarize(&rtts);

    let stamps: Vec<f64> = echoes.iter().filter_map(|e| e.at).collect();
    let duration_sec = if stamps.len() >= 2 {
        let first = stamps.iter().copied().fold(f64::INFINITY, f64::min);
        let last = stamps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        last - first
    } else {
        echoes.len() as f64 * assumed_interval_secs
    };
    let samples_per_sec = if duration_sec > 0.0 {
        echoes.len() as f64 / duration_sec
    } else {
        0.0
    };

    let diffs: Vec<f64> = jitter_series(&rtts).into_iter().skip(1).collect();
    let (mean_jitter, max_jitter) = if diffs.is_empty() {
        (0.0, 0.0)
    } else {
        let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
        let max = diffs.iter().copied().fold(0.0, f64::max);
        (mean, max)
    };

    let mut series = TimeSeries::default();
    for (i, rtt) in rtts.iter().enumerate() {
        series.push(i as i64, *rtt);
    }

    Characterization {
        duration_sec,
        mean_rate: summary.mean,
        max_rate: summary.max,
        min_rate: summary.min,
        std_dev: summary.std_dev,
        p50: summary.p50,
        p95: summary.p95,
        p99: summary.p99,
        sample_count: echoes.len(),
        samples_per_sec,
        mean_jitter: Some(mean_jitter),
        max_jitter: Some(max_jitter),
        time_series: series,
    }
}

/// Absolute difference between consecutive RTTs, with `0` for the first sample.
pub fn jitter_series(rtts: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(rtts.len());
    if let Some(first) = rtts.first() {
        out.push(0.0);
        let mut prev = *first;
        for rtt in &rtts[1..] {
            out.push((rtt - prev).abs());
            prev = *rtt;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_of_consecutive_rtts() {
        assert_eq!(jitter_series(&[10.0, 15.0, 12.0]), vec![0.0, 5.0, 3.0]);
        assert!(jitter_series(&[]).is_empty());
    }

    #[test]
    fn plain_log_uses_assumed_interval() {
        let log = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
                   64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=10.0 ms\n\
                   64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=15.0 ms\n\
                   64 bytes from 8.8.8.8: icmp_seq=3 ttl=117 time=12.0 ms\n\
                   --- 8.8.8.8 ping statistics ---\n";
        let c = characterize(log.as_bytes(), ASSUMED_INTERVAL_SECS);
        assert_eq!(c.sample_count, 3);
        assert!((c.duration_sec - 0.6).abs() < 1e-9);
        assert!((c.mean_rate - 37.0 / 3.0).abs() < 1e-9);
        assert_eq!(c.mean_jitter, Some(4.0));
        assert_eq!(c.max_jitter, Some(5.0));
        assert_eq!(c.time_series.points()[2], (2, 12.0));
    }

    #[test]
    fn timestamped_log_uses_wall_clock() {
        let log = "[1696071234.000000] 64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=20.0 ms\n\
                   [1696071234.500000] 64 bytes from 10.0.0.1: icmp_seq=2 ttl=64 time=22.0 ms\n\
                   [1696071236.000000] 64 bytes from 10.0.0.1: icmp_seq=3 ttl=64 time=21.0 ms\n";
        let c = characterize(log.as_bytes(), ASSUMED_INTERVAL_SECS);
        assert!((c.duration_sec - 2.0).abs() < 1e-6);
        assert!((c.samples_per_sec - 1.5).abs() < 1e-6);
    }

    #[test]
    fn single_reply_has_zero_jitter() {
        let c = characterize("64 bytes from x: time=9.5 ms\n".as_bytes(), ASSUMED_INTERVAL_SECS);
        assert_eq!(c.sample_count, 1);
        assert_eq!(c.mean_jitter, Some(0.0));
        assert_eq!(c.std_dev, 0.0);
    }

    #[test]
    fn log_without_replies_is_empty() {
        let c = characterize("Request timeout for icmp_seq 1\n".as_bytes(), ASSUMED_INTERVAL_SECS);
        assert!(c.is_empty());
        assert_eq!(c.mean_jitter, None);
    }
}
