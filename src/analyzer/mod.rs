//! Offline characterization of captured traffic.
//!
//! A data directory holds up to three artifacts: a core-network capture, a
//! gNB GTP capture (both tab-delimited frame exports) and a UE ping log. Each
//! is reduced to a [`Characterization`]; missing or empty inputs reduce to an
//! empty one rather than an error.

pub mod bandwidth;
pub mod ping;
pub mod stats;
pub mod timestamp;

use crate::error::AnalyzeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CORE_CAPTURE: &str = "core_traffic.csv";
pub const GNB_CAPTURE: &str = "gnb_gtp.csv";
pub const PING_LOG: &str = "ue_ping.log";
pub const ANALYSIS_FILE: &str = "traffic_analysis.json";
/// Widest capture, in seconds, exported as a zero-filled series.
pub const MAX_EXPORT_SPAN_SECS: u64 = 31 * 24 * 3600;

/// Sparse `(bucket, value)` series in ascending bucket order.
///
/// Bandwidth buckets are epoch seconds; ping buckets are reply ordinals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries {
    points: Vec<(i64, f64)>,
}

impl TimeSeries {
    pub fn push(&mut self, bucket: i64, value: f64) {
        debug_assert!(self.points.last().map_or(true, |(b, _)| *b < bucket));
        self.points.push((bucket, value));
    }

    pub fn points(&self) -> &[(i64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    /// Number of buckets from first to last inclusive.
    pub fn span(&self, step: i64) -> u64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => {
                let width = (last.0 as i128 - first.0 as i128) / step.max(1) as i128;
                u64::try_from(width + 1).unwrap_or(u64::MAX)
            }
            _ => 0,
        }
    }

    /// Buckets inside the span that carry no point.
    pub fn gap_count(&self, step: i64) -> u64 {
        self.span(step).saturating_sub(self.points.len() as u64)
    }

    /// Every bucket from first to last, yielding zero for gaps. Lazy, so a
    /// wide span costs nothing until consumed.
    pub fn dense(&self, step: i64) -> impl Iterator<Item = (i64, f64)> + '_ {
        let step = step.max(1);
        let mut points = self.points.iter().peekable();
        let mut next = self.points.first().map(|(b, _)| *b);
        let last = self.points.last().map(|(b, _)| *b);
        std::iter::from_fn(move || {
            let bucket = next?;
            if bucket > last? {
                return None;
            }
            next = bucket.checked_add(step);
            match points.peek() {
                Some((b, v)) if *b == bucket => {
                    points.next();
                    Some((bucket, *v))
                }
                _ => Some((bucket, 0.0)),
            }
        })
    }
}

/// Statistical summary of one capture.
///
/// For captures the rate fields are throughput in Mbps. For the ping log they
/// are RTTs in milliseconds and the jitter fields are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Characterization {
    pub duration_sec: f64,
    pub mean_rate: f64,
    pub max_rate: f64,
    pub min_rate: f64,
    pub std_dev: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub sample_count: usize,
    pub samples_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_jitter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_jitter: Option<f64>,
    pub time_series: TimeSeries,
}

impl Characterization {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Core,
    Gnb,
    Ping,
}

impl CaptureSource {
    pub const ALL: [CaptureSource; 3] = [CaptureSource::Core, CaptureSource::Gnb, CaptureSource::Ping];

    pub fn file_name(&self) -> &'static str {
        match self {
            CaptureSource::Core => CORE_CAPTURE,
            CaptureSource::Gnb => GNB_CAPTURE,
            CaptureSource::Ping => PING_LOG,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaptureSource::Core => "core",
            CaptureSource::Gnb => "gnb",
            CaptureSource::Ping => "ping",
        }
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The persisted analysis artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficAnalysis {
    pub core: Characterization,
    pub gnb: Characterization,
    pub ping: Characterization,
}

impl TrafficAnalysis {
    pub fn get(&self, source: CaptureSource) -> &Characterization {
        match source {
            CaptureSource::Core => &self.core,
            CaptureSource::Gnb => &self.gnb,
            CaptureSource::Ping => &self.ping,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty() && self.gnb.is_empty() && self.ping.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, AnalyzeError> {
        let file = File::open(path).map_err(|source| AnalyzeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Characterizes the artifacts in one data directory.
#[derive(Debug, Clone)]
pub struct CaptureAnalyzer {
    dir: PathBuf,
    assumed_ping_interval_secs: f64,
}

impl CaptureAnalyzer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            assumed_ping_interval_secs: ping::ASSUMED_INTERVAL_SECS,
        }
    }

    /// Spacing assumed between ping replies when the log has no timestamps.
    pub fn with_assumed_ping_interval(mut self, secs: f64) -> Self {
        self.assumed_ping_interval_secs = secs;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn analyze(&self) -> TrafficAnalysis {
        TrafficAnalysis {
            core: self.analyze_source(CaptureSource::Core),
            gnb: self.analyze_source(CaptureSource::Gnb),
            ping: self.analyze_source(CaptureSource::Ping),
        }
    }

    /// Characterize one artifact. Missing or unreadable files are empty.
    pub fn analyze_source(&self, source: CaptureSource) -> Characterization {
        let path = self.dir.join(source.file_name());
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(source = %source, path = %path.display(), error = %e, "capture unavailable");
                return Characterization::default();
            }
        };
        let reader = BufReader::new(file);
        let result = match source {
            CaptureSource::Core | CaptureSource::Gnb => {
                bandwidth::characterize(reader, source.label())
            }
            CaptureSource::Ping => ping::characterize(reader, self.assumed_ping_interval_secs),
        };
        info!(
            source = %source,
            samples = result.sample_count,
            duration_sec = result.duration_sec,
            mean = result.mean_rate,
            "characterized capture"
        );
        result
    }

    /// Write the analysis as pretty JSON into the data directory.
    pub fn write_analysis(&self, analysis: &TrafficAnalysis) -> Result<PathBuf, AnalyzeError> {
        let path = self.dir.join(ANALYSIS_FILE);
        let json = serde_json::to_string_pretty(analysis)?;
        std::fs::write(&path, json).map_err(|source| AnalyzeError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote traffic analysis");
        Ok(path)
    }

    /// Export a bandwidth series as `<label>_bandwidth.csv`, one row per
    /// second with quiet seconds written as zero. Skipped for the ping log and
    /// for empty series. Spans wider than [`MAX_EXPORT_SPAN_SECS`] fall back to
    /// the observed seconds only.
    pub fn export_bandwidth(
        &self,
        source: CaptureSource,
        characterization: &Characterization,
    ) -> Result<Option<PathBuf>, AnalyzeError> {
        if source == CaptureSource::Ping || characterization.time_series.is_empty() {
            return Ok(None);
        }
        let path = self.dir.join(format!("{}_bandwidth.csv", source.label()));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(["second", "bandwidth_mbps"])?;
        let series = &characterization.time_series;
        let span = series.span(bandwidth::WINDOW_SECS);
        if span > MAX_EXPORT_SPAN_SECS {
            warn!(
                source = %source,
                span_secs = span,
                "capture span too wide to zero-fill, exporting observed seconds only"
            );
            for (bucket, mbps) in series.points() {
                writer.write_record([bucket.to_string(), format!("{:.6}", mbps)])?;
            }
        } else {
            for (bucket, mbps) in series.dense(bandwidth::WINDOW_SECS) {
                writer.write_record([bucket.to_string(), format!("{:.6}", mbps)])?;
            }
        }
        writer.flush().map_err(|source| AnalyzeError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_fills_gaps() {
        let mut ts = TimeSeries::default();
        ts.push(10, 1.0);
        ts.push(13, 2.0);
        let dense: Vec<_> = ts.dense(1).collect();
        assert_eq!(dense, vec![(10, 1.0), (11, 0.0), (12, 0.0), (13, 2.0)]);
        assert_eq!(ts.span(1), 4);
        assert_eq!(ts.gap_count(1), 2);
        assert_eq!(TimeSeries::default().dense(1).count(), 0);
        assert_eq!(TimeSeries::default().span(1), 0);
    }

    #[test]
    fn wide_span_is_counted_not_materialized() {
        let mut ts = TimeSeries::default();
        ts.push(0, 1.0);
        ts.push(1_000_000_000_000, 1.0);
        assert_eq!(ts.span(1), 1_000_000_000_001);
        assert_eq!(ts.gap_count(1), 999_999_999_999);
        assert_eq!(ts.dense(1).take(3).map(|(_, v)| v).collect::<Vec<_>>(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn characterization_json_uses_camel_case() {
        let c = Characterization {
            duration_sec: 9.0,
            sample_count: 10,
            ..Default::default()
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["durationSec"], 9.0);
        assert_eq!(json["sampleCount"], 10);
        assert!(json.get("meanJitter").is_none());

        let empty: Characterization = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
