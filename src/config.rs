//! Runtime configuration loaded from JSON

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTERFACE: &str = "uesimtun0";
pub const DEFAULT_TARGET: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Top-level configuration. Every field has a default, so `{}` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    pub interface: String,
    pub target: IpAddr,
    /// Seed for every random draw. A fresh seed is drawn when absent.
    pub seed: Option<u64>,
    pub use_sudo: bool,
    pub monitor: MonitorConfig,
    pub replay: ReplayConfig,
    pub on_apply_failure: ApplyFailurePolicy,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            target: DEFAULT_TARGET,
            seed: None,
            use_sudo: false,
            monitor: MonitorConfig::default(),
            replay: ReplayConfig::default(),
            on_apply_failure: ApplyFailurePolicy::Continue,
        }
    }
}

impl TwinConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Connectivity checkpoints during an impairment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Checkpoints spread across one impairment.
    pub checks: u32,
    pub min_spacing_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            checks: 5,
            min_spacing_secs: 2,
            probe_timeout_secs: 1,
        }
    }
}

impl MonitorConfig {
    /// Spacing between checkpoints for an impairment of `duration`.
    pub fn interval_for(&self, duration: Duration) -> Duration {
        let even = duration / (self.checks.max(1) + 1);
        even.max(Duration::from_secs(self.min_spacing_secs.max(1)))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

/// Pacing for the synthetic replay producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Probe spacing used when the captured series carries no rate.
    pub nominal_interval_ms: u64,
    /// Uniform spread applied to each spacing, as a fraction of it.
    pub jitter_fraction: f64,
    pub burst_probability: f64,
    pub payload_min: u16,
    pub payload_max: u16,
    pub background_port: u16,
    pub background_send_probability: f64,
    pub background_payload_min: usize,
    pub background_payload_max: usize,
    pub background_delay_min_ms: u64,
    pub background_delay_max_ms: u64,
    pub log_path: PathBuf,
    /// Emit a progress line every this many probes.
    pub progress_every: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            nominal_interval_ms: 200,
            jitter_fraction: 0.2,
            burst_probability: 0.1,
            payload_min: 32,
            payload_max: 96,
            background_port: 12345,
            background_send_probability: 0.3,
            background_payload_min: 100,
            background_payload_max: 1000,
            background_delay_min_ms: 500,
            background_delay_max_ms: 1500,
            log_path: PathBuf::from("ue_ping_replay.log"),
            progress_every: 10,
        }
    }
}

impl ReplayConfig {
    pub fn nominal_interval(&self) -> Duration {
        Duration::from_millis(self.nominal_interval_ms.max(1))
    }
}

/// What the sequencer does when installing an impairment fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyFailurePolicy {
    /// Record the failure and move on to the next phase.
    Continue,
    /// Stop the scenario after cleanup.
    Abort,
}
