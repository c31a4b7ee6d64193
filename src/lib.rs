//! Network digital twin for a 5G test network.
//!
//! - [`analyzer`] characterizes captured traffic offline.
//! - [`replay`] regenerates a statistically similar load on a live interface.
//! - [`impairment`] injects safety-bounded degradations and always removes them.
//! - [`sequencer`] runs named scenarios of baseline, impairment and recovery phases.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod impairment;
pub mod replay;
pub mod report;
pub mod sequencer;
pub mod shutdown;

pub use analyzer::{CaptureAnalyzer, CaptureSource, Characterization, TimeSeries, TrafficAnalysis};
pub use config::{ApplyFailurePolicy, MonitorConfig, ReplayConfig, TwinConfig};
pub use error::{AnalyzeError, ConfigError, LeaseError, ReplayError, SequencerError};
pub use impairment::{
    Connectivity, ControllerState, ImpairmentController, ImpairmentOutcome, InterfaceLease,
    InterfaceLeases,
};
pub use replay::{ReplayDriver, ReplaySource, ReplaySummary};
pub use report::{PhaseRecord, ScenarioReport};
pub use sequencer::ScenarioSequencer;
pub use shutdown::{Shutdown, ShutdownListener};
