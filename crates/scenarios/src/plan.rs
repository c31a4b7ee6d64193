//! Phased scenario plans

use crate::bounds::SafetyBounds;
use crate::impairment::{Impairment, ImpairmentKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// An impairment together with the bounds and duration it runs under.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpairmentSpec {
    pub impairment: Impairment,
    pub bounds: SafetyBounds,
    pub duration_secs: u64,
}

impl ImpairmentSpec {
    /// Uses the default bounds for the impairment's kind.
    pub fn new(impairment: Impairment, duration: Duration) -> Self {
        let bounds = SafetyBounds::for_kind(impairment.kind());
        Self {
            impairment,
            bounds,
            duration_secs: duration.as_secs(),
        }
    }

    pub fn with_bounds(mut self, bounds: SafetyBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn packet_drop(loss_rate: f64, secs: u64) -> Self {
        Self::new(
            Impairment::PacketDrop { loss_rate },
            Duration::from_secs(secs),
        )
    }

    pub fn delay(delay_ms: u32, jitter_ms: u32, secs: u64) -> Self {
        Self::new(
            Impairment::Delay {
                delay_ms,
                jitter_ms,
            },
            Duration::from_secs(secs),
        )
    }

    pub fn jitter(jitter_ms: u32, secs: u64) -> Self {
        Self::new(Impairment::Jitter { jitter_ms }, Duration::from_secs(secs))
    }

    pub fn bandwidth_limit(rate_mbps: f64, secs: u64) -> Self {
        Self::new(
            Impairment::BandwidthLimit { rate_mbps },
            Duration::from_secs(secs),
        )
    }

    pub fn signaling_storm(rate_per_sec: u32, secs: u64) -> Self {
        Self::new(
            Impairment::SignalingStorm { rate_per_sec },
            Duration::from_secs(secs),
        )
    }

    pub fn combined_stress(
        loss_rate: f64,
        delay_ms: u32,
        jitter_ms: u32,
        rate_mbps: f64,
        secs: u64,
    ) -> Self {
        Self::new(
            Impairment::CombinedStress {
                loss_rate,
                delay_ms,
                jitter_ms,
                rate_mbps,
            },
            Duration::from_secs(secs),
        )
    }

    pub fn kind(&self) -> ImpairmentKind {
        self.impairment.kind()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Baseline,
    Impairment,
    Recovery,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Baseline => f.write_str("baseline"),
            PhaseKind::Impairment => f.write_str("impairment"),
            PhaseKind::Recovery => f.write_str("recovery"),
        }
    }
}

/// One step of a scenario. Only impairment phases carry a spec.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub duration_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ImpairmentSpec>,
}

impl Phase {
    pub fn baseline(secs: u64) -> Self {
        Self {
            kind: PhaseKind::Baseline,
            duration_secs: secs,
            spec: None,
        }
    }

    pub fn recovery(secs: u64) -> Self {
        Self {
            kind: PhaseKind::Recovery,
            duration_secs: secs,
            spec: None,
        }
    }

    pub fn impairment(spec: ImpairmentSpec) -> Self {
        Self {
            kind: PhaseKind::Impairment,
            duration_secs: spec.duration_secs,
            spec: Some(spec),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.spec {
            Some(spec) => write!(f, "{} ({}s)", spec.impairment, self.duration_secs),
            None => write!(f, "{} ({}s)", self.kind, self.duration_secs),
        }
    }
}

/// Ordered phases with a name, as built by presets or [`crate::ScenarioBuilder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPlan {
    pub name: String,
    pub description: String,
    pub phases: Vec<Phase>,
}

impl ScenarioPlan {
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs(self.phases.iter().map(|p| p.duration_secs).sum())
    }

    pub fn impairments(&self) -> impl Iterator<Item = &ImpairmentSpec> {
        self.phases.iter().filter_map(|p| p.spec.as_ref())
    }
}
