//! Named scenario presets

use crate::builder::ScenarioBuilder;
use crate::plan::{ImpairmentSpec, ScenarioPlan};
use crate::ScenarioError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Requested flood rate for the severe preset; clamped to the signaling bound at run time.
const SEVERE_FLOOD_RATE: u32 = 1000;
const MIXED_ROUNDS: usize = 3;
const MIXED_BASELINE_SECS: u64 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScenarioName {
    Mild,
    Moderate,
    Severe,
    Mixed,
    Stress,
}

impl ScenarioName {
    pub const ALL: [ScenarioName; 5] = [
        ScenarioName::Mild,
        ScenarioName::Moderate,
        ScenarioName::Severe,
        ScenarioName::Mixed,
        ScenarioName::Stress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioName::Mild => "mild",
            ScenarioName::Moderate => "moderate",
            ScenarioName::Severe => "severe",
            ScenarioName::Mixed => "mixed",
            ScenarioName::Stress => "stress",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioName::Mild => "Light packet drop followed by modest delay",
            ScenarioName::Moderate => "Heavier drop, a 2 Mbps bandwidth cap and 150ms delay",
            ScenarioName::Severe => "Signaling storm, 30% drop and a 0.5 Mbps cap",
            ScenarioName::Mixed => "Three randomly chosen impairments with randomized recovery",
            ScenarioName::Stress => "Combined loss, delay, jitter and rate limiting under tight bounds",
        }
    }

    /// Build the phase list. Randomized choices draw from `rng`, so a seeded
    /// generator yields the same plan every time.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> ScenarioPlan {
        let builder = ScenarioBuilder::new(self.as_str()).description(self.description());
        match self {
            ScenarioName::Mild => builder
                .baseline(30)
                .impairment(ImpairmentSpec::packet_drop(0.05, 20))
                .recovery(30)
                .impairment(ImpairmentSpec::delay(50, 20, 20))
                .build(),
            ScenarioName::Moderate => builder
                .baseline(20)
                .impairment(ImpairmentSpec::packet_drop(0.15, 30))
                .recovery(15)
                .impairment(ImpairmentSpec::bandwidth_limit(2.0, 30))
                .recovery(15)
                .impairment(ImpairmentSpec::delay(150, 50, 30))
                .build(),
            ScenarioName::Severe => builder
                .baseline(15)
                .impairment(ImpairmentSpec::signaling_storm(SEVERE_FLOOD_RATE, 20))
                .recovery(10)
                .impairment(ImpairmentSpec::packet_drop(0.30, 25))
                .recovery(10)
                .impairment(ImpairmentSpec::bandwidth_limit(0.5, 25))
                .build(),
            ScenarioName::Mixed => {
                let choices = [
                    ImpairmentSpec::packet_drop(0.10, 15),
                    ImpairmentSpec::delay(100, 30, 15),
                    ImpairmentSpec::bandwidth_limit(1.5, 15),
                ];
                let mut builder = builder.baseline(MIXED_BASELINE_SECS);
                for _ in 0..MIXED_ROUNDS {
                    let recovery = rng.gen_range(20..=40);
                    builder = builder.recovery(recovery);
                    if let Some(spec) = choices.choose(rng) {
                        builder = builder.impairment(spec.clone());
                    }
                }
                builder.build()
            }
            ScenarioName::Stress => builder
                .baseline(20)
                .impairment(ImpairmentSpec::combined_stress(0.10, 100, 30, 3.0, 30))
                .recovery(20)
                .build(),
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioName {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ScenarioName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == wanted)
            .ok_or_else(|| ScenarioError::UnknownScenario(s.to_string()))
    }
}
