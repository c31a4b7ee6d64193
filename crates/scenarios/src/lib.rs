//! Impairment definitions and scenario presets for the network digital twin
//!
//! This crate provides the data model shared by the impairment controller
//! and the scenario sequencer: impairment kinds with their safety bounds,
//! clamping and backoff rules, phased scenario plans and named presets.

pub mod bounds;
pub mod builder;
pub mod impairment;
pub mod plan;
pub mod presets;

pub use bounds::SafetyBounds;
pub use builder::ScenarioBuilder;
pub use impairment::{ClampAdjustment, Clamped, Impairment, ImpairmentKind};
pub use plan::{ImpairmentSpec, Phase, PhaseKind, ScenarioPlan};
pub use presets::ScenarioName;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("unknown scenario '{0}' (expected one of: mild, moderate, severe, mixed, stress)")]
    UnknownScenario(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    #[test]
    fn test_scenario_builder() {
        let plan = ScenarioBuilder::new("custom")
            .description("Test scenario")
            .baseline(10)
            .impairment(ImpairmentSpec::jitter(40, 5))
            .recovery(10)
            .build();

        assert_eq!(plan.name, "custom");
        assert_eq!(plan.phases.len(), 3);
        assert_eq!(plan.total_duration(), Duration::from_secs(25));
        assert_eq!(plan.phases[1].kind, PhaseKind::Impairment);
        assert_eq!(plan.impairments().count(), 1);
    }

    #[test]
    fn test_scenario_names_parse() {
        for name in ScenarioName::ALL {
            assert_eq!(name.as_str().parse::<ScenarioName>().unwrap(), name);
        }
        assert_eq!("Moderate".parse::<ScenarioName>().unwrap(), ScenarioName::Moderate);
        assert_eq!(
            "catastrophic".parse::<ScenarioName>(),
            Err(ScenarioError::UnknownScenario("catastrophic".into()))
        );
    }

    #[test]
    fn test_moderate_preset_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = ScenarioName::Moderate.plan(&mut rng);
        let kinds: Vec<_> = plan.phases.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PhaseKind::Baseline,
                PhaseKind::Impairment,
                PhaseKind::Recovery,
                PhaseKind::Impairment,
                PhaseKind::Recovery,
                PhaseKind::Impairment,
            ]
        );
        let impairments: Vec<_> = plan.impairments().map(|s| s.impairment.clone()).collect();
        assert_eq!(impairments[0], Impairment::PacketDrop { loss_rate: 0.15 });
        assert_eq!(impairments[1], Impairment::BandwidthLimit { rate_mbps: 2.0 });
        assert_eq!(
            impairments[2],
            Impairment::Delay {
                delay_ms: 150,
                jitter_ms: 50
            }
        );
        assert_eq!(plan.total_duration(), Duration::from_secs(140));
    }

    #[test]
    fn test_severe_flood_is_a_storm() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = ScenarioName::Severe.plan(&mut rng);
        let first = plan.impairments().next().unwrap();
        assert_eq!(first.kind(), ImpairmentKind::SignalingStorm);
        assert_eq!(first.duration(), Duration::from_secs(20));
    }

    #[test]
    fn test_stress_uses_combined_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let plan = ScenarioName::Stress.plan(&mut rng);
        let spec = plan.impairments().next().unwrap();
        assert_eq!(spec.kind(), ImpairmentKind::CombinedStress);
        assert_eq!(spec.bounds, SafetyBounds::combined());
        assert!(!spec.impairment.clamp(&spec.bounds).was_adjusted());
    }

    #[test]
    fn test_mixed_is_deterministic_per_seed() {
        let a = ScenarioName::Mixed.plan(&mut StdRng::seed_from_u64(42));
        let b = ScenarioName::Mixed.plan(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert_eq!(a.impairments().count(), 3);
        assert_eq!(a.phases[0].kind, PhaseKind::Baseline);
        for phase in a.phases.iter().filter(|p| p.kind == PhaseKind::Recovery) {
            assert!((20..=40).contains(&phase.duration_secs));
        }
        for spec in a.impairments() {
            assert_eq!(spec.duration_secs, 15);
        }
    }

    #[test]
    fn test_plan_serializes_with_kind_tags() {
        let plan = ScenarioBuilder::new("one")
            .impairment(ImpairmentSpec::bandwidth_limit(1.5, 15))
            .build();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["phases"][0]["kind"], "impairment");
        assert_eq!(json["phases"][0]["spec"]["impairment"]["kind"], "bandwidth-limit");
        let back: ScenarioPlan = serde_json::from_value(json).unwrap();
        assert_eq!(back, plan);
    }
}
