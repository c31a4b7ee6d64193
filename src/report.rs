//! Scenario run reports

use crate::impairment::{Connectivity, ImpairmentOutcome};
use scenarios::PhaseKind;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

#[derive(Clone, Debug, Serialize)]
pub struct PhaseRecord {
    pub index: usize,
    pub kind: PhaseKind,
    pub planned_secs: u64,
    pub elapsed_secs: f64,
    /// False when the phase was cut short.
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impairment: Option<ImpairmentOutcome>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub interface: String,
    pub target: IpAddr,
    pub seed: Option<u64>,
    pub phases: Vec<PhaseRecord>,
    pub interrupted: bool,
    pub aborted: bool,
    pub final_cleanup_ok: bool,
    pub final_connectivity: Connectivity,
    pub elapsed_secs: f64,
}

impl ScenarioReport {
    pub fn impairments(&self) -> impl Iterator<Item = &ImpairmentOutcome> {
        self.phases.iter().filter_map(|p| p.impairment.as_ref())
    }

    pub fn total_retries(&self) -> u32 {
        self.impairments().map(|o| o.retries).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario '{}' on {} (target {})", self.scenario, self.interface, self.target)?;
        if let Some(seed) = self.seed {
            writeln!(f, "  seed: {}", seed)?;
        }
        for phase in &self.phases {
            let status = if phase.completed { "done" } else { "cut short" };
            match &phase.impairment {
                None => writeln!(
                    f,
                    "  [{}] {:<10} {:>4}s  {:.1}s elapsed, {}",
                    phase.index + 1,
                    phase.kind.to_string(),
                    phase.planned_secs,
                    phase.elapsed_secs,
                    status
                )?,
                Some(o) => {
                    writeln!(
                        f,
                        "  [{}] {:<10} {:>4}s  {}",
                        phase.index + 1,
                        phase.kind.to_string(),
                        phase.planned_secs,
                        o.applied
                    )?;
                    for adj in &o.adjustments {
                        writeln!(f, "        clamped: {}", adj)?;
                    }
                    if o.retries > 0 {
                        writeln!(f, "        backoff x{}: ended at {}", o.retries, o.final_applied)?;
                    }
                    if o.signaling_sent > 0 {
                        writeln!(f, "        signaling requests sent: {}", o.signaling_sent)?;
                    }
                    if o.apply_failed {
                        writeln!(f, "        apply failed")?;
                    }
                    if let Some(err) = &o.error {
                        writeln!(f, "        error: {}", err)?;
                    }
                    writeln!(
                        f,
                        "        checks: {}, cleanup: {}, connectivity: {}, {}",
                        o.checks,
                        if o.cleanup_ok { "ok" } else { "FAILED" },
                        o.post_connectivity,
                        status
                    )?;
                }
            }
        }
        if self.interrupted {
            writeln!(f, "  interrupted")?;
        }
        if self.aborted {
            writeln!(f, "  aborted after apply failure")?;
        }
        write!(
            f,
            "  final cleanup: {}, connectivity: {}, elapsed {:.1}s",
            if self.final_cleanup_ok { "ok" } else { "FAILED" },
            self.final_connectivity,
            self.elapsed_secs
        )
    }
}
