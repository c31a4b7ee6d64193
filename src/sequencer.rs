//! Runs a scenario plan phase by phase on one interface

use crate::config::{ApplyFailurePolicy, MonitorConfig, TwinConfig};
use crate::error::SequencerError;
use crate::impairment::{Connectivity, ImpairmentController, InterfaceLeases};
use crate::report::{PhaseRecord, ScenarioReport};
use crate::shutdown::Shutdown;
use link_control::{LinkController, Prober};
use scenarios::{PhaseKind, ScenarioPlan};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub struct ScenarioSequencer<L, P> {
    link: Arc<L>,
    prober: Arc<P>,
    leases: InterfaceLeases,
    interface: String,
    target: IpAddr,
    monitor: MonitorConfig,
    on_apply_failure: ApplyFailurePolicy,
    seed: Option<u64>,
}

impl<L, P> ScenarioSequencer<L, P>
where
    L: LinkController + 'static,
    P: Prober + 'static,
{
    pub fn new(link: Arc<L>, prober: Arc<P>, leases: InterfaceLeases, config: &TwinConfig) -> Self {
        Self {
            link,
            prober,
            leases,
            interface: config.interface.clone(),
            target: config.target,
            monitor: config.monitor.clone(),
            on_apply_failure: config.on_apply_failure,
            seed: config.seed,
        }
    }

    /// Seed recorded in the report for plans with randomized phases.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Execute `plan`.
    ///
    /// Fails before touching the link if the interface is missing, already
    /// leased, or has no connectivity to the target. Once phases start, the
    /// run always ends with a cleanup and a final connectivity probe.
    pub async fn run(
        &self,
        plan: &ScenarioPlan,
        shutdown: &Shutdown,
    ) -> Result<ScenarioReport, SequencerError> {
        if !self.link.interface_exists(&self.interface).await {
            error!(interface = %self.interface, "interface not found");
            return Err(SequencerError::InterfaceMissing(self.interface.clone()));
        }
        let lease = self.leases.acquire(&self.interface)?;

        if !self
            .prober
            .probe(&self.interface, self.target, self.monitor.probe_timeout())
            .await
        {
            error!(interface = %self.interface, target = %self.target, "no initial connectivity");
            return Err(SequencerError::NoInitialConnectivity {
                interface: self.interface.clone(),
                target: self.target.to_string(),
            });
        }

        let mut stop = shutdown.listener();
        let mut controller = ImpairmentController::new(
            self.link.clone(),
            self.prober.clone(),
            lease,
            self.target,
            self.monitor.clone(),
            shutdown.listener(),
        );

        let mut report = ScenarioReport {
            scenario: plan.name.clone(),
            interface: self.interface.clone(),
            target: self.target,
            seed: self.seed,
            phases: Vec::with_capacity(plan.phases.len()),
            interrupted: false,
            aborted: false,
            final_cleanup_ok: false,
            final_connectivity: Connectivity::Degraded,
            elapsed_secs: 0.0,
        };

        info!(
            scenario = %plan.name,
            phases = plan.phases.len(),
            total_secs = plan.total_duration().as_secs(),
            interface = %self.interface,
            "starting scenario"
        );
        let started = Instant::now();

        for (index, phase) in plan.phases.iter().enumerate() {
            if stop.is_triggered() {
                report.interrupted = true;
                break;
            }
            info!(
                phase = index + 1,
                of = plan.phases.len(),
                kind = %phase.kind,
                duration_secs = phase.duration_secs,
                "entering phase"
            );
            let phase_start = Instant::now();

            let spec = match (phase.kind, &phase.spec) {
                (PhaseKind::Impairment, Some(spec)) => Some(spec),
                (PhaseKind::Impairment, None) => {
                    warn!(phase = index + 1, "impairment phase without a spec, idling instead");
                    None
                }
                _ => None,
            };

            let record = match spec {
                Some(spec) => {
                    let outcome = controller.run(spec).await;
                    let completed = !outcome.interrupted && outcome.error.is_none();
                    if outcome.interrupted {
                        report.interrupted = true;
                    }
                    if outcome.apply_failed && self.on_apply_failure == ApplyFailurePolicy::Abort {
                        warn!(phase = index + 1, "apply failed, aborting scenario");
                        report.aborted = true;
                    }
                    PhaseRecord {
                        index,
                        kind: phase.kind,
                        planned_secs: phase.duration_secs,
                        elapsed_secs: phase_start.elapsed().as_secs_f64(),
                        completed,
                        impairment: Some(outcome),
                    }
                }
                None => {
                    let completed = stop.sleep(phase.duration()).await;
                    if !completed {
                        report.interrupted = true;
                    }
                    PhaseRecord {
                        index,
                        kind: phase.kind,
                        planned_secs: phase.duration_secs,
                        elapsed_secs: phase_start.elapsed().as_secs_f64(),
                        completed,
                        impairment: None,
                    }
                }
            };
            report.phases.push(record);

            if report.interrupted || report.aborted {
                break;
            }
        }

        info!(scenario = %plan.name, "scenario finished, removing impairments");
        report.final_cleanup_ok = controller.cleanup().await.is_ok();
        let reachable = self
            .prober
            .probe(&self.interface, self.target, self.monitor.probe_timeout())
            .await;
        report.final_connectivity = Connectivity::from_probe(reachable);
        report.elapsed_secs = started.elapsed().as_secs_f64();

        if reachable {
            info!(elapsed_secs = report.elapsed_secs, "final connectivity restored");
        } else {
            warn!(elapsed_secs = report.elapsed_secs, "final connectivity degraded");
        }
        Ok(report)
    }
}
