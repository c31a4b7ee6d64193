use super::lease::InterfaceLease;
use super::rule::netem_rule;
use crate::config::MonitorConfig;
use crate::shutdown::ShutdownListener;
use link_control::{LinkController, LinkError, NetemRule, PingRequest, Prober};
use scenarios::{ClampAdjustment, Impairment, ImpairmentKind, ImpairmentSpec};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Storm requests sent back to back before a short pause.
const STORM_BURST: u32 = 50;
const STORM_PAUSE: Duration = Duration::from_millis(200);
const STORM_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    Idle,
    Applying,
    Monitoring,
    DegradedRetry,
    Cleaning,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "IDLE",
            ControllerState::Applying => "APPLYING",
            ControllerState::Monitoring => "MONITORING",
            ControllerState::DegradedRetry => "DEGRADED_RETRY",
            ControllerState::Cleaning => "CLEANING",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Restored,
    Degraded,
}

impl Connectivity {
    pub fn from_probe(reachable: bool) -> Self {
        if reachable {
            Connectivity::Restored
        } else {
            Connectivity::Degraded
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Restored => f.write_str("restored"),
            Connectivity::Degraded => f.write_str("degraded"),
        }
    }
}

/// What happened during one impairment.
#[derive(Clone, Debug, Serialize)]
pub struct ImpairmentOutcome {
    pub kind: ImpairmentKind,
    pub requested: Impairment,
    /// Parameters after clamping to the safety bounds.
    pub applied: Impairment,
    /// Parameters in force when the impairment ended, after any backoff.
    pub final_applied: Impairment,
    pub adjustments: Vec<ClampAdjustment>,
    pub duration_secs: u64,
    pub checks: u32,
    pub retries: u32,
    pub apply_failed: bool,
    pub interrupted: bool,
    pub cleanup_ok: bool,
    pub signaling_sent: u64,
    pub post_connectivity: Connectivity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Removes whatever rule is left on the interface if a run is dropped
/// before reaching its own cleanup.
struct PendingCleanup<L: LinkController + 'static> {
    link: Arc<L>,
    interface: String,
    armed: bool,
}

impl<L: LinkController + 'static> PendingCleanup<L> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<L: LinkController + 'static> Drop for PendingCleanup<L> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(interface = %self.interface, "impairment run abandoned, scheduling cleanup");
        let Ok(handle) = Handle::try_current() else {
            error!(interface = %self.interface, "no runtime left to remove impairment rule");
            return;
        };
        let link = self.link.clone();
        let interface = std::mem::take(&mut self.interface);
        handle.spawn(async move {
            if let Err(e) = link.clear(&interface).await {
                error!(interface = %interface, error = %e, "deferred cleanup failed");
            }
        });
    }
}

/// Applies one impairment at a time to a leased interface, watches
/// connectivity while it is active, and always removes it afterwards.
///
/// The lifecycle is `IDLE -> APPLYING -> MONITORING -> CLEANING -> IDLE`.
/// A failed connectivity checkpoint moves through `DEGRADED_RETRY`, where the
/// rule is removed and a less severe variant installed.
pub struct ImpairmentController<L, P> {
    link: Arc<L>,
    prober: Arc<P>,
    lease: InterfaceLease,
    target: IpAddr,
    monitor: MonitorConfig,
    stop: ShutdownListener,
    state: ControllerState,
    transitions: Vec<ControllerState>,
}

impl<L, P> ImpairmentController<L, P>
where
    L: LinkController + 'static,
    P: Prober + 'static,
{
    pub fn new(
        link: Arc<L>,
        prober: Arc<P>,
        lease: InterfaceLease,
        target: IpAddr,
        monitor: MonitorConfig,
        stop: ShutdownListener,
    ) -> Self {
        Self {
            link,
            prober,
            lease,
            target,
            monitor,
            stop,
            state: ControllerState::Idle,
            transitions: vec![ControllerState::Idle],
        }
    }

    pub fn interface(&self) -> &str {
        self.lease.interface()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn transitions(&self) -> &[ControllerState] {
        &self.transitions
    }

    fn transition(&mut self, next: ControllerState) {
        if self.state != next {
            debug!(interface = %self.lease.interface(), from = %self.state, to = %next, "controller state");
            self.state = next;
            self.transitions.push(next);
        }
    }

    async fn probe(&self) -> bool {
        self.prober
            .probe(self.lease.interface(), self.target, self.monitor.probe_timeout())
            .await
    }

    /// Run `spec` to completion, interruption or failure, then clean up.
    ///
    /// Never returns an error: failures are recorded on the outcome and the
    /// interface is cleared on every path.
    pub async fn run(&mut self, spec: &ImpairmentSpec) -> ImpairmentOutcome {
        let interface = self.lease.interface().to_string();
        let clamped = spec.impairment.clamp(&spec.bounds);
        for adj in &clamped.adjustments {
            warn!(
                interface = %interface,
                kind = %spec.kind(),
                parameter = adj.parameter,
                requested = adj.requested,
                applied = adj.applied,
                "impairment parameter clamped to safety bound"
            );
        }

        let mut outcome = ImpairmentOutcome {
            kind: spec.kind(),
            requested: spec.impairment.clone(),
            applied: clamped.impairment.clone(),
            final_applied: clamped.impairment.clone(),
            adjustments: clamped.adjustments.clone(),
            duration_secs: spec.duration_secs,
            checks: 0,
            retries: 0,
            apply_failed: false,
            interrupted: false,
            cleanup_ok: false,
            signaling_sent: 0,
            post_connectivity: Connectivity::Degraded,
            error: None,
        };

        info!(
            interface = %interface,
            impairment = %clamped.impairment,
            duration_secs = spec.duration_secs,
            "starting impairment"
        );

        let mut pending = PendingCleanup {
            link: self.link.clone(),
            interface: interface.clone(),
            armed: true,
        };

        if let Err(e) = self
            .execute(&clamped.impairment, spec.duration(), &mut outcome)
            .await
        {
            error!(interface = %interface, error = %e, "impairment aborted");
            outcome.error = Some(e.to_string());
        }

        outcome.cleanup_ok = self.cleanup().await.is_ok();
        pending.disarm();

        let reachable = self.probe().await;
        outcome.post_connectivity = Connectivity::from_probe(reachable);
        if reachable {
            info!(interface = %interface, "connectivity restored after impairment");
        } else {
            warn!(interface = %interface, "connectivity still degraded after cleanup");
        }
        outcome
    }

    /// Remove any impairment rule from the interface. Safe to call repeatedly.
    pub async fn cleanup(&mut self) -> Result<(), LinkError> {
        self.transition(ControllerState::Cleaning);
        let interface = self.lease.interface().to_string();
        let result = self.link.clear(&interface).await;
        match &result {
            Ok(()) => info!(interface = %interface, "impairment rules removed"),
            Err(e) => error!(interface = %interface, error = %e, "failed to remove impairment rules"),
        }
        self.transition(ControllerState::Idle);
        result
    }

    async fn execute(
        &mut self,
        impairment: &Impairment,
        duration: Duration,
        outcome: &mut ImpairmentOutcome,
    ) -> Result<(), LinkError> {
        let interface = self.lease.interface().to_string();
        if let Err(e) = self.link.clear(&interface).await {
            debug!(interface = %interface, error = %e, "pre-apply clear failed");
        }

        match (impairment, netem_rule(impairment)) {
            (Impairment::SignalingStorm { rate_per_sec }, _) => {
                self.signaling_storm(*rate_per_sec, duration, outcome).await
            }
            (_, Some(rule)) => self.shape(impairment, rule, duration, outcome).await,
            (_, None) => Ok(()),
        }
    }

    async fn install(&mut self, rule: &NetemRule) -> Result<(), LinkError> {
        let interface = self.lease.interface().to_string();
        self.link.apply(&interface, rule).await.map_err(|e| {
            error!(interface = %interface, rule = %rule, error = %e, "failed to apply impairment");
            e
        })
    }

    async fn shape(
        &mut self,
        impairment: &Impairment,
        rule: NetemRule,
        duration: Duration,
        outcome: &mut ImpairmentOutcome,
    ) -> Result<(), LinkError> {
        self.transition(ControllerState::Applying);
        if let Err(e) = self.install(&rule).await {
            outcome.apply_failed = true;
            return Err(e);
        }
        self.transition(ControllerState::Monitoring);

        let deadline = Instant::now() + duration;
        let interval = self.monitor.interval_for(duration);
        let mut current = impairment.clone();

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if !self.stop.sleep(interval.min(deadline - now)).await {
                warn!(interface = %self.lease.interface(), "impairment interrupted");
                outcome.interrupted = true;
                break;
            }
            if Instant::now() >= deadline {
                break;
            }

            outcome.checks += 1;
            if self.probe().await {
                debug!(interface = %self.lease.interface(), check = outcome.checks, "connectivity checkpoint passed");
                continue;
            }

            self.transition(ControllerState::DegradedRetry);
            outcome.retries += 1;
            current = current.reduced();
            warn!(
                interface = %self.lease.interface(),
                check = outcome.checks,
                reduced = %current,
                "connectivity checkpoint failed, backing off"
            );
            self.link.clear(self.lease.interface()).await?;
            if let Some(reduced_rule) = netem_rule(&current) {
                self.install(&reduced_rule).await?;
            }
            outcome.final_applied = current.clone();
            self.transition(ControllerState::Monitoring);
        }
        Ok(())
    }

    async fn signaling_storm(
        &mut self,
        rate_per_sec: u32,
        duration: Duration,
        outcome: &mut ImpairmentOutcome,
    ) -> Result<(), LinkError> {
        // Nothing to install on the link; the storm is the impairment.
        self.transition(ControllerState::Applying);
        self.transition(ControllerState::Monitoring);

        let deadline = Instant::now() + duration;
        let interval = self.monitor.interval_for(duration);
        let mut next_check = Instant::now() + interval;
        let mut next_send = Instant::now();
        let mut rate = rate_per_sec.max(1);
        let mut burst = 0u32;
        let mut in_flight = JoinSet::new();

        info!(interface = %self.lease.interface(), rate, "starting signaling storm");

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            if now >= next_check {
                outcome.checks += 1;
                if !self.probe().await {
                    self.transition(ControllerState::DegradedRetry);
                    outcome.retries += 1;
                    rate = (rate / 2).max(1);
                    outcome.final_applied = Impairment::SignalingStorm { rate_per_sec: rate };
                    warn!(interface = %self.lease.interface(), rate, "connectivity checkpoint failed, slowing storm");
                    self.transition(ControllerState::Monitoring);
                }
                next_check += interval;
                // pacing restarts after every checkpoint
                next_send = next_send.max(Instant::now() + storm_spacing(rate));
            } else if now >= next_send {
                let prober = self.prober.clone();
                let request = PingRequest::new(self.lease.interface(), self.target)
                    .with_timeout(STORM_REQUEST_TIMEOUT);
                in_flight.spawn(async move {
                    let _ = prober.ping(&request).await;
                });
                outcome.signaling_sent += 1;
                burst += 1;

                next_send = now + storm_spacing(rate);
                if burst >= STORM_BURST {
                    burst = 0;
                    next_send += STORM_PAUSE;
                }
            }

            let wake = next_send.min(next_check).min(deadline);
            if !self.stop.sleep(wake.saturating_duration_since(Instant::now())).await {
                warn!(interface = %self.lease.interface(), "signaling storm interrupted");
                outcome.interrupted = true;
                break;
            }
            while in_flight.try_join_next().is_some() {}
        }

        in_flight.shutdown().await;
        info!(interface = %self.lease.interface(), sent = outcome.signaling_sent, "signaling storm finished");
        Ok(())
    }
}

fn storm_spacing(rate_per_sec: u32) -> Duration {
    Duration::from_secs_f64(1.0 / rate_per_sec.max(1) as f64)
}
