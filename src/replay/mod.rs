//! Synthetic traffic replay.
//!
//! Two producers run concurrently until a shared stop signal fires: a probe
//! producer emitting paced ICMP echoes shaped by the captured ping series, and
//! a background producer sending occasional UDP datagrams. Each producer owns
//! its own seeded generator; they share nothing but the stop signal.

pub mod pacing;

use crate::analyzer::Characterization;
use crate::config::ReplayConfig;
use crate::error::ReplayError;
use crate::shutdown::{Shutdown, ShutdownListener};
use link_control::{DatagramRequest, PingRequest, Prober};
use pacing::{BackgroundPacer, ProbePacer};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Probe budget and spacing derived from a captured ping series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySource {
    pub probe_count: usize,
    pub interval: Duration,
}

impl ReplaySource {
    /// One probe per captured reply, spaced at the captured rate when known.
    /// Rates that do not yield a representable interval fall back to `nominal`.
    pub fn from_ping(ping: &Characterization, nominal: Duration) -> Self {
        let interval = if ping.samples_per_sec > 0.0 && ping.samples_per_sec.is_finite() {
            Duration::try_from_secs_f64(1.0 / ping.samples_per_sec).unwrap_or(nominal)
        } else {
            nominal
        };
        Self {
            probe_count: ping.sample_count,
            interval,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub probes_sent: u64,
    pub probes_answered: u64,
    pub background_sent: u64,
    pub elapsed_secs: f64,
    pub interrupted: bool,
    pub log_path: PathBuf,
}

#[derive(Debug, Default)]
struct ProbeStats {
    sent: u64,
    answered: u64,
}

enum Produced {
    Probes(ProbeStats),
    Background(u64),
}

pub struct ReplayDriver<P> {
    prober: Arc<P>,
    config: ReplayConfig,
    interface: String,
    target: IpAddr,
    seed: u64,
}

impl<P: Prober + 'static> ReplayDriver<P> {
    pub fn new(
        prober: Arc<P>,
        config: ReplayConfig,
        interface: impl Into<String>,
        target: IpAddr,
        seed: u64,
    ) -> Self {
        Self {
            prober,
            config,
            interface: interface.into(),
            target,
            seed,
        }
    }

    /// Run both producers for `duration`, or until `shutdown` fires.
    ///
    /// The probe producer also stops once it has emitted `source.probe_count`
    /// probes. Both producers are always joined before returning, and are
    /// aborted if the returned future is dropped first.
    pub async fn start(
        &self,
        source: ReplaySource,
        duration: Duration,
        shutdown: &Shutdown,
    ) -> Result<ReplaySummary, ReplayError> {
        let log_path = self.config.log_path.clone();
        let log = open_log(&log_path).await?;

        info!(
            interface = %self.interface,
            target = %self.target,
            probes = source.probe_count,
            interval_ms = source.interval.as_millis() as u64,
            duration_secs = duration.as_secs_f64(),
            seed = self.seed,
            "starting replay"
        );

        let stop = Shutdown::new();
        let started = Instant::now();

        let mut producers = JoinSet::new();
        let probe_task = probe_producer(
            self.prober.clone(),
            ProbePacer::new(source.interval, &self.config, self.seed),
            self.interface.clone(),
            self.target,
            source.probe_count as u64,
            self.config.progress_every.max(1),
            log,
            stop.listener(),
        );
        producers.spawn(async move { Produced::Probes(probe_task.await) });
        let background_task = background_producer(
            self.prober.clone(),
            BackgroundPacer::new(&self.config, self.seed.wrapping_add(1)),
            SocketAddr::new(self.target, self.config.background_port),
            stop.listener(),
        );
        producers.spawn(async move { Produced::Background(background_task.await) });

        let mut external = shutdown.listener();
        let interrupted = !external.sleep(duration).await;
        stop.trigger();

        let mut probes = ProbeStats::default();
        let mut background_sent = 0;
        let mut failure = None;
        while let Some(joined) = producers.join_next().await {
            match joined {
                Ok(Produced::Probes(stats)) => probes = stats,
                Ok(Produced::Background(sent)) => background_sent = sent,
                Err(e) => failure = Some(e),
            }
        }
        if let Some(e) = failure {
            return Err(e.into());
        }

        let summary = ReplaySummary {
            probes_sent: probes.sent,
            probes_answered: probes.answered,
            background_sent,
            elapsed_secs: started.elapsed().as_secs_f64(),
            interrupted,
            log_path,
        };
        info!(
            probes = summary.probes_sent,
            answered = summary.probes_answered,
            background = summary.background_sent,
            interrupted,
            "replay finished"
        );
        Ok(summary)
    }
}

async fn open_log(path: &Path) -> Result<File, ReplayError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| ReplayError::Log {
            path: path.to_path_buf(),
            source,
        })
}

#[allow(clippy::too_many_arguments)]
async fn probe_producer<P: Prober>(
    prober: Arc<P>,
    mut pacer: ProbePacer,
    interface: String,
    target: IpAddr,
    budget: u64,
    progress_every: u64,
    mut log: File,
    mut stop: ShutdownListener,
) -> ProbeStats {
    let mut stats = ProbeStats::default();
    while stats.sent < budget {
        if !stop.sleep(pacer.next_interval()).await {
            break;
        }

        let request = PingRequest::new(interface.as_str(), target)
            .with_payload_size(pacer.next_payload())
            .with_timestamps();

        let reply = tokio::select! {
            reply = prober.ping(&request) => reply,
            _ = stop.triggered() => break,
        };
        stats.sent += 1;

        let line = match reply {
            Ok(reply) => {
                if reply.success {
                    stats.answered += 1;
                }
                reply.line
            }
            Err(e) => {
                debug!(error = %e, "probe failed");
                format!("probe error: {}", e)
            }
        };
        if let Err(e) = log.write_all(format!("{}\n", line).as_bytes()).await {
            warn!(error = %e, "failed to append to replay log");
        }

        if stats.sent % progress_every == 0 {
            info!(sent = stats.sent, budget, answered = stats.answered, "replay progress");
        }
    }
    if let Err(e) = log.flush().await {
        warn!(error = %e, "failed to flush replay log");
    }
    stats
}

async fn background_producer<P: Prober>(
    prober: Arc<P>,
    mut pacer: BackgroundPacer,
    target: SocketAddr,
    mut stop: ShutdownListener,
) -> u64 {
    let mut sent = 0u64;
    while !stop.is_triggered() {
        if pacer.should_send() {
            let request = DatagramRequest {
                target,
                payload: pacer.next_payload(),
            };
            match prober.send_datagram(&request).await {
                Ok(()) => sent += 1,
                Err(e) => debug!(error = %e, "background datagram failed"),
            }
        }
        if !stop.sleep(pacer.next_delay()).await {
            break;
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_uses_captured_rate() {
        let ping = Characterization {
            sample_count: 50,
            samples_per_sec: 4.0,
            ..Default::default()
        };
        let source = ReplaySource::from_ping(&ping, Duration::from_millis(200));
        assert_eq!(source.probe_count, 50);
        assert_eq!(source.interval, Duration::from_millis(250));
    }

    #[test]
    fn source_falls_back_to_nominal() {
        let source = ReplaySource::from_ping(&Characterization::default(), Duration::from_millis(200));
        assert_eq!(source.probe_count, 0);
        assert_eq!(source.interval, Duration::from_millis(200));
    }

    #[test]
    fn source_ignores_unrepresentable_rate() {
        let ping = Characterization {
            sample_count: 3,
            samples_per_sec: 1e-30,
            ..Default::default()
        };
        let source = ReplaySource::from_ping(&ping, Duration::from_millis(200));
        assert_eq!(source.probe_count, 3);
        assert_eq!(source.interval, Duration::from_millis(200));
    }
}
