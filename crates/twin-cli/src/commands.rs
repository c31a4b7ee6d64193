//! CLI command implementations for the network digital twin
//!
//! Each subcommand lives here, apart from argument parsing, so the helpers
//! can be unit tested.

use anyhow::{Context, Result};
use link_control::{LinkController, SystemProber, TcLinkController};
use ndttwin::analyzer::ANALYSIS_FILE;
use ndttwin::{
    CaptureAnalyzer, CaptureSource, InterfaceLeases, ReplayDriver, ReplaySource,
    ScenarioSequencer, Shutdown, TrafficAnalysis, TwinConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scenarios::{ScenarioName, ScenarioPlan};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Options shared by every subcommand.
#[derive(Debug, Default, Clone)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub interface: Option<String>,
    pub target: Option<IpAddr>,
    pub seed: Option<u64>,
    pub sudo: bool,
}

/// Load the config file, if any, and apply command-line overrides.
fn resolve_config(opts: &GlobalOpts) -> Result<TwinConfig> {
    let mut config = match &opts.config {
        Some(path) => TwinConfig::from_file(path)?,
        None => TwinConfig::default(),
    };
    if let Some(interface) = &opts.interface {
        config.interface = interface.clone();
    }
    if let Some(target) = opts.target {
        config.target = target;
    }
    if opts.seed.is_some() {
        config.seed = opts.seed;
    }
    if opts.sudo {
        config.use_sudo = true;
    }
    Ok(config)
}

/// Helper function to resolve scenario names to plans
fn resolve_scenario(name: &str, seed: u64) -> Result<ScenarioPlan> {
    let scenario: ScenarioName = name.parse().map_err(|e| {
        error!("Unknown scenario: {}", name);
        anyhow::Error::new(e)
    })?;
    Ok(scenario.plan(&mut StdRng::seed_from_u64(seed)))
}

/// Implementation of the 'analyze' command - characterizes a data directory
pub fn cmd_analyze(data_dir: &Path, export: bool) -> Result<()> {
    if !data_dir.is_dir() {
        anyhow::bail!("Data directory not found: {}", data_dir.display());
    }
    info!("Analyzing captures in {}", data_dir.display());

    let analyzer = CaptureAnalyzer::new(data_dir);
    let analysis = analyzer.analyze();
    let path = analyzer.write_analysis(&analysis)?;

    if analysis.is_empty() {
        warn!("No capture data found in {}", data_dir.display());
    }

    println!("Traffic analysis");
    println!("================");
    for source in CaptureSource::ALL {
        let c = analysis.get(source);
        if c.is_empty() {
            println!("  {:<5} no data", source.label());
            continue;
        }
        let unit = if source == CaptureSource::Ping { "ms" } else { "Mbps" };
        println!(
            "  {:<5} {} samples over {:.1}s, mean {:.3} {unit}, p95 {:.3} {unit}, max {:.3} {unit}",
            source.label(),
            c.sample_count,
            c.duration_sec,
            c.mean_rate,
            c.p95,
            c.max_rate,
        );
        if let (Some(mean), Some(max)) = (c.mean_jitter, c.max_jitter) {
            println!("        jitter mean {:.3} ms, max {:.3} ms", mean, max);
        }
        if export {
            if let Some(csv) = analyzer.export_bandwidth(source, c)? {
                println!("        series: {}", csv.display());
            }
        }
    }
    println!("\nAnalysis written to {}", path.display());
    Ok(())
}

/// Implementation of the 'replay' command - drives synthetic traffic
pub async fn cmd_replay(
    opts: &GlobalOpts,
    analysis_path: &Path,
    duration: u64,
    log: Option<PathBuf>,
) -> Result<()> {
    let mut config = resolve_config(opts)?;
    if let Some(log) = log {
        config.replay.log_path = log;
    }
    let analysis = TrafficAnalysis::load(analysis_path)
        .with_context(|| format!("loading {}", analysis_path.display()))?;

    let source = ReplaySource::from_ping(&analysis.ping, config.replay.nominal_interval());
    if source.probe_count == 0 {
        warn!("Analysis has no ping series; only background traffic will be sent");
    }

    let seed = config.resolve_seed();
    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let driver = ReplayDriver::new(
        Arc::new(SystemProber::new()),
        config.replay.clone(),
        config.interface.clone(),
        config.target,
        seed,
    );
    let summary = driver
        .start(source, Duration::from_secs(duration), &shutdown)
        .await?;

    println!(
        "Replay {}: {} probes ({} answered), {} background datagrams in {:.1}s",
        if summary.interrupted { "interrupted" } else { "completed" },
        summary.probes_sent,
        summary.probes_answered,
        summary.background_sent,
        summary.elapsed_secs
    );
    println!("Probe log: {}", summary.log_path.display());
    Ok(())
}

/// Implementation of the 'inject' command - runs an impairment scenario
pub async fn cmd_inject(opts: &GlobalOpts, scenario: &str, report_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(opts)?;
    let seed = config.resolve_seed();
    let plan = resolve_scenario(scenario, seed)?;

    info!("Running scenario: {}", plan.name);
    info!("Description: {}", plan.description);

    let link = Arc::new(TcLinkController::new().with_sudo(config.use_sudo));
    let prober = Arc::new(SystemProber::new());
    let sequencer =
        ScenarioSequencer::new(link, prober, InterfaceLeases::new(), &config).with_seed(seed);

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let report = sequencer.run(&plan, &shutdown).await?;
    println!("{}", report);

    if let Some(path) = report_path {
        report
            .write_json(&path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if !report.final_cleanup_ok {
        anyhow::bail!(
            "Impairment rules may remain on {}; run `ndt-twin clean`",
            config.interface
        );
    }
    Ok(())
}

/// Implementation of the 'list' command - shows available scenarios
pub fn cmd_list() -> Result<()> {
    println!("Available scenarios:");
    println!("====================");

    for name in ScenarioName::ALL {
        println!("\n  {:<10} - {}", name.as_str(), name.description());
        let plan = name.plan(&mut StdRng::seed_from_u64(0));
        for phase in &plan.phases {
            println!("      {}", phase);
        }
        if name == ScenarioName::Mixed {
            println!("      (impairments and recovery lengths vary with --seed)");
        }
    }

    println!("\nAnalysis artifact: {}", ANALYSIS_FILE);
    Ok(())
}

/// Implementation of the 'clean' command - removes leftover impairments
pub async fn cmd_clean(opts: &GlobalOpts) -> Result<()> {
    let config = resolve_config(opts)?;
    let link = TcLinkController::new().with_sudo(config.use_sudo);

    if !link.interface_exists(&config.interface).await {
        anyhow::bail!("Interface not found: {}", config.interface);
    }
    link.clear(&config.interface).await?;

    let remaining = link.active_rules(&config.interface).await?;
    if remaining.is_empty() {
        println!("No impairment rules on {}", config.interface);
    } else {
        for rule in &remaining {
            println!("  still present: {}", rule);
        }
        anyhow::bail!("Failed to clear {}", config.interface);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_scenario() {
        for name in ["mild", "moderate", "severe", "mixed", "stress"] {
            let plan = resolve_scenario(name, 1).unwrap();
            assert_eq!(plan.name, name);
            assert!(!plan.phases.is_empty());
        }
        assert!(resolve_scenario("nonexistent_scenario", 1).is_err());
    }

    #[test]
    fn test_mixed_plan_follows_seed() {
        assert_eq!(
            resolve_scenario("mixed", 5).unwrap(),
            resolve_scenario("mixed", 5).unwrap()
        );
    }

    #[test]
    fn test_overrides_beat_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"interface": "tun3", "target": "10.0.0.1", "seed": 1}}"#).unwrap();

        let opts = GlobalOpts {
            config: Some(file.path().to_path_buf()),
            interface: Some("tun7".into()),
            seed: Some(99),
            ..Default::default()
        };
        let config = resolve_config(&opts).unwrap();
        assert_eq!(config.interface, "tun7");
        assert_eq!(config.target, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.seed, Some(99));
        assert!(!config.use_sudo);
    }

    #[test]
    fn test_defaults_without_config() {
        let config = resolve_config(&GlobalOpts::default()).unwrap();
        assert_eq!(config.interface, "uesimtun0");
    }
}
