//! Network digital twin CLI
//!
//! This tool characterizes captured 5G traffic, replays a statistically
//! similar load through a UE tunnel, and runs safety-bounded impairment
//! scenarios against that tunnel.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cmd_analyze, cmd_clean, cmd_inject, cmd_list, cmd_replay, GlobalOpts};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ndt-twin", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Interface to shape and probe through (overrides config)
    #[arg(long, global = true)]
    interface: Option<String>,

    /// Probe target address (overrides config)
    #[arg(long, global = true)]
    target: Option<IpAddr>,

    /// Seed for randomized pacing and scenario choices (overrides config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Run tc through sudo
    #[arg(long, global = true)]
    sudo: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Characterize the captures in a data directory
    Analyze {
        /// Directory holding core_traffic.csv, gnb_gtp.csv and ue_ping.log
        data_dir: PathBuf,

        /// Skip writing <label>_bandwidth.csv series
        #[arg(long)]
        no_export: bool,
    },

    /// Replay traffic shaped like a previous analysis
    Replay {
        /// Analysis file written by `analyze`
        #[arg(long)]
        analysis: PathBuf,

        /// Duration to run (seconds)
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
        duration: u64,

        /// Probe result log (overrides config)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Run a named impairment scenario
    Inject {
        /// Scenario name (mild, moderate, severe, mixed, stress)
        #[arg(long, default_value = "mild")]
        scenario: String,

        /// Also write the report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List available scenarios
    List,

    /// Remove any impairment left on the interface
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let opts = GlobalOpts {
        config: cli.config,
        interface: cli.interface,
        target: cli.target,
        seed: cli.seed,
        sudo: cli.sudo,
    };

    match cli.command {
        Commands::Analyze {
            data_dir,
            no_export,
        } => {
            cmd_analyze(&data_dir, !no_export)?;
        }
        Commands::Replay {
            analysis,
            duration,
            log,
        } => {
            cmd_replay(&opts, &analysis, duration, log).await?;
        }
        Commands::Inject { scenario, report } => {
            cmd_inject(&opts, &scenario, report).await?;
        }
        Commands::List => {
            cmd_list()?;
        }
        Commands::Clean => {
            cmd_clean(&opts).await?;
        }
    }

    Ok(())
}
