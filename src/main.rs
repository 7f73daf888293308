//! CLI Entry Point for vv-harness
//!
//! Provides command-line interface for:
//! - Running the end-to-end suites against VibrationVIEW
//! - Printing the hardware description of a connected instance
//! - Dumping TEDS sheets per channel
//!
//! Every command talks to the live automation server by default (Windows builds
//! with the `com` feature). `--mock` swaps in the simulated instance wired to the
//! reference bench, which works everywhere.
//!
//! # Usage
//!
//! ```bash
//! vv-harness run
//! vv-harness run --suite sine_specific --suite recording --mock
//! vv-harness info
//! vv-harness teds --channel 1 --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;

use vibrationview::config::{Config, PathsConfig};
use vibrationview::endpoint::Connector;
use vibrationview::harness::fixtures;
use vibrationview::harness::{Harness, HarnessOptions, ResultLog, Suite};
use vibrationview::logging;
use vibrationview::teds::TedsOutcome;
use vibrationview::VibrationView;

#[derive(Parser)]
#[command(name = "vv-harness")]
#[command(about = "End-to-end checks for the VibrationVIEW automation interface", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/vibrationview.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the simulated instance instead of a live one
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites (all by default) and print a summary
    Run {
        /// Suite to run; repeat to select several
        #[arg(long = "suite", value_parser = parse_suite)]
        suites: Vec<Suite>,

        /// Skip the pauses between window and sweep commands
        #[arg(long)]
        no_pause: bool,
    },

    /// Connect and print the hardware description
    Info,

    /// Dump TEDS per channel
    Teds {
        /// 1-based channel; all channels when omitted
        #[arg(long)]
        channel: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn parse_suite(name: &str) -> Result<Suite, String> {
    Suite::from_name(name).ok_or_else(|| {
        let known: Vec<_> = Suite::ALL.iter().map(|s| s.name()).collect();
        format!("unknown suite '{name}', expected one of: {}", known.join(", "))
    })
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let (connector, paths) = connector(cli.mock, &config)?;

    match cli.command {
        Commands::Run { suites, no_pause } => run_suites(connector, &config, paths, &suites, no_pause),
        Commands::Info => show_info(connector, &config).map(|_| ExitCode::SUCCESS),
        Commands::Teds { channel, json } => {
            show_teds(connector, &config, channel, json).map(|_| ExitCode::SUCCESS)
        }
    }
}

/// The transport to use and the folders the suites should look in.
fn connector(mock: bool, config: &Config) -> Result<(Arc<dyn Connector>, PathsConfig)> {
    if mock {
        let root = config.paths.output_dir.join("mock_bench");
        let paths = fixtures::materialize(&root)
            .with_context(|| format!("creating mock bench under {}", root.display()))?;
        info!(root = %root.display(), "Using simulated VibrationVIEW");
        return Ok((Arc::new(fixtures::mock_bench(&paths)), paths));
    }
    live_connector().map(|c| (c, config.paths.clone()))
}

#[cfg(all(windows, feature = "com"))]
fn live_connector() -> Result<Arc<dyn Connector>> {
    Ok(Arc::new(vibrationview::com::ComConnector::new()))
}

#[cfg(not(all(windows, feature = "com")))]
fn live_connector() -> Result<Arc<dyn Connector>> {
    bail!("this build has no automation transport (Windows + `com` feature); rerun with --mock")
}

fn connect(connector: Arc<dyn Connector>, config: &Config) -> Result<VibrationView> {
    let vv = VibrationView::connect(connector, &config.connection_settings());
    if !vv.is_alive() {
        bail!("could not connect to VibrationVIEW ({})", config.connection.prog_id);
    }
    Ok(vv)
}

fn run_suites(
    connector: Arc<dyn Connector>,
    config: &Config,
    paths: PathsConfig,
    suites: &[Suite],
    no_pause: bool,
) -> Result<ExitCode> {
    let started = Local::now();
    println!("Starting VibrationVIEW tests at {}", started.format("%Y-%m-%d %H:%M:%S"));

    let mut options = HarnessOptions::from_config(config);
    options.paths = paths;
    if no_pause {
        options = options.with_pause(std::time::Duration::ZERO);
    }

    let log = ResultLog::create(&options.paths.output_dir, started, &options.paths.profiles_dir);
    let mut harness = Harness::new(connector, options, log);
    let summary = harness.run(suites);

    Ok(if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn show_info(connector: Arc<dyn Connector>, config: &Config) -> Result<()> {
    let vv = connect(connector, config)?;

    println!("VibrationVIEW {}", vv.software_version()?);
    println!("  Serial number:   {:X}", vv.hardware_serial_number()?);
    println!("  Input channels:  {}", vv.hardware_input_channels()?);
    println!("  Output channels: {}", vv.hardware_output_channels()?);
    println!("  Ready:           {}", vv.is_ready()?);
    println!("  Test type:       {}", vv.test_type()?.label());
    println!("  Running:         {}", vv.is_running()?);
    Ok(())
}

fn show_teds(
    connector: Arc<dyn Connector>,
    config: &Config,
    channel: Option<usize>,
    json: bool,
) -> Result<()> {
    let vv = connect(connector, config)?;

    let selected = match channel {
        Some(0) => bail!("channels are numbered from 1"),
        Some(n) => Some(vec![n - 1]),
        None => None,
    };
    let sheets = vv.teds(selected.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sheets)?);
        return Ok(());
    }

    for sheet in &sheets {
        println!("Channel {}", sheet.channel);
        match &sheet.outcome {
            TedsOutcome::Teds(entries) if entries.is_empty() => println!("  (no TEDS)"),
            TedsOutcome::Teds(entries) => {
                for entry in entries {
                    println!("  {:<40} {}", entry.key, entry.value);
                }
            }
            TedsOutcome::Error(info) => println!("  error: {info}"),
        }
    }
    Ok(())
}
