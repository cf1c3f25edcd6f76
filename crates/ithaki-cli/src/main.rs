//! Ithaki command line client

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ithaki_core::prelude::*;
use ithaki_core::protocol::list_ports;
use std::path::{Path, PathBuf};

use crate::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "ithaki", version, about = "Client for the Ithaki network station")]
struct Cli {
    /// Configuration file (defaults to the per-user config file if present)
    #[arg(long, value_name = "FILE", env = "ITHAKI_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory result files are written to
    #[arg(long, value_name = "DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// How to reach the station
    #[arg(long, value_enum, global = true)]
    transport: Option<TransportArg>,

    /// Serial port, `host:port`, or link name
    #[arg(long, global = true)]
    link: Option<String>,

    /// Measurement window in seconds
    #[arg(long, value_name = "SECS", global = true)]
    window: Option<u64>,

    /// Seed for the demo station
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    Serial,
    Tcp,
    Demo,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Serial => Transport::Serial,
            TransportArg::Tcp => Transport::Tcp,
            TransportArg::Demo => Transport::Demo,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure echo packet latency
    Echo,
    /// Measure ARQ delivery with ACK/NACK retransmission
    Arq,
    /// Fetch a camera image
    Image {
        /// Request the image with injected errors
        #[arg(long)]
        damaged: bool,
    },
    /// Fetch a GPS track and the map image of its pins
    Gps {
        /// Route parameter, e.g. R=1028090
        #[arg(long)]
        route: Option<String>,
        /// Number of pins
        #[arg(long)]
        pins: Option<usize>,
        /// Minimum time between pins in seconds
        #[arg(long)]
        gap: Option<u64>,
        /// Only print the pin request, do not fetch the map
        #[arg(long)]
        no_image: bool,
    },
    /// Run every operation and write a summary
    Run,
    /// List serial ports
    Ports,
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => ClientConfig::default_path().context("Failed to locate configuration directory"),
    }
}

/// Load the configuration file and apply command line overrides
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match ClientConfig::default_path() {
            Ok(path) if path.exists() => ClientConfig::load(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            _ => ClientConfig::default(),
        },
    };

    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(transport) = cli.transport {
        config.connection.transport = transport.into();
    }
    if let Some(link) = &cli.link {
        config.connection.link = link.clone();
    }
    if let Some(window) = cli.window {
        config.measurement.window_secs = window;
    }
    if cli.seed.is_some() {
        config.demo.seed = cli.seed;
    }
    Ok(config)
}

fn print_stats(label: &str, stats: &Statistics, artifact: Option<&Path>) {
    let summary = stats.summary();
    println!(
        "{}: {} iterations, {} delivered, {} failed",
        label, summary.iterations, summary.delivered, summary.failed
    );
    if let (Some(min), Some(max), Some(mean)) = (
        summary.min_latency_ms,
        summary.max_latency_ms,
        summary.mean_latency_ms,
    ) {
        println!("  latency min/mean/max: {} / {:.1} / {} ms", min, mean, max);
    }
    print_artifact(artifact);
}

fn print_artifact(artifact: Option<&Path>) {
    match artifact {
        Some(path) => println!("  saved to {}", path.display()),
        None => println!("  not saved"),
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Ports => {
            let ports = list_ports().context("Failed to enumerate serial ports")?;
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                match (port.vid, port.pid) {
                    (Some(vid), Some(pid)) => println!(
                        "{}  {:04x}:{:04x}  {}",
                        port.name,
                        vid,
                        pid,
                        port.product.unwrap_or_default()
                    ),
                    _ => println!("{}", port.name),
                }
            }
            return Ok(());
        }
        Command::Config { action } => {
            return match action {
                ConfigAction::Init { force } => {
                    let path = config_path(&cli)?;
                    if path.exists() && !force {
                        bail!("{} already exists (use --force to overwrite)", path.display());
                    }
                    ClientConfig::default()
                        .save(&path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {}", path.display());
                    Ok(())
                }
                ConfigAction::Show => {
                    let config = load_config(&cli)?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                    Ok(())
                }
            };
        }
        _ => {}
    }

    let config = load_config(&cli)?;
    tracing::debug!(transport = ?config.connection.transport, link = %config.connection.link, "using configuration");
    let client = Client::from_config(config);

    match cli.command {
        Command::Echo => {
            let report = client.echo_statistics().context("Echo statistics failed")?;
            print_stats("echo", &report.data, report.artifact.as_deref());
        }
        Command::Arq => {
            let report = client.arq_statistics().context("ARQ statistics failed")?;
            print_stats("arq", &report.data, report.artifact.as_deref());
        }
        Command::Image { damaged } => {
            let kind = if damaged {
                ImageKind::Damaged
            } else {
                ImageKind::Clear
            };
            let report = client.receive_image(kind).context("Image request failed")?;
            println!("{}: {} bytes", kind.file_stem(), report.data.len());
            print_artifact(report.artifact.as_deref());
        }
        Command::Gps {
            route,
            pins,
            gap,
            no_image,
        } => {
            let settings = &client.config().gps;
            let route = route.unwrap_or_else(|| settings.route.clone());
            let pins = pins.unwrap_or(settings.pins);
            let gap = gap.unwrap_or(settings.time_gap_secs);

            let track = client
                .gps_tracking(&route, pins, gap)
                .context("GPS tracking failed")?;
            println!(
                "gps: {} samples, {} pins",
                track.samples.len(),
                track.pins.len()
            );
            println!("  request: {}", track.request);

            if !no_image {
                let map = client
                    .gps_image(&track.request)
                    .context("GPS image request failed")?;
                println!("gpsimage: {} bytes", map.data.len());
                print_artifact(map.artifact.as_deref());
            }
        }
        Command::Run => {
            let summary = client.run_all().context("Run failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Ports | Command::Config { .. } => {}
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli)
}
