// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/magnetometer-rs

//! Magnetometer - sensor session demo
//!
//! Drives a session over the simulated sensor port and prints each reading
//! as JSON, either once or as a periodic watch.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use magnetometer::{
    Config, MagnetometerClient, MagnetometerPlugin, Outcome, SensorSession, SimulatedSensorPort,
    TokioWatchdog, VERSION,
};

/// Magnetometer - sensor session demo
#[derive(Parser, Debug)]
#[command(name = "magnetometer")]
#[command(version = VERSION)]
#[command(about = "Read the magnetic field through an accuracy-gated sensor session")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Watch readings instead of taking a single one
    #[arg(short, long)]
    watch: bool,

    /// Number of readings to print in watch mode
    #[arg(long, default_value = "10")]
    count: usize,

    /// Watch interval in milliseconds (overrides config)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Simulate a device without a magnetometer
    #[arg(long)]
    no_sensor: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Magnetometer v{}", VERSION);

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    if args.no_sensor {
        config.simulator.devices = 0;
    }
    if let Some(ms) = args.interval_ms {
        config.client.watch_interval_ms = ms;
    }

    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config, args))
}

async fn run(config: Config, args: Args) -> Result<()> {
    let port = Arc::new(SimulatedSensorPort::new(config.simulator.clone()));
    let watchdog = Arc::new(TokioWatchdog::new(tokio::runtime::Handle::current()));
    let session = SensorSession::new(port, watchdog, config.session.clone());
    info!(
        "Reporting samples at {:?} accuracy or better, watchdog after {:?}",
        session.config().min_accuracy,
        session.config().watchdog_timeout()
    );
    let plugin = Arc::new(MagnetometerPlugin::new(session));
    let client = MagnetometerClient::new(plugin.clone(), &config.client);

    if !args.watch {
        tokio::select! {
            result = client.get_current_reading() => match result {
                Ok(reading) => println!("{}", Outcome::Success(reading).payload()),
                Err(e) => warn!("Reading failed: {}", e),
            },
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
        return Ok(());
    }

    let (id, mut rx) = client.watch_readings(None);
    let mut printed = 0;

    while printed < args.count {
        tokio::select! {
            next = rx.recv() => match next {
                Some(Ok(reading)) => {
                    println!("{}", Outcome::Success(reading).payload());
                    printed += 1;
                }
                Some(Err(e)) => {
                    warn!("Watch failed: {}", e);
                    break;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    client.clear_watch(id);
    plugin.on_destroy();

    info!("Magnetometer shutdown complete");
    Ok(())
}
