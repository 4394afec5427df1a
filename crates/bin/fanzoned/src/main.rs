//! # fanzoned: fan zone control daemon
//!
//! Composition root that wires the adapters to the fan control engine.
//!
//! ## Responsibilities
//! - Parse the command line (`init` or `control` mode) and configuration
//! - Initialize logging
//! - Load the zone layout
//! - Construct the property bus and mode store adapters
//! - Build the `Manager` and run it in the selected mode
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no fan control logic belongs here.

mod config;
mod simulation;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use fanzone_adapter_json_store::JsonModeStore;
use fanzone_adapter_virtual_bus::VirtualBus;
use fanzone_app::manager::Manager;
use fanzone_domain::zone::ControlMode;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "fanzoned", version, about = "Fan zone control daemon")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Daemon configuration file.
    #[arg(long, global = true, default_value = "fanzone.toml")]
    config: PathBuf,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Mode {
    /// Drive every fan to full speed, then signal readiness and exit.
    Init,
    /// Run the control loop until interrupted.
    Control,
}

impl From<Mode> for ControlMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Init => Self::Init,
            Mode::Control => Self::Control,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let layout = config
        .load_layout()
        .with_context(|| format!("failed to load layout {}", config.control.layout.display()))?;

    let bus = Arc::new(VirtualBus::new());
    if let Some(path) = &config.control.simulation {
        let published = simulation::seed(&bus, path)?;
        tracing::info!(objects = published, "simulated objects published");
    }
    let store = JsonModeStore::new(&config.control.persist_root);

    let mode = ControlMode::from(cli.mode);
    let mut manager = Manager::new(bus, store, &layout, mode).context("failed to build the zones")?;

    match mode {
        ControlMode::Init => manager.do_init().await?,
        ControlMode::Control => {
            // thermal mode writes reach the loop through the bus; the sender
            // only keeps the in-process request channel open
            let (_requests, mut receiver) = mpsc::channel(16);
            manager.run(&mut receiver, shutdown_signal()).await?;
        }
    }

    tracing::info!("fanzoned stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for the interrupt signal");
        std::future::pending::<()>().await;
    }
}
