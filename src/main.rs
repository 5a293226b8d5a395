pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod inbound;
pub mod model;
pub mod net;
pub mod presenter;
pub mod registry;
pub mod repl;
pub mod session;

#[cfg(test)]
mod testing;
mod util;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use crate::capture::synthetic::SyntheticDevices;
use crate::config::ConfigStore;
use crate::controller::Controller;
use crate::net::loopback::LoopbackHub;
use crate::presenter::ConsolePresenter;
use crate::repl::Console;

/// Interactive peer-to-peer connection tester
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Settings file, created on first save
    #[arg(long, default_value = "peer-tester.json")]
    config: PathBuf,

    /// Start a signaling session right away
    #[arg(long)]
    connect: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_log();

    let store = ConfigStore::new(cli.config);
    let settings = store.load();
    info!("Using settings from {}", store.path().display());

    let (tx, rx) = mpsc::unbounded_channel();
    let hub = LoopbackHub::new();
    let controller = Controller::new(
        hub.network(tx.clone()),
        SyntheticDevices::new(tx),
        ConsolePresenter::default(),
    );

    let mut console = Console::new(controller, store, settings);
    if cli.connect {
        console.start();
    }
    console.run(rx).await
}
