//! Feed Client: connects to a stock hub, prints pushed trades and quotes, and
//! subscribes to symbols typed on stdin.
//!
//! Usage example (CLI):
//! ```bash
//! feed_client --profile trades --utc
//! RUST_LOG=debug feed_client --url http://localhost:5098/stock --skip-negotiation
//! ```
//!
//! Type `help` at the prompt for the list of commands.
use std::io::{self, BufReader, IsTerminal};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use clap::Parser;
use crossbeam_channel::unbounded;
use feed_client::App;
use feed_client::args::Args;
use feed_client::console::spawn_reader;
use feed_common::{HubError, Result};
use log::info;

fn main() -> Result<(), HubError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| HubError::InvalidState(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let config = args.to_config(io::stdout().is_terminal());
    info!(
        "Hub {} (subscribe method {})",
        config.hub_url, config.subscribe_method
    );

    let (console_tx, console_rx) = unbounded();
    spawn_reader(BufReader::new(io::stdin()), console_tx)?;

    let mut app = App::new(&config, io::stdout());
    app.mount()?;
    info!("Client is running. Type `help` for commands, Ctrl+C to exit.");
    app.run(console_rx, shutdown)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
