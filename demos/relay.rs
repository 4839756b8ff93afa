//! Host the relay from a JSON settings file.
//!
//! Demonstrates:
//! - Loading (and first-run writing) settings through `JsonFileProvider`
//! - Host lifecycle: load, exit event, unload
//! - Polling leg states while the relay runs
//!
//! Usage:
//!   cargo run --example relay
//!   cargo run --example relay -- --config ./relay.json
//!   cargo run --example relay -- --debug
//!   cargo run --example relay -- --no-wait

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use common::Args;
use ws_relay::{HostEvent, JsonFileProvider, RelayHost};

// ============================================================================
// Constants
// ============================================================================

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== WebSocket Relay ===\n");

    let path = match args.config {
        Some(path) => path,
        None => common::default_config_path().context("could not determine config directory")?,
    };
    println!("[Setup] Settings file: {}", path.display());

    let mut host = RelayHost::new(JsonFileProvider::new(&path));
    if !host.on_start() {
        anyhow::bail!("failed to create relay");
    }
    println!("        {}\n", host.status());

    if !host.status().configured {
        println!("Set \"remote_address\" in {} and run again.", path.display());
        host.unload();
        return Ok(());
    }

    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    let exit = common::wait_for_exit(args.no_wait);
    tokio::pin!(exit);

    loop {
        tokio::select! {
            _ = &mut exit => break,
            _ = ticker.tick() => {
                let status = host.status();
                println!(
                    "[Status] remote: {}, local: {}",
                    status.remote, status.local
                );
            }
        }
    }

    host.handle_event(HostEvent::Exit);
    host.unload();

    println!("\n=== Done ===");
    Ok(())
}
