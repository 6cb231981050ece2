//! SkyTrack Watch CLI
//!
//! Logs in, subscribes to a contact stream and periodically reports the
//! reconciled picture (active / lost / total).

use anyhow::{Context, Result};
use clap::Parser;
use skytrack_client::{login, ContactTracker, StreamClient, TrackerConfig};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Watch a SkyTrack contact stream from the terminal
#[derive(Parser, Debug)]
#[command(name = "skytrack-watch")]
#[command(about = "Subscribe to a SkyTrack server and track its contacts", long_about = None)]
struct Args {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:4000", env = "SKYTRACK_SERVER")]
    server: String,

    /// Stream credential
    #[arg(long, default_value = "skytrack-dev-key", env = "SKYTRACK_API_KEY")]
    api_key: String,

    /// Sweep cadence in milliseconds
    #[arg(long, default_value = "10000")]
    cleanup_interval_ms: u64,

    /// Silence before a contact is shown as lost, milliseconds
    #[arg(long, default_value = "45000")]
    lost_threshold_ms: u64,

    /// Silence before a contact is dropped, milliseconds
    #[arg(long, default_value = "120000")]
    remove_threshold_ms: u64,

    /// Reporting interval in milliseconds
    #[arg(long, default_value = "5000")]
    report_interval_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let api_key = login(&args.server, &args.api_key)
        .await
        .context("login rejected by server")?;
    info!(server = %args.server, "logged in");

    let client = StreamClient::new(
        format!("{}/api/contacts/stream", args.server),
        api_key,
    );
    client.on_open(|| info!("stream open"));
    client.on_error(|error| warn!(%error, "stream error"));

    let tracker = ContactTracker::new(
        client,
        TrackerConfig {
            cleanup_interval_ms: args.cleanup_interval_ms,
            lost_threshold_ms: args.lost_threshold_ms,
            remove_threshold_ms: args.remove_threshold_ms,
        },
    );
    tracker.start();

    let mut ticker = tokio::time::interval(Duration::from_millis(args.report_interval_ms));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let store = tracker.store();
                let store = store.lock().unwrap();
                info!(
                    active = store.active_count(),
                    lost = store.lost_count(),
                    total = store.total_count(),
                    connected = tracker.client().is_connected(),
                    "tracked picture"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    tracker.stop();
    Ok(())
}
