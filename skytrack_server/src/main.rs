//! SkyTrack Server CLI
//!
//! Runs the contact simulator and serves the SSE stream, login and health
//! endpoints.

use anyhow::Result;
use clap::Parser;
use skytrack_core::{Bounds, BroadcastConfig, ContactSimulator, SimulatorConfig};
use skytrack_server::{create_router, AppState};
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// SkyTrack contact stream server
#[derive(Parser, Debug)]
#[command(name = "skytrack-server")]
#[command(about = "Simulate a contact population and stream it over SSE", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "4000", env = "SKYTRACK_PORT")]
    port: u16,

    /// Stream credential subscribers must present
    #[arg(long, default_value = "skytrack-dev-key", env = "SKYTRACK_API_KEY")]
    api_key: String,

    /// Simulator seed (0 = random from OS entropy)
    #[arg(short, long, default_value = "0", env = "SKYTRACK_SEED")]
    seed: u64,

    /// Contacts spawned at startup
    #[arg(long, default_value = "30", env = "SKYTRACK_INITIAL_COUNT")]
    initial_count: usize,

    /// Hard cap on the contact table
    #[arg(long, default_value = "200", env = "SKYTRACK_MAX_COUNT")]
    max_count: usize,

    /// Movement tick interval in milliseconds
    #[arg(long, default_value = "10000", env = "SKYTRACK_UPDATE_INTERVAL_MS")]
    update_interval_ms: u64,

    /// Spawn tick interval in milliseconds
    #[arg(long, default_value = "20000", env = "SKYTRACK_SPAWN_INTERVAL_MS")]
    spawn_interval_ms: u64,

    /// Despawn tick interval in milliseconds
    #[arg(long, default_value = "25000", env = "SKYTRACK_DESPAWN_INTERVAL_MS")]
    despawn_interval_ms: u64,

    /// Broadcast tick interval in milliseconds
    #[arg(long, default_value = "10000", env = "SKYTRACK_BROADCAST_INTERVAL_MS")]
    broadcast_interval_ms: u64,

    /// Per-contact, per-tick drop probability
    #[arg(long, default_value = "0.2", env = "SKYTRACK_DROP_CHANCE")]
    drop_chance: f64,

    /// Southern edge of the simulation box, degrees
    #[arg(long, default_value = "44.38", env = "SKYTRACK_MIN_LAT")]
    min_lat: f64,

    /// Northern edge of the simulation box, degrees
    #[arg(long, default_value = "52.38", env = "SKYTRACK_MAX_LAT")]
    max_lat: f64,

    /// Western edge of the simulation box, degrees
    #[arg(long, default_value = "22.14", env = "SKYTRACK_MIN_LNG")]
    min_lng: f64,

    /// Eastern edge of the simulation box, degrees
    #[arg(long, default_value = "40.23", env = "SKYTRACK_MAX_LNG")]
    max_lng: f64,

    /// Minimum contact speed, meters per second
    #[arg(long, default_value = "20.0", env = "SKYTRACK_MIN_SPEED_MPS")]
    min_speed_mps: f64,

    /// Maximum contact speed, meters per second
    #[arg(long, default_value = "60.0", env = "SKYTRACK_MAX_SPEED_MPS")]
    max_speed_mps: f64,

    /// Maximum per-tick heading change, degrees either way
    #[arg(long, default_value = "15.0", env = "SKYTRACK_HEADING_CHANGE_MAX_DEG")]
    heading_change_max_deg: f64,

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

    let config = SimulatorConfig {
        initial_count: args.initial_count,
        max_count: args.max_count,
        update_interval_ms: args.update_interval_ms,
        spawn_interval_ms: args.spawn_interval_ms,
        despawn_interval_ms: args.despawn_interval_ms,
        bounds: Bounds {
            min_lat: args.min_lat,
            max_lat: args.max_lat,
            min_lng: args.min_lng,
            max_lng: args.max_lng,
        },
        min_speed_mps: args.min_speed_mps,
        max_speed_mps: args.max_speed_mps,
        heading_change_max_deg: args.heading_change_max_deg,
    };

    let simulator = Arc::new(if args.seed == 0 {
        ContactSimulator::new(config)
    } else {
        info!(seed = args.seed, "running reproducible simulation");
        ContactSimulator::seeded(config, args.seed)
    });
    simulator.start();

    let broadcast = BroadcastConfig {
        interval_ms: args.broadcast_interval_ms,
        drop_chance: args.drop_chance,
    };
    let state = AppState::new(Arc::clone(&simulator), broadcast, args.api_key);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(addr = %listener.local_addr()?, "skytrack server listening");

    // SSE subscribers hold their connections open indefinitely, so a
    // graceful drain would never finish; stop the simulator and exit.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            simulator.stop();
        }
    }

    Ok(())
}
