//! ==============================================================================
//! main.rs - aquapulse hotspot map service entry point
//! ==============================================================================
//!
//! purpose:
//!     pulls environmental sensor readings on a timer, classifies each one by
//!     severity, keeps the map marker set in step with the latest pull and
//!     serves the marker layer, hotspot views and analytics to the browser.
//!
//! responsibilities:
//!     - load configuration (config/aquapulse.toml, cli / env overrides)
//!     - build the reading source (upstream http or simulated network)
//!     - run the refresh loop (fetch -> validate -> classify -> replace markers)
//!     - serve the dashboard and json api
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                      aquapulse (this file)                   │
//!     │  ┌──────────────────┐              ┌──────────────────────┐  │
//!     │  │ refresh loop     │              │ web server           │  │
//!     │  │ (refresh.rs)     │              │ (server.rs)          │  │
//!     │  └────────┬─────────┘              └──────────┬───────────┘  │
//!     │           │ write (apply only)     read / click│            │
//!     │           └──────────────┬────────────────────┘             │
//!     │                  ┌───────┴────────┐                         │
//!     │                  │ DashboardState │  Arc<RwLock<..>>        │
//!     │                  │  registry.rs   │                         │
//!     │                  │  surface.rs    │                         │
//!     │                  └────────────────┘                         │
//!     └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!                 │ fetch (source.rs)
//!         upstream json array / simulated sensors
//!
//! ==============================================================================

mod classifier;
mod config;
mod domain;
mod error;
mod hotspot;
mod insights;
mod refresh;
mod registry;
mod server;
mod source;
mod surface;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "AquaPulse sensor hotspot map service")]
struct Args {
    /// Path to aquapulse.toml (defaults to config/aquapulse.toml if present)
    #[arg(short, long, env = "AQUAPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to serve the dashboard on, overrides [server] bind
    #[arg(short, long, env = "AQUAPULSE_BIND")]
    bind: Option<String>,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // step 1: load configuration
    let mut config = match &args.config {
        Some(path) => config::PulseConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => config::PulseConfig::load_or_default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    // step 2: logging (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("aquapulse={},tower_http=warn", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("===========================================================");
    tracing::info!("  AquaPulse - sensor hotspot map");
    tracing::info!("===========================================================");
    config.print_summary();

    // step 3: shared state and refresher
    let source = source::Source::from_config(&config.source)?;
    let state = Arc::new(RwLock::new(refresh::DashboardState::new(surface::HeadlessSurface::new())));
    let refresher = Arc::new(
        refresh::Refresher::new(source, state).with_sensor_logging(config.logging.show_sensor_data),
    );

    // step 4: start the web server in background
    let web_refresher = refresher.clone();
    let bind = config.server.bind.clone();
    tokio::spawn(async move {
        if let Err(e) = server::run_server(&bind, web_refresher).await {
            tracing::error!("[ERROR] Web server error: {:#}", e);
        }
    });

    // step 5: refresh loop (first tick fires immediately)
    let interval = Duration::from_secs(config.polling.interval_seconds);
    refresher.run(interval).await;
    Ok(())
}
