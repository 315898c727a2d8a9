use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use tasteseed::{app::App, cache::Cache, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────────
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasteseed=info"));
    // stdout carries the report, logs go to stderr
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load()?;
    let redis_url = config.redis_url.clone();

    // ── Try Redis (optional, the app works without it) ───────────────────────
    let cache = Cache::new(&redis_url)?;
    if cache.ping().await {
        info!("Redis connected at {redis_url}");
    } else {
        warn!("Redis not reachable, token and profile caching disabled");
    }

    // ── Run the app ──────────────────────────────────────────────────────────
    let app = App::new(config, Arc::new(cache));
    if let Err(e) = app.run().await {
        error!("App error: {e:?}");
        eprintln!("\n\x1b[31mtasteseed failed:\x1b[0m {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
