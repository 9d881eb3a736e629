//! gwsync - Mirror an APISIX gateway's routing objects into a consistent cache

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod sync;

use config::{Config, LoggingConfig};
use gwsync_apisix::{AdminClient, AdminClientConfig, DumpDir};
use gwsync_core::{DbCache, ReferenceGuard};

/// gwsync - Load gateway routes, upstreams and certificates into the cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gwsync.toml")]
    config: String,

    /// Admin API base URL
    #[arg(long, env = "GWSYNC_ADMIN_URL")]
    admin_url: Option<String>,

    /// Admin API key
    #[arg(long, env = "GWSYNC_API_KEY")]
    api_key: Option<String>,

    /// Read dumped LIST responses from this directory instead of the Admin API
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Where upstream deletion checks for bound routes (snapshot, in-transaction)
    #[arg(long, env = "GWSYNC_REFERENCE_GUARD")]
    reference_guard: Option<ReferenceGuard>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(url) = args.admin_url {
        config.gateway.url = url;
    }
    if let Some(key) = args.api_key {
        config.gateway.api_key = Some(key);
    }
    if let Some(guard) = args.reference_guard {
        config.cache.reference_guard = guard;
    }

    init_logging(&config.logging);

    info!("Starting gwsync v{}", env!("CARGO_PKG_VERSION"));

    let cache = DbCache::with_config(config.cache.clone()).context("Failed to create cache")?;

    let objects = match args.dump_dir {
        Some(dir) => {
            let dump = DumpDir::new(dir);
            dump.load().with_context(|| {
                format!("Failed to load gateway dump from {}", dump.path().display())
            })?
        }
        None => {
            let client = AdminClient::new(AdminClientConfig {
                url: config.gateway.url.clone(),
                api_key: config.gateway.api_key.clone(),
                timeout: config.gateway.timeout(),
                skip_tls_verify: config.gateway.skip_tls_verify,
            })?;
            client
                .fetch_all()
                .await
                .with_context(|| format!("Failed to fetch objects from {}", config.gateway.url))?
        }
    };

    let report = sync::load_snapshot(&cache, &objects)?;

    println!(
        "routes: {}  upstreams: {}  ssl: {}",
        report.stats.routes, report.stats.upstreams, report.stats.ssl
    );
    for (route, upstream) in &report.dangling {
        println!("route {} -> missing upstream {}", route, upstream);
    }
    for upstream in &report.unused {
        println!("upstream {} has no routes", upstream);
    }

    info!("Done");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
