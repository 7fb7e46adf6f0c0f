//! Keystone Daemon - Main entry point
//!
//! Reads vendor events (one JSON object per line) and reconciles them into
//! the device set, persisting bound accessories between runs.

mod cache;
mod config;
mod worker;

use anyhow::{Context, Result};
use clap::Parser;
use keystone_core::{AccessoryFactory, VendorDictionary};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::cache::AccessoryCache;
use crate::worker::{Bridge, VendorEvent};

#[derive(Parser, Debug)]
#[command(name = "keystone")]
#[command(about = "Security-system to home-hub device reconciliation daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "keystone.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// File of vendor events, one JSON object per line (overrides `bridge.events`)
    #[arg(short, long)]
    events: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Keystone v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    info!(
        panel_id = config.bridge.panel_id,
        ignored = config.engine.ignore_device_types.len(),
        "Configuration loaded"
    );

    let dictionary = match &config.bridge.dictionary {
        Some(path) => VendorDictionary::from_file(Path::new(path))
            .with_context(|| format!("Failed to load vendor dictionary {}", path))?,
        None => VendorDictionary::builtin()?,
    };

    let cache_path = PathBuf::from(&config.bridge.accessory_cache);
    let cache = AccessoryCache::load_or_create(&cache_path)
        .with_context(|| format!("Failed to load accessory cache {}", cache_path.display()))?;

    let factory = AccessoryFactory::new(config.engine.clone(), dictionary);
    let mut bridge = Bridge::new(factory, config.bridge.panel_id, cache);
    bridge.restore()?;

    let (tx, rx) = mpsc::channel(config.bridge.queue_depth.max(1));
    let worker = worker::spawn(bridge, rx);

    let events = args.events.or_else(|| config.bridge.events.as_ref().map(PathBuf::from));
    let sent = match &events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open events file {}", path.display()))?;
            feed(BufReader::new(file), &tx).await?
        }
        None => feed(BufReader::new(tokio::io::stdin()), &tx).await?,
    };
    drop(tx);

    let bridge = worker.await??;
    info!(events = sent, devices = bridge.devices().len(), "Event stream finished");

    let mut cache = bridge.into_cache();
    cache.save(&cache_path)?;
    info!(path = %cache_path.display(), accessories = cache.len(), "Saved accessory cache");

    Ok(())
}

/// Parse events line by line and queue them for the worker
///
/// Lines that do not parse are logged and skipped.
async fn feed<R>(reader: R, tx: &mpsc::Sender<VendorEvent>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0;
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<VendorEvent>(&line) {
            Ok(event) => {
                // The worker only stops early on a fatal bind error
                if tx.send(event).await.is_err() {
                    warn!(line = line_no, "Worker stopped, no longer reading events");
                    break;
                }
                sent += 1;
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed event"),
        }
    }

    Ok(sent)
}
