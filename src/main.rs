//! # Get Latency Bench - Main Entry Point
//!
//! 1. **Initialize logging**: timestamped, colorized lines on stderr
//! 2. **Parse arguments**: target object, window size, concurrency, pool knobs
//! 3. **Build the store**: connection pool and HTTP client; failures are fatal
//! 4. **Run workers**: forever, until the process is killed
//!
//! ## Error Handling
//!
//! Startup errors (invalid options, unusable endpoint, TLS setup) are logged
//! and end the process with a non-zero status. Once workers run, request
//! failures are only logged; they never stop sampling.

use anyhow::{Context, Result};
use clap::Parser;
use get_latency_bench::{
    cli::Args,
    config::{BenchConfig, BenchConfigDisplay},
    logging::TimestampedFormatter,
    storage::{ConnectionPool, HttpObjectStore},
    summary::LogSink,
    supervisor::Supervisor,
    worker::StopSignal,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // RUST_LOG takes precedence over --verbose.
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(TimestampedFormatter)
        .init();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!(
        "region: {} bucket: {} key: {} size: {}",
        args.region, args.bucket, args.key, args.size
    );

    let config = BenchConfig::from_args(&args)?;
    info!("\n{}", BenchConfigDisplay(&config));

    let pool = ConnectionPool::new(config.pool.clone(), config.secure)
        .context("Failed to set up the connection pool")?;
    let store = HttpObjectStore::new(&config.endpoint, Arc::new(pool), config.secure)
        .with_context(|| format!("Failed to set up a client for {}", config.endpoint))?;

    let supervisor = Supervisor::new(
        config.concurrency,
        config.worker,
        Arc::new(store),
        Arc::new(LogSink),
    );

    // Workers never finish on their own; nothing triggers this signal.
    supervisor.run(StopSignal::new()).await?;
    Ok(())
}
