//! # Benchmark Configuration
//!
//! Converts parsed CLI arguments into the validated, immutable configuration
//! the rest of the crate runs on:
//!
//! - `WorkerConfig`: what every worker reads and how it is instrumented
//! - `PoolConfig`: connection pool sizing and timeouts
//! - endpoint, transport security and worker count
//!
//! Validation happens once, here. A configuration that fails validation is a
//! startup error and the process exits before any worker is spawned.

use crate::cli::{Args, InstrumentationLevel};
use crate::storage::{ObjectLocation, PoolConfig};
use crate::utils::{
    endpoint_for_region, validate_concurrency, validate_non_empty, validate_timeout,
    validate_window_size,
};
use anyhow::Result;
use std::fmt;

/// Per-worker settings, shared read-only by every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Object read on every iteration
    pub location: ObjectLocation,
    /// Samples per summary
    pub window_size: usize,
    /// Which phases of a request are timed
    pub instrumentation: InstrumentationLevel,
}

impl WorkerConfig {
    pub fn new(
        location: ObjectLocation,
        window_size: usize,
        instrumentation: InstrumentationLevel,
    ) -> Result<Self> {
        validate_non_empty("Bucket", &location.container)?;
        validate_non_empty("Key", &location.key)?;
        validate_window_size(window_size)?;

        Ok(Self {
            location,
            window_size,
            instrumentation,
        })
    }
}

/// Complete configuration of a run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub worker: WorkerConfig,
    pub pool: PoolConfig,
    /// Endpoint `host[:port]`
    pub endpoint: String,
    /// Region the endpoint was derived from, when given
    pub region: Option<String>,
    /// Whether to reach the endpoint over TLS
    pub secure: bool,
    /// Number of workers
    pub concurrency: usize,
}

impl BenchConfig {
    /// Create and validate a configuration from CLI arguments.
    ///
    /// The endpoint comes from `--endpoint` when given and is otherwise
    /// derived from `--region`; one of the two is required.
    pub fn from_args(args: &Args) -> Result<Self> {
        let region = Some(args.region.trim().to_string()).filter(|r| !r.is_empty());
        let endpoint = match (&args.endpoint, &region) {
            (Some(endpoint), _) => endpoint.trim().to_string(),
            (None, Some(region)) => endpoint_for_region(region),
            (None, None) => anyhow::bail!("Either --region or --endpoint must be provided"),
        };
        validate_non_empty("Endpoint", &endpoint)?;

        validate_concurrency(args.concurrency)?;
        validate_timeout("Dial timeout", args.dial_timeout)?;
        validate_timeout("Keep-alive", args.keep_alive)?;
        validate_timeout("Idle timeout", args.idle_timeout)?;
        validate_timeout("Handshake timeout", args.handshake_timeout)?;

        let worker = WorkerConfig::new(
            ObjectLocation::new(args.bucket.trim(), args.key.as_str()),
            args.size,
            args.instrumentation,
        )?;

        let pool = PoolConfig {
            dial_timeout: args.dial_timeout,
            keep_alive: args.keep_alive,
            max_idle_per_host: args.max_idle_per_host,
            max_idle: args.max_idle,
            idle_timeout: args.idle_timeout,
            handshake_timeout: args.handshake_timeout,
            expect_continue_timeout: args.expect_continue_timeout,
        };

        Ok(Self {
            worker,
            pool,
            endpoint,
            region,
            secure: args.ssl,
            concurrency: args.concurrency,
        })
    }
}

/// Startup banner describing the effective configuration.
pub struct BenchConfigDisplay<'a>(pub &'a BenchConfig);

impl fmt::Display for BenchConfigDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.0;
        let scheme = if config.secure { "https" } else { "http" };

        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Sampling GET latency for: {}", config.worker.location)?;
        writeln!(f, "  Endpoint:           {}://{}", scheme, config.endpoint)?;
        if let Some(region) = &config.region {
            writeln!(f, "  Region:             {}", region)?;
        }
        writeln!(f, "  Window Size:        {}", config.worker.window_size)?;
        writeln!(f, "  Concurrency:        {}", config.concurrency)?;
        writeln!(f, "  Instrumentation:    {}", config.worker.instrumentation)?;
        writeln!(
            f,
            "  Idle Connections:   {} per host, {} total, {:?} timeout",
            config.pool.max_idle_per_host, config.pool.max_idle, config.pool.idle_timeout
        )?;
        writeln!(
            f,
            "  Timeouts:           dial {:?}, TLS {:?}, expect-continue {:?}",
            config.pool.dial_timeout,
            config.pool.handshake_timeout,
            config.pool.expect_continue_timeout
        )?;
        writeln!(f, "  TCP Keep-Alive:     {:?}", config.pool.keep_alive)?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}
