//! # Get Latency Bench Library
//!
//! A latency-measurement harness for object-storage GET requests. It reads the
//! same object over and over from several concurrent workers and prints
//! windowed percentile summaries per worker.
//!
//! ## Architecture Overview
//!
//! - `percentile`: nearest-rank percentile estimation with interpolation
//! - `timer`: per-request timing driven by transport lifecycle hooks
//! - `window`: per-worker sample accumulation, flush and reset
//! - `worker`: the closed sampling loop
//! - `supervisor`: fan-out of workers
//! - `storage`: the object store seam, its HTTP implementation and connection pool
//! - `cli`, `config`: argument parsing and validated configuration
//! - `summary`: summary lines and sinks
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use get_latency_bench::{
//!     HttpObjectStore, InstrumentationLevel, LogSink, ObjectLocation, PoolConfig,
//!     StopSignal, Supervisor, WorkerConfig,
//! };
//! use get_latency_bench::storage::ConnectionPool;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = Arc::new(ConnectionPool::new(PoolConfig::default(), false)?);
//!     let store = HttpObjectStore::new("127.0.0.1:9000", pool, false)?;
//!     let config = WorkerConfig::new(
//!         ObjectLocation::new("bucket", "object.bin"),
//!         30,
//!         InstrumentationLevel::Detailed,
//!     )?;
//!
//!     let supervisor = Supervisor::new(4, config, Arc::new(store), Arc::new(LogSink));
//!     supervisor.run(StopSignal::new()).await?;
//!     Ok(())
//! }
//! ```

/// Command-line interface and instrumentation levels
pub mod cli;

/// Validated run configuration built from CLI arguments
pub mod config;

/// Timestamped, colorized log output
pub mod logging;

/// Interpolated percentile estimation
pub mod percentile;

/// Object store abstraction, HTTP client and connection pool
///
/// Workers only see the `ObjectStore` trait. The HTTP implementation owns a
/// shared, bounded connection pool and reports connection, first-byte and
/// header events for every request.
pub mod storage;

/// Window summaries and summary sinks
pub mod summary;

/// Worker fan-out
pub mod supervisor;

/// Per-request timing
pub mod timer;

/// Unit conversion, endpoint derivation and parameter validation
pub mod utils;

/// Latency sample windows
pub mod window;

/// The sampling loop
pub mod worker;

pub use cli::{Args, InstrumentationLevel};
pub use config::{BenchConfig, WorkerConfig};
pub use percentile::{percentile, PercentileSpec};
pub use storage::{HttpObjectStore, ObjectLocation, ObjectStore, PoolConfig, StorageError};
pub use summary::{LogSink, SummarySink, WindowSummary};
pub use supervisor::Supervisor;
pub use timer::RequestTimer;
pub use window::{SampleWindow, Series, WindowSnapshot};
pub use worker::{StopSignal, Worker};

/// The current version of the benchmark
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Samples per summary window
    pub const WINDOW_SIZE: usize = 30;

    /// Default number of concurrent workers
    pub const CONCURRENCY: usize = 10;
}
