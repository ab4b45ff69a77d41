//! # Utility Functions and Helper Module
//!
//! Small helpers shared across the crate: unit conversion and formatting of
//! latency values, endpoint derivation, and validation of startup parameters.
//!
//! ## Usage Examples
//!
//! ```rust
//! use get_latency_bench::utils::*;
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! assert_eq!(format_ms(duration_to_ms(Duration::from_micros(1500))), "1.500ms");
//! assert_eq!(endpoint_for_region("eu-west-1"), "s3.eu-west-1.amazonaws.com");
//!
//! validate_window_size(30)?; // OK
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;

/// Convert a duration to fractional milliseconds.
///
/// Goes through integer nanoseconds so whole-millisecond durations convert
/// exactly (50ms is `50.0`, not `50.00000000000001`).
pub fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Format a millisecond value with three decimals, e.g. `"12.345ms"`.
pub fn format_ms(ms: f64) -> String {
    format!("{:.3}ms", ms)
}

/// Default S3 endpoint host for a region.
///
/// ## Examples
///
/// ```rust
/// # use get_latency_bench::utils::endpoint_for_region;
/// assert_eq!(endpoint_for_region("us-east-1"), "s3.us-east-1.amazonaws.com");
/// ```
pub fn endpoint_for_region(region: &str) -> String {
    format!("s3.{}.amazonaws.com", region.trim())
}

/// Validate that concurrency level is reasonable
///
/// ## Validation Rules
///
/// - **Minimum**: 1 worker (prevent zero concurrency)
/// - **Maximum**: 1024 workers (prevent resource exhaustion)
///
/// Every worker keeps one request in flight, so the upper bound also caps
/// the number of simultaneously open connections to the endpoint.
pub fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        anyhow::bail!("Concurrency cannot be zero");
    }
    if concurrency > 1024 {
        anyhow::bail!("Concurrency {} is too high (maximum 1024)", concurrency);
    }
    Ok(())
}

/// Validate the number of samples per summary window.
///
/// A window needs at least one sample for its percentiles to exist.
pub fn validate_window_size(window_size: usize) -> Result<()> {
    if window_size == 0 {
        anyhow::bail!("Window size cannot be zero");
    }
    if window_size > 10_000_000 {
        anyhow::bail!(
            "Window size {} is too large (maximum 10000000)",
            window_size
        );
    }
    Ok(())
}

/// Validate that a required string option was provided.
pub fn validate_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(())
}

/// Validate a timeout knob; a zero timeout would fail every attempt.
pub fn validate_timeout(name: &str, timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        anyhow::bail!("{} cannot be zero", name);
    }
    Ok(())
}
