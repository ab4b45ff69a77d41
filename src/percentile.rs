//! # Percentile Estimation
//!
//! Nearest-rank percentile with linear interpolation between neighbouring
//! samples, using the "+1" rank convention:
//!
//! ```text
//! pos = p * (n + 1)
//! pos <  1  -> first sample
//! pos >= n  -> last sample
//! otherwise -> s[floor(pos) - 1] + frac(pos) * (s[floor(pos)] - s[floor(pos) - 1])
//! ```
//!
//! The estimator operates on an already sorted slice. Sorting is the caller's
//! job (see `SampleWindow::flush_and_reset`), so one sort serves every
//! percentile taken from the same window.

use anyhow::Result;
use std::fmt;

/// A target fraction in the half-open interval (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PercentileSpec(f64);

impl PercentileSpec {
    pub const P50: PercentileSpec = PercentileSpec(0.50);
    pub const P75: PercentileSpec = PercentileSpec(0.75);
    pub const P95: PercentileSpec = PercentileSpec(0.95);

    /// Percentiles reported in every window summary, in display order.
    pub const SUMMARY: [PercentileSpec; 3] = [Self::P50, Self::P75, Self::P95];

    pub fn new(fraction: f64) -> Result<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            anyhow::bail!("Percentile fraction {} is outside (0, 1]", fraction);
        }
        Ok(Self(fraction))
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl fmt::Display for PercentileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", (self.0 * 100.0).round() as u32)
    }
}

/// Interpolated percentile of an ascending slice.
///
/// Returns `None` for an empty slice; every other input yields a value
/// within `[sorted[0], sorted[n - 1]]`.
pub fn percentile(sorted: &[f64], spec: PercentileSpec) -> Option<f64> {
    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return None,
    };

    let size = sorted.len();
    let pos = spec.fraction() * (size + 1) as f64;

    if pos < 1.0 {
        return Some(first);
    }
    if pos >= size as f64 {
        return Some(last);
    }

    let rank = pos.floor();
    let lower = sorted[rank as usize - 1];
    let upper = sorted[rank as usize];
    Some(lower + (pos - rank) * (upper - lower))
}
