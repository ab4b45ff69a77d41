//! # Sample Windows
//!
//! A `SampleWindow` accumulates latency samples for one worker between two
//! summaries. Samples live in up to three parallel series:
//!
//! - `total`: issue to body fully drained (or error returned)
//! - `first_byte`: connection acquired to first response byte
//! - `pre_body`: issue to response headers handled, before the body
//!
//! Only `total` drives flushing. The other two series are fed by transport
//! hooks and may be shorter, so each series is summarized on its own and an
//! empty series simply has no statistics.

use crate::percentile::{percentile, PercentileSpec};
use std::fmt;
use std::time::Duration;

/// The latency series tracked by a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    Total,
    FirstByte,
    PreBody,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::FirstByte, Series::PreBody, Series::Total];

    fn index(self) -> usize {
        match self {
            Series::FirstByte => 0,
            Series::PreBody => 1,
            Series::Total => 2,
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Series::Total => write!(f, "with body"),
            Series::FirstByte => write!(f, "first byte"),
            Series::PreBody => write!(f, "up to body"),
        }
    }
}

/// Correlation identifiers returned by the storage service for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIds {
    /// Primary request id (`x-amz-request-id`)
    pub request_id: String,
    /// Extended host id (`x-amz-id-2`)
    pub extended_id: String,
}

/// The slowest `total` observation seen since the last flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlowRequest {
    pub duration: Duration,
    pub ids: RequestIds,
}

/// Per-worker sample accumulator. Created once, reset in place after every flush.
#[derive(Debug, Default)]
pub struct SampleWindow {
    series: [Vec<f64>; 3],
    slowest: SlowRequest,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(window_size: usize) -> Self {
        Self {
            series: [
                Vec::with_capacity(window_size),
                Vec::with_capacity(window_size),
                Vec::with_capacity(window_size),
            ],
            slowest: SlowRequest::default(),
        }
    }

    /// Append one sample, in milliseconds, to `series`.
    pub fn record(&mut self, series: Series, value_ms: f64) {
        self.series[series.index()].push(value_ms);
    }

    /// Remember `ids` as the slowest request iff `duration` beats the current maximum.
    pub fn record_slow_candidate(&mut self, duration: Duration, ids: &RequestIds) {
        if duration > self.slowest.duration {
            self.slowest.duration = duration;
            self.slowest.ids.clone_from(ids);
        }
    }

    pub fn len(&self, series: Series) -> usize {
        self.series[series.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(Vec::is_empty)
    }

    pub fn slowest(&self) -> &SlowRequest {
        &self.slowest
    }

    /// True once `total` holds at least `window_size` samples.
    pub fn should_flush(&self, window_size: usize) -> bool {
        self.len(Series::Total) >= window_size
    }

    /// Sort every series, hand them out as a snapshot, and start over.
    ///
    /// The series buffers keep their capacity, so a steady-state window does
    /// not reallocate between flushes.
    pub fn flush_and_reset(&mut self) -> WindowSnapshot {
        let mut series: [Vec<f64>; 3] = Default::default();
        for (slot, samples) in series.iter_mut().zip(self.series.iter_mut()) {
            samples.sort_by(f64::total_cmp);
            slot.extend_from_slice(samples);
            samples.clear();
        }

        WindowSnapshot {
            series,
            slowest: std::mem::take(&mut self.slowest),
        }
    }
}

/// Immutable, sorted copy of a window taken at flush time.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    series: [Vec<f64>; 3],
    slowest: SlowRequest,
}

impl WindowSnapshot {
    /// Ascending samples for one series.
    pub fn samples(&self, series: Series) -> &[f64] {
        &self.series[series.index()]
    }

    pub fn sample_count(&self) -> usize {
        self.samples(Series::Total).len()
    }

    pub fn slowest(&self) -> &SlowRequest {
        &self.slowest
    }

    /// Min, max and summary percentiles for one series; `None` when it is empty.
    pub fn stats(&self, series: Series) -> Option<SeriesStats> {
        let samples = self.samples(series);
        let min = *samples.first()?;
        let max = *samples.last()?;
        let p50 = percentile(samples, PercentileSpec::P50)?;
        let p75 = percentile(samples, PercentileSpec::P75)?;
        let p95 = percentile(samples, PercentileSpec::P95)?;

        Some(SeriesStats {
            count: samples.len(),
            min,
            max,
            p50,
            p75,
            p95,
        })
    }
}

/// Summary statistics of one series, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> RequestIds {
        RequestIds {
            request_id: format!("req-{}", n),
            extended_id: format!("host-{}", n),
        }
    }

    #[test]
    fn test_flush_after_window_size_totals() {
        let mut window = SampleWindow::new();
        for i in 0..4 {
            assert!(!window.should_flush(5));
            window.record(Series::Total, i as f64);
        }
        assert!(!window.should_flush(5));
        window.record(Series::Total, 4.0);
        assert!(window.should_flush(5));

        let snapshot = window.flush_and_reset();
        assert_eq!(snapshot.sample_count(), 5);
        assert_eq!(window.len(Series::Total), 0);
        assert!(!window.should_flush(5));
    }

    #[test]
    fn test_hook_series_do_not_drive_flush() {
        let mut window = SampleWindow::new();
        for _ in 0..10 {
            window.record(Series::FirstByte, 1.0);
            window.record(Series::PreBody, 1.0);
        }
        assert!(!window.should_flush(3));
    }

    #[test]
    fn test_slow_candidate_keeps_largest() {
        let mut window = SampleWindow::new();
        for (n, ms) in [5u64, 9, 3, 12, 7].into_iter().enumerate() {
            window.record_slow_candidate(Duration::from_millis(ms), &ids(n as u32));
        }

        let slowest = window.slowest();
        assert_eq!(slowest.duration, Duration::from_millis(12));
        assert_eq!(slowest.ids, ids(3));
    }

    #[test]
    fn test_slow_candidate_ignores_ties() {
        let mut window = SampleWindow::new();
        window.record_slow_candidate(Duration::from_millis(4), &ids(1));
        window.record_slow_candidate(Duration::from_millis(4), &ids(2));
        assert_eq!(window.slowest().ids, ids(1));
    }

    #[test]
    fn test_flush_sorts_and_resets_everything() {
        let mut window = SampleWindow::with_capacity(3);
        for v in [30.0, 10.0, 20.0] {
            window.record(Series::Total, v);
        }
        window.record(Series::FirstByte, 2.0);
        window.record(Series::FirstByte, 1.0);
        window.record_slow_candidate(Duration::from_millis(30), &ids(7));

        let snapshot = window.flush_and_reset();
        assert_eq!(snapshot.samples(Series::Total), &[10.0, 20.0, 30.0]);
        assert_eq!(snapshot.samples(Series::FirstByte), &[1.0, 2.0]);
        assert!(snapshot.samples(Series::PreBody).is_empty());
        assert_eq!(snapshot.slowest().ids, ids(7));

        assert!(window.is_empty());
        assert_eq!(window.slowest(), &SlowRequest::default());
    }

    #[test]
    fn test_zero_latency_samples_are_kept() {
        let mut window = SampleWindow::new();
        window.record(Series::Total, 0.0);
        window.record(Series::Total, 0.0);
        let snapshot = window.flush_and_reset();
        assert_eq!(snapshot.samples(Series::Total), &[0.0, 0.0]);
    }

    #[test]
    fn test_stats_for_empty_series_are_absent() {
        let mut window = SampleWindow::new();
        window.record(Series::Total, 10.0);
        window.record(Series::Total, 20.0);
        window.record(Series::Total, 30.0);
        window.record(Series::Total, 40.0);

        let snapshot = window.flush_and_reset();
        assert!(snapshot.stats(Series::FirstByte).is_none());

        let total = snapshot.stats(Series::Total).unwrap();
        assert_eq!(total.count, 4);
        assert_eq!(total.min, 10.0);
        assert_eq!(total.max, 40.0);
        assert_eq!(total.p50, 25.0);
        // pos = 0.75 * 5 = 3.75 -> 30 + 0.75 * 10
        assert_eq!(total.p75, 37.5);
        assert_eq!(total.p95, 40.0);
    }
}
