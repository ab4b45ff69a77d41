//! # Request Timing
//!
//! `RequestTimer` wraps exactly one read. It is started before the request is
//! issued, handed to the store as its `RequestHooks`, and finished once the
//! body is drained or the read failed.
//!
//! Phases recorded per instrumentation level:
//!
//! | series       | coarse | detailed | measured from          | to                        |
//! |--------------|--------|----------|------------------------|---------------------------|
//! | `total`      | yes    | yes      | issue                  | finish (drained or error) |
//! | `first_byte` | no     | yes      | connection acquired    | first response byte       |
//! | `pre_body`   | no     | yes      | issue                  | headers handled           |

use crate::cli::InstrumentationLevel;
use crate::storage::RequestHooks;
use crate::utils::duration_to_ms;
use crate::window::{RequestIds, SampleWindow, Series};
use std::time::Duration;
use tokio::time::Instant;

/// Timer for a single instrumented read, recording straight into a window.
pub struct RequestTimer<'w> {
    level: InstrumentationLevel,
    window: &'w mut SampleWindow,
    issued: Instant,
    connected: Option<Instant>,
    ids: RequestIds,
}

impl<'w> RequestTimer<'w> {
    /// Start timing now.
    pub fn start(level: InstrumentationLevel, window: &'w mut SampleWindow) -> Self {
        Self {
            level,
            window,
            issued: Instant::now(),
            connected: None,
            ids: RequestIds::default(),
        }
    }

    /// Record the `total` sample and offer it as the window's slowest request.
    ///
    /// Called on success and failure alike.
    pub fn finish(self) -> Duration {
        let elapsed = self.issued.elapsed();
        self.window.record(Series::Total, duration_to_ms(elapsed));
        self.window.record_slow_candidate(elapsed, &self.ids);
        elapsed
    }

    fn detailed(&self) -> bool {
        self.level == InstrumentationLevel::Detailed
    }
}

impl RequestHooks for RequestTimer<'_> {
    fn connection_acquired(&mut self, at: Instant, _reused: bool) {
        if self.detailed() {
            self.connected = Some(at);
        }
    }

    fn first_response_byte(&mut self, at: Instant) {
        if !self.detailed() {
            return;
        }
        if let Some(connected) = self.connected {
            let waited = at.saturating_duration_since(connected);
            self.window.record(Series::FirstByte, duration_to_ms(waited));
        }
    }

    fn request_complete(&mut self, at: Instant, ids: RequestIds) {
        if !self.detailed() {
            return;
        }
        let waited = at.saturating_duration_since(self.issued);
        self.window.record(Series::PreBody, duration_to_ms(waited));
        self.ids = ids;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> RequestIds {
        RequestIds {
            request_id: "R1".to_string(),
            extended_id: "H1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_detailed_timer_records_every_phase() {
        let mut window = SampleWindow::new();
        let mut timer = RequestTimer::start(InstrumentationLevel::Detailed, &mut window);

        tokio::time::advance(Duration::from_millis(2)).await;
        timer.connection_acquired(Instant::now(), false);
        tokio::time::advance(Duration::from_millis(10)).await;
        timer.first_response_byte(Instant::now());
        tokio::time::advance(Duration::from_millis(1)).await;
        timer.request_complete(Instant::now(), ids());
        tokio::time::advance(Duration::from_millis(7)).await;
        let total = timer.finish();

        assert_eq!(total, Duration::from_millis(20));
        let snapshot = window.flush_and_reset();
        assert_eq!(snapshot.samples(Series::FirstByte), &[10.0]);
        assert_eq!(snapshot.samples(Series::PreBody), &[13.0]);
        assert_eq!(snapshot.samples(Series::Total), &[20.0]);
        assert_eq!(snapshot.slowest().ids, ids());
        assert_eq!(snapshot.slowest().duration, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_coarse_timer_ignores_hooks() {
        let mut window = SampleWindow::new();
        let mut timer = RequestTimer::start(InstrumentationLevel::Coarse, &mut window);

        timer.connection_acquired(Instant::now(), true);
        tokio::time::advance(Duration::from_millis(4)).await;
        timer.first_response_byte(Instant::now());
        timer.request_complete(Instant::now(), ids());
        timer.finish();

        assert_eq!(window.len(Series::Total), 1);
        assert_eq!(window.len(Series::FirstByte), 0);
        assert_eq!(window.len(Series::PreBody), 0);
        assert_eq!(window.slowest().ids, RequestIds::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_byte_needs_connection_event() {
        let mut window = SampleWindow::new();
        let mut timer = RequestTimer::start(InstrumentationLevel::Detailed, &mut window);

        timer.first_response_byte(Instant::now());
        timer.finish();

        assert_eq!(window.len(Series::FirstByte), 0);
        assert_eq!(window.len(Series::Total), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_still_counts_total() {
        let mut window = SampleWindow::new();
        let timer = RequestTimer::start(InstrumentationLevel::Detailed, &mut window);
        tokio::time::advance(Duration::from_millis(3)).await;
        timer.finish();

        let snapshot = window.flush_and_reset();
        assert_eq!(snapshot.samples(Series::Total), &[3.0]);
        assert!(snapshot.samples(Series::PreBody).is_empty());
    }
}
