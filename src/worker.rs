//! # Sampling Worker
//!
//! A worker is a closed loop: issue one read, wait for it, record it, repeat.
//! It owns its `SampleWindow` outright, so workers never contend with each
//! other on anything but the connection pool.
//!
//! ## Iteration
//!
//! 1. Start a `RequestTimer` and issue the read with the timer as its hooks
//! 2. Drain and discard the body (or log the failure and carry on)
//! 3. Finish the timer, which records `total` and the slow-request candidate
//! 4. Once `total` holds `window_size` samples, emit a summary and reset
//!
//! Failed reads are measured like successful ones. During an outage the
//! percentiles therefore reflect time-to-failure.

use crate::config::WorkerConfig;
use crate::storage::ObjectStore;
use crate::summary::{SummarySink, WindowSummary};
use crate::timer::RequestTimer;
use crate::window::SampleWindow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cooperative stop request, checked by workers between iterations.
///
/// Never triggered by the binary; it exists so embedders and tests can end
/// otherwise infinite workers.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One sampling loop against the configured object.
pub struct Worker {
    id: usize,
    config: Arc<WorkerConfig>,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn SummarySink>,
    window: SampleWindow,
    iterations: u64,
}

impl Worker {
    pub fn new(
        id: usize,
        config: Arc<WorkerConfig>,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn SummarySink>,
    ) -> Self {
        let window = SampleWindow::with_capacity(config.window_size);
        Self {
            id,
            config,
            store,
            sink,
            window,
            iterations: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Loop until `stop` is triggered; returns the number of iterations run.
    pub async fn run(mut self, stop: StopSignal) -> u64 {
        debug!(
            "Worker {} sampling {} via {} store",
            self.id,
            self.config.location,
            self.store.name()
        );

        while !stop.is_triggered() {
            self.run_once().await;
        }

        debug!("Worker {} stopped after {} iterations", self.id, self.iterations);
        self.iterations
    }

    /// Perform one instrumented read; returns the summary if this read
    /// completed a window.
    pub async fn run_once(&mut self) -> Option<WindowSummary> {
        self.iterations += 1;

        let mut timer = RequestTimer::start(self.config.instrumentation, &mut self.window);
        match self.store.get_object(&self.config.location, &mut timer).await {
            Ok(mut body) => match body.drain().await {
                Ok(bytes) => debug!("Worker {} drained {} bytes", self.id, bytes),
                Err(e) => warn!(
                    "Worker {}: reading body of {} failed: {}",
                    self.id, self.config.location, e
                ),
            },
            Err(e) => warn!(
                "Worker {}: GET {} failed: {}",
                self.id, self.config.location, e
            ),
        }
        timer.finish();

        if !self.window.should_flush(self.config.window_size) {
            return None;
        }

        let snapshot = self.window.flush_and_reset();
        let summary = WindowSummary::new(self.id, self.config.instrumentation, &snapshot);
        self.sink.emit(&summary);
        Some(summary)
    }
}
