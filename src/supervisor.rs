//! Fan-out of independent workers against one object.

use crate::config::WorkerConfig;
use crate::storage::ObjectStore;
use crate::summary::SummarySink;
use crate::worker::{StopSignal, Worker};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// Starts `concurrency` workers and waits for all of them.
pub struct Supervisor {
    concurrency: usize,
    config: Arc<WorkerConfig>,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn SummarySink>,
}

impl Supervisor {
    pub fn new(
        concurrency: usize,
        config: WorkerConfig,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn SummarySink>,
    ) -> Self {
        Self {
            concurrency,
            config: Arc::new(config),
            store,
            sink,
        }
    }

    /// Spawn every worker on the runtime and join them.
    ///
    /// Workers loop until `stop` is triggered, so without a trigger this
    /// never returns. Returns the total iteration count across workers.
    pub async fn run(&self, stop: StopSignal) -> Result<u64> {
        info!(
            "Starting {} workers ({} instrumentation, window of {})",
            self.concurrency, self.config.instrumentation, self.config.window_size
        );

        let handles: Vec<_> = (0..self.concurrency)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&self.config),
                    Arc::clone(&self.store),
                    Arc::clone(&self.sink),
                );
                tokio::spawn(worker.run(stop.clone()))
            })
            .collect();

        let mut iterations = 0;
        let mut failed = 0;
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(count) => iterations += count,
                Err(e) => {
                    error!("Worker {} terminated abnormally: {}", id, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} of {} workers failed", failed, self.concurrency);
        }
        Ok(iterations)
    }
}
