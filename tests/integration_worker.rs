use async_trait::async_trait;
use get_latency_bench::storage::{ObjectBody, ObjectLocation, ObjectStore, RequestHooks, StorageError};
use get_latency_bench::window::{RequestIds, Series};
use get_latency_bench::{
    InstrumentationLevel, StopSignal, Supervisor, SummarySink, WindowSummary, Worker, WorkerConfig,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Body of a fixed size, handed out in one piece.
struct FixedBody(u64);

#[async_trait]
impl ObjectBody for FixedBody {
    async fn drain(&mut self) -> Result<u64, StorageError> {
        Ok(std::mem::take(&mut self.0))
    }
}

/// Collaborator answering every GET after `latency`, optionally failing.
///
/// Triggers `stop` once it has served `stop_after` calls.
struct FakeStore {
    latency: Duration,
    body_len: u64,
    fail: bool,
    calls: AtomicU64,
    stop_after: u64,
    stop: StopSignal,
}

impl FakeStore {
    fn new(latency: Duration, fail: bool, stop_after: u64, stop: StopSignal) -> Self {
        Self {
            latency,
            body_len: 100,
            fail,
            calls: AtomicU64::new(0),
            stop_after,
            stop,
        }
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_object(
        &self,
        _location: &ObjectLocation,
        hooks: &mut dyn RequestHooks,
    ) -> Result<Box<dyn ObjectBody>, StorageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.stop_after {
            self.stop.trigger();
        }

        tokio::time::sleep(self.latency).await;
        if self.fail {
            return Err(StorageError::Other("connection reset by peer".to_string()));
        }

        hooks.connection_acquired(Instant::now(), call > 1);
        hooks.first_response_byte(Instant::now());
        hooks.request_complete(
            Instant::now(),
            RequestIds {
                request_id: format!("REQ{}", call),
                extended_id: format!("HOST{}", call),
            },
        );
        Ok(Box::new(FixedBody(self.body_len)))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
struct CollectingSink(Mutex<Vec<WindowSummary>>);

impl SummarySink for CollectingSink {
    fn emit(&self, summary: &WindowSummary) {
        self.0.lock().push(summary.clone());
    }
}

fn config(window_size: usize, level: InstrumentationLevel) -> Arc<WorkerConfig> {
    Arc::new(WorkerConfig::new(ObjectLocation::new("bucket", "object"), window_size, level).unwrap())
}

/// Three fixed 50ms reads with a window of three give exactly one summary
/// with every statistic at 50ms.
#[tokio::test(start_paused = true)]
async fn fixed_latency_worker_emits_one_summary() {
    let stop = StopSignal::new();
    let store = Arc::new(FakeStore::new(Duration::from_millis(50), false, 3, stop.clone()));
    let sink = Arc::new(CollectingSink::default());

    let worker = Worker::new(0, config(3, InstrumentationLevel::Coarse), store, sink.clone());
    let iterations = worker.run(stop).await;

    assert_eq!(iterations, 3);
    let summaries = sink.0.lock();
    assert_eq!(summaries.len(), 1);

    let summary = &summaries[0];
    assert_eq!(summary.sample_count, 3);
    let total = summary.stats(Series::Total).unwrap();
    for value in [total.min, total.max, total.p50, total.p75, total.p95] {
        assert_eq!(value, 50.0);
    }

    let line = summary.to_string();
    assert!(line.contains(
        "with body: min 50.000ms max 50.000ms 50p 50.000ms 75p 50.000ms 95p 50.000ms"
    ));
}

/// Failed reads still produce one summary per window, timed up to the failure.
#[tokio::test(start_paused = true)]
async fn failing_store_still_produces_summaries() {
    let stop = StopSignal::new();
    let store = Arc::new(FakeStore::new(Duration::from_millis(5), true, 4, stop.clone()));
    let sink = Arc::new(CollectingSink::default());

    let worker = Worker::new(1, config(2, InstrumentationLevel::Detailed), store, sink.clone());
    let iterations = worker.run(stop).await;

    assert_eq!(iterations, 4);
    let summaries = sink.0.lock();
    assert_eq!(summaries.len(), 2);
    for summary in summaries.iter() {
        assert_eq!(summary.sample_count, 2);
        let total = summary.stats(Series::Total).unwrap();
        assert_eq!(total.min, 5.0);
        assert_eq!(total.max, 5.0);

        // No hook fired, so the detail series are reported as missing.
        assert!(summary.stats(Series::FirstByte).is_none());
        assert!(summary.stats(Series::PreBody).is_none());
        assert!(summary.to_string().contains("first byte: n/a"));
    }
}

#[tokio::test(start_paused = true)]
async fn detailed_summary_names_slowest_request() {
    let stop = StopSignal::new();
    let store = Arc::new(FakeStore::new(Duration::from_millis(20), false, 2, stop.clone()));
    let sink = Arc::new(CollectingSink::default());

    let worker = Worker::new(2, config(2, InstrumentationLevel::Detailed), store, sink.clone());
    worker.run(stop).await;

    let summaries = sink.0.lock();
    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];

    assert_eq!(summary.stats(Series::FirstByte).unwrap().max, 0.0);
    assert_eq!(summary.stats(Series::PreBody).unwrap().max, 20.0);
    // Equal durations: the first request keeps the slot.
    assert_eq!(summary.slowest.ids.request_id, "REQ1");
    assert!(summary
        .to_string()
        .ends_with("slowest request: req-id: REQ1 x-amz-id-2: HOST1"));
}

#[tokio::test(start_paused = true)]
async fn supervisor_runs_independent_workers() {
    let stop = StopSignal::new();
    let store = Arc::new(FakeStore::new(Duration::from_millis(10), false, 12, stop.clone()));
    let sink = Arc::new(CollectingSink::default());

    let config = WorkerConfig::new(
        ObjectLocation::new("bucket", "object"),
        2,
        InstrumentationLevel::Detailed,
    )
    .unwrap();
    let supervisor = Supervisor::new(3, config, store.clone(), sink.clone());
    let iterations = supervisor.run(stop).await.unwrap();

    assert!(iterations >= 12);
    assert_eq!(iterations, store.calls.load(Ordering::SeqCst));

    let summaries = sink.0.lock();
    assert!(!summaries.is_empty());
    for summary in summaries.iter() {
        assert!(summary.worker_id < 3);
        assert_eq!(summary.sample_count, 2);
        assert_eq!(summary.stats(Series::Total).unwrap().p50, 10.0);
    }
}
