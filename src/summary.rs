//! Per-window summaries and where they go.

use crate::cli::InstrumentationLevel;
use crate::utils::format_ms;
use crate::window::{Series, SeriesStats, SlowRequest, WindowSnapshot};
use std::fmt;
use tracing::info;

/// Statistics of one flushed window, ready to print.
#[derive(Debug, Clone)]
pub struct WindowSummary {
    pub worker_id: usize,
    pub instrumentation: InstrumentationLevel,
    pub sample_count: usize,
    /// Stats per reported series, in display order; `None` for an empty series
    pub series: Vec<(Series, Option<SeriesStats>)>,
    pub slowest: SlowRequest,
}

impl WindowSummary {
    pub fn new(
        worker_id: usize,
        instrumentation: InstrumentationLevel,
        snapshot: &WindowSnapshot,
    ) -> Self {
        let series = match instrumentation {
            InstrumentationLevel::Coarse => vec![Series::Total],
            InstrumentationLevel::Detailed => Series::ALL.to_vec(),
        };

        Self {
            worker_id,
            instrumentation,
            sample_count: snapshot.sample_count(),
            series: series
                .into_iter()
                .map(|s| (s, snapshot.stats(s)))
                .collect(),
            slowest: snapshot.slowest().clone(),
        }
    }

    pub fn stats(&self, series: Series) -> Option<&SeriesStats> {
        self.series
            .iter()
            .find(|(s, _)| *s == series)
            .and_then(|(_, stats)| stats.as_ref())
    }
}

impl fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worker {} sampled {}",
            self.worker_id, self.sample_count
        )?;

        for (series, stats) in &self.series {
            match stats {
                Some(s) => write!(
                    f,
                    " | {}: min {} max {} 50p {} 75p {} 95p {}",
                    series,
                    format_ms(s.min),
                    format_ms(s.max),
                    format_ms(s.p50),
                    format_ms(s.p75),
                    format_ms(s.p95)
                )?,
                None => write!(f, " | {}: n/a", series)?,
            }
        }

        if self.instrumentation == InstrumentationLevel::Detailed {
            write!(
                f,
                " | slowest request: req-id: {} x-amz-id-2: {}",
                self.slowest.ids.request_id, self.slowest.ids.extended_id
            )?;
        }
        Ok(())
    }
}

/// Destination for window summaries.
pub trait SummarySink: Send + Sync {
    fn emit(&self, summary: &WindowSummary);
}

/// Writes every summary as one `info` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SummarySink for LogSink {
    fn emit(&self, summary: &WindowSummary) {
        info!("{}", summary);
    }
}
