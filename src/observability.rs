//! Tracing setup and run counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// In-process counters for preparation runs
#[derive(Debug, Default)]
pub struct Metrics {
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    files_written: AtomicU64,
    records_catalogued: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "runs_completed", "Metric incremented");
    }

    pub fn run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "runs_failed", "Metric incremented");
    }

    pub fn files_written(&self, count: usize) {
        self.files_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn records_catalogued(&self, count: usize) {
        self.records_catalogued
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            files_written: self.files_written.load(Ordering::Relaxed),
            records_catalogued: self.records_catalogued.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub files_written: u64,
    pub records_catalogued: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.run_completed();
        metrics.run_failed();
        metrics.run_failed();
        metrics.files_written(3);
        metrics.records_catalogued(3);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                runs_completed: 1,
                runs_failed: 2,
                files_written: 3,
                records_catalogued: 3,
            }
        );
    }
}
