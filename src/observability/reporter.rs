use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use super::{Counter, CounterSnapshot, ProgressCounters};

/// Periodically turns the shared counters into a progress report
#[derive(Clone)]
pub struct ProgressReporter {
    counters: Arc<ProgressCounters>,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(counters: Arc<ProgressCounters>) -> Self {
        Self {
            counters,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Human-readable report of the current counters.
    pub fn report(&self) -> String {
        Self::render(&self.counters.snapshot(), self.elapsed())
    }

    /// Log the current counters as one structured event.
    pub fn log_progress(&self) -> CounterSnapshot {
        let snapshot = self.counters.snapshot();

        info!(
            inserted = snapshot.inserted,
            face_detected = snapshot.face_detected,
            ex_level_processed = snapshot.ex_level_processed,
            age_processed = snapshot.age_processed,
            gender_processed = snapshot.gender_processed,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "progress"
        );

        snapshot
    }

    pub fn render(snapshot: &CounterSnapshot, elapsed: Duration) -> String {
        let mut report = String::from("=== Ingestion Progress ===\n");

        for counter in Counter::ALL {
            report.push_str(&format!("  {:<17} {}\n", counter.name(), snapshot.get(counter)));
        }

        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            snapshot.inserted as f64 / secs
        } else {
            0.0
        };
        report.push_str(&format!("  elapsed {:.1}s, {:.1} frames/s\n", secs, rate));

        report
    }
}
