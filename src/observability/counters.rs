use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::StageKind;

/// Named progress counters, one per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Inserted,
    FaceDetected,
    ExLevelProcessed,
    AgeProcessed,
    GenderProcessed,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::Inserted,
        Counter::FaceDetected,
        Counter::ExLevelProcessed,
        Counter::AgeProcessed,
        Counter::GenderProcessed,
    ];

    pub fn for_stage(stage: StageKind) -> Self {
        match stage {
            StageKind::Driver => Self::Inserted,
            StageKind::FaceDetection => Self::FaceDetected,
            StageKind::ExcitementScoring => Self::ExLevelProcessed,
            StageKind::AgeInference => Self::AgeProcessed,
            StageKind::GenderInference => Self::GenderProcessed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::FaceDetected => "faceDetected",
            Self::ExLevelProcessed => "exLevelProcessed",
            Self::AgeProcessed => "ageProcessed",
            Self::GenderProcessed => "genderProcessed",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-wide progress counters shared by every stage task.
///
/// Increments are lock-free and any task may read a snapshot at any moment.
/// Stages count a unit before handing it downstream, which together with the
/// read order in `snapshot` keeps every live snapshot causally ordered.
pub struct ProgressCounters {
    slots: [AtomicU64; 5],
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.slots[counter.slot()].fetch_add(1, Ordering::SeqCst);
    }

    /// Count one completed unit of work for `stage`.
    pub fn record(&self, stage: StageKind) {
        self.increment(Counter::for_stage(stage));
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slots[counter.slot()].load(Ordering::SeqCst)
    }

    /// Reads consumers before their producers. A producer's increment always
    /// precedes the hand-off to its consumers, so a live snapshot never shows
    /// a stage ahead of the stage feeding it. Individual counters may still
    /// move between reads; the values are exact once the pipeline has drained.
    pub fn snapshot(&self) -> CounterSnapshot {
        let gender_processed = self.get(Counter::GenderProcessed);
        let age_processed = self.get(Counter::AgeProcessed);
        let ex_level_processed = self.get(Counter::ExLevelProcessed);
        let face_detected = self.get(Counter::FaceDetected);
        let inserted = self.get(Counter::Inserted);

        CounterSnapshot {
            inserted,
            face_detected,
            ex_level_processed,
            age_processed,
            gender_processed,
        }
    }
}

impl Default for ProgressCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub inserted: u64,
    pub face_detected: u64,
    pub ex_level_processed: u64,
    pub age_processed: u64,
    pub gender_processed: u64,
}

impl CounterSnapshot {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Inserted => self.inserted,
            Counter::FaceDetected => self.face_detected,
            Counter::ExLevelProcessed => self.ex_level_processed,
            Counter::AgeProcessed => self.age_processed,
            Counter::GenderProcessed => self.gender_processed,
        }
    }

    /// True when every stage has completed exactly `n` units.
    pub fn all_equal(&self, n: u64) -> bool {
        Counter::ALL.iter().all(|c| self.get(*c) == n)
    }
}
