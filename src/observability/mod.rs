pub mod counters;
pub mod reporter;

pub use counters::{Counter, CounterSnapshot, ProgressCounters};
pub use reporter::ProgressReporter;
