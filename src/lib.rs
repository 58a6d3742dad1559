pub mod audit;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod ids;
pub mod logging;
pub mod observability;
pub mod stages;
pub mod store;

pub use config::{DriverStrategy, PipelineConfig, RunMode};
pub use engine::{IngestPipeline, RunSummary};
pub use error::{PipelineError, PipelineResult};
