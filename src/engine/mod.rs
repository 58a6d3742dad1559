pub mod driver;
pub mod pipeline;
pub mod state;
pub mod topology;

pub use driver::{FrameDriver, SweepClock};
pub use pipeline::{IngestPipeline, RunSummary};
pub use state::PipelineState;
pub use topology::{Payload, PortSpec, Topology};
