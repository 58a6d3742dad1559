use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

use super::driver::FrameDriver;
use super::state::PipelineState;
use super::topology::{Payload, PortSpec, Topology};
use crate::config::{DriverStrategy, PipelineConfig, RunMode};
use crate::core::{run_stage, AttributeTable, FaceSet, Frame, Outlet, Stage, StageKind};
use crate::error::PipelineError;
use crate::ids::IdGenerator;
use crate::observability::{CounterSnapshot, ProgressCounters, ProgressReporter};
use crate::stages::{AgeInference, ExcitementScoring, FaceDetection, GenderInference, StageContext};
use crate::store::RecordStore;

/// Outcome of a bounded run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub counters: CounterSnapshot,
    pub elapsed: Duration,
}

type StageOutcome = (StageKind, Result<u64>);

/// Per-port channels, split into the outlet owned by the source and one
/// receiver per consumer.
struct Wiring {
    frame_outlets: HashMap<StageKind, Outlet<Frame>>,
    face_outlets: HashMap<StageKind, Outlet<FaceSet>>,
    frame_inlets: HashMap<StageKind, mpsc::Receiver<Frame>>,
    face_inlets: HashMap<StageKind, mpsc::Receiver<FaceSet>>,
}

impl Wiring {
    fn build(topology: &Topology, capacity: usize) -> Self {
        let mut wiring = Self {
            frame_outlets: HashMap::new(),
            face_outlets: HashMap::new(),
            frame_inlets: HashMap::new(),
            face_inlets: HashMap::new(),
        };

        for port in topology.ports() {
            match port.payload {
                Payload::Frames => {
                    let (outlet, inlets) = wire_port::<Frame>(port, capacity);
                    wiring.frame_outlets.insert(port.source, outlet);
                    wiring.frame_inlets.extend(inlets);
                }
                Payload::FaceSets => {
                    let (outlet, inlets) = wire_port::<FaceSet>(port, capacity);
                    wiring.face_outlets.insert(port.source, outlet);
                    wiring.face_inlets.extend(inlets);
                }
            }
        }

        wiring
    }
}

fn wire_port<T: Clone + Send>(
    port: &PortSpec,
    capacity: usize,
) -> (Outlet<T>, Vec<(StageKind, mpsc::Receiver<T>)>) {
    let mut senders = Vec::with_capacity(port.consumers.len());
    let mut inlets = Vec::with_capacity(port.consumers.len());

    for consumer in &port.consumers {
        let (tx, rx) = mpsc::channel(capacity);
        senders.push(tx);
        inlets.push((*consumer, rx));
    }

    (Outlet::new(port.name.clone(), senders), inlets)
}

/// Outlet of a stage with no outbound port
fn terminal(stage: StageKind) -> Outlet<()> {
    Outlet::new(stage.name(), Vec::new())
}

fn missing_inlet(stage: StageKind) -> PipelineError {
    PipelineError::Topology(format!("{} has no inbound port", stage))
}

/// Result of one joined task. `None` for tasks cancelled by an abort.
fn stage_outcome(joined: Result<StageOutcome, JoinError>) -> Option<Result<(StageKind, u64)>> {
    match joined {
        Ok((stage, Ok(processed))) => Some(Ok((stage, processed))),
        Ok((stage, Err(err))) => Some(Err(err.context(format!("stage {} failed", stage)))),
        Err(join_err) if join_err.is_cancelled() => None,
        Err(join_err) => Some(Err(PipelineError::StageAborted {
            stage: "pipeline task".to_string(),
            reason: join_err.to_string(),
        }
        .into())),
    }
}

fn is_disconnect(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|e| matches!(e.downcast_ref::<PipelineError>(), Some(PipelineError::Disconnected { .. })))
}

/// The ingestion pipeline: one task per stage, wired from a `Topology`.
pub struct IngestPipeline {
    config: PipelineConfig,
    topology: Topology,
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
    table: Arc<AttributeTable>,
    counters: Arc<ProgressCounters>,
    tasks: JoinSet<StageOutcome>,
    state: PipelineState,
}

impl IngestPipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn RecordStore>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self> {
        config.validate()?;
        let table = Arc::new(config.table()?);

        Ok(Self {
            config,
            topology: Topology::video_analytics(),
            store,
            ids,
            table,
            counters: Arc::new(ProgressCounters::new()),
            tasks: JoinSet::new(),
            state: PipelineState::Idle,
        })
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn counters(&self) -> Arc<ProgressCounters> {
        self.counters.clone()
    }

    pub fn table(&self) -> Arc<AttributeTable> {
        self.table.clone()
    }

    fn transition_to(&mut self, new_state: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(anyhow!(
                "Invalid state transition: {} -> {}",
                self.state.name(),
                new_state.name()
            ));
        }
        self.state = new_state;
        Ok(())
    }

    /// Wire every port and spawn one task per stage plus the driver.
    pub fn start(&mut self) -> Result<()> {
        self.topology.validate()?;
        self.transition_to(PipelineState::Running {
            start_time: Some(Instant::now()),
        })?;

        let mut wiring = Wiring::build(&self.topology, self.config.channel_capacity);
        let ctx = StageContext::new(self.store.clone(), self.config.store.location(), self.table.clone());

        for stage in self.topology.stages() {
            match stage {
                StageKind::Driver => {
                    let frames = wiring
                        .frame_outlets
                        .remove(&stage)
                        .unwrap_or_else(|| Outlet::new("frames", Vec::new()));
                    self.spawn_driver(ctx.clone(), frames);
                }
                StageKind::FaceDetection => {
                    let inlet = wiring.frame_inlets.remove(&stage).ok_or_else(|| missing_inlet(stage))?;
                    let faces = wiring
                        .face_outlets
                        .remove(&stage)
                        .unwrap_or_else(|| Outlet::new("faces", Vec::new()));
                    let detector = FaceDetection::new(ctx.clone(), self.ids.clone());
                    self.spawn_stage(detector, inlet, faces);
                }
                StageKind::ExcitementScoring => {
                    let inlet = wiring.frame_inlets.remove(&stage).ok_or_else(|| missing_inlet(stage))?;
                    self.spawn_stage(ExcitementScoring::new(ctx.clone()), inlet, terminal(stage));
                }
                StageKind::AgeInference => {
                    let inlet = wiring.face_inlets.remove(&stage).ok_or_else(|| missing_inlet(stage))?;
                    self.spawn_stage(AgeInference::new(ctx.clone()), inlet, terminal(stage));
                }
                StageKind::GenderInference => {
                    let inlet = wiring.face_inlets.remove(&stage).ok_or_else(|| missing_inlet(stage))?;
                    self.spawn_stage(GenderInference::new(ctx.clone()), inlet, terminal(stage));
                }
            }
        }

        info!(
            mode = ?self.config.mode,
            stages = self.tasks.len(),
            streams = self.config.stream_count,
            "pipeline started"
        );
        Ok(())
    }

    fn spawn_stage<S: Stage>(&mut self, stage: S, inlet: mpsc::Receiver<S::Input>, outlet: Outlet<S::Output>) {
        let kind = stage.kind();
        let counters = self.counters.clone();
        self.tasks
            .spawn(async move { (kind, run_stage(stage, inlet, outlet, counters).await) });
    }

    fn spawn_driver(&mut self, ctx: StageContext, frames: Outlet<Frame>) {
        let driver = FrameDriver::new(
            ctx,
            frames,
            self.counters.clone(),
            self.config.thumbnails(),
            self.config.stream_count,
            self.config.event_id,
        );

        let total = self.config.frame_count;
        let concurrency = self.config.pool_concurrency;
        let interval = self.config.report_interval();
        let reporter = ProgressReporter::new(self.counters.clone());

        match (self.config.mode, self.config.driver) {
            (RunMode::Bounded, DriverStrategy::Sequential) => {
                self.tasks
                    .spawn(async move { (StageKind::Driver, driver.run_sequential(total).await) });
            }
            (RunMode::Bounded, DriverStrategy::Pool) => {
                self.tasks.spawn(async move {
                    (StageKind::Driver, driver.run_pool(total, concurrency).await)
                });
            }
            (RunMode::Continuous, _) => {
                self.tasks.spawn(async move {
                    (StageKind::Driver, driver.run_continuous(interval, reporter).await)
                });
            }
        }
    }

    /// Join every stage. Returns once all terminal stages have finished, or
    /// with the first stage error after aborting everything still running.
    pub async fn wait(&mut self) -> Result<RunSummary> {
        let started = match &self.state {
            PipelineState::Running { start_time } => start_time.unwrap_or_else(Instant::now),
            _ => Instant::now(),
        };

        while let Some(joined) = self.tasks.join_next().await {
            match stage_outcome(joined) {
                Some(Ok((stage, processed))) => {
                    if stage == StageKind::Driver {
                        self.transition_to(PipelineState::Draining {
                            frames_emitted: processed,
                        })?;
                    }
                }
                Some(Err(err)) => return Err(self.fail(err).await),
                None => {}
            }
        }

        let elapsed = started.elapsed();
        self.transition_to(PipelineState::Completed {
            duration: Some(elapsed),
        })?;

        let counters = self.counters.snapshot();
        info!(
            inserted = counters.inserted,
            elapsed_ms = elapsed.as_millis() as u64,
            "pipeline drained"
        );
        Ok(RunSummary { counters, elapsed })
    }

    /// Start, then wait for every stage to drain.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.start()?;
        self.wait().await
    }

    /// Cancel every running task. Used to stop a continuous run.
    pub async fn abort(&mut self) {
        self.tasks.shutdown().await;
        info!(counters = ?self.counters.snapshot(), "pipeline aborted");
    }

    /// Abort every task still running and settle on the error that caused
    /// the failure. A stage that dies closes its inbound channel, so its
    /// producer may fail with `Disconnected` and be joined first; any other
    /// error joined while draining takes precedence over it.
    async fn fail(&mut self, first: anyhow::Error) -> anyhow::Error {
        self.tasks.abort_all();

        let mut cause = first;
        while let Some(joined) = self.tasks.join_next().await {
            if let Some(Err(err)) = stage_outcome(joined) {
                if is_disconnect(&cause) && !is_disconnect(&err) {
                    cause = err;
                }
            }
        }

        error!(error = %format!("{:#}", cause), "pipeline failed, aborting all stages");
        self.state = PipelineState::Failed {
            error_msg: format!("{:#}", cause),
        };
        cause
    }

    /// Tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }
}
