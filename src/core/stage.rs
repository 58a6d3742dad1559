use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::observability::ProgressCounters;

/// Every worker that takes part in the ingestion topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Driver,
    FaceDetection,
    ExcitementScoring,
    AgeInference,
    GenderInference,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        StageKind::Driver,
        StageKind::FaceDetection,
        StageKind::ExcitementScoring,
        StageKind::AgeInference,
        StageKind::GenderInference,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::FaceDetection => "face_detection",
            Self::ExcitementScoring => "excitement_scoring",
            Self::AgeInference => "age_inference",
            Self::GenderInference => "gender_inference",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pipeline stage consuming one input type.
///
/// `process` does the stage's own work and returns what should travel
/// downstream. Publishing is left to `run_stage`, which owns the stage's
/// outlet and closes it when the inbound channel drains.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    type Input: Send + 'static;

    /// Item handed to downstream consumers, `()` for terminal stages
    type Output: Clone + Send + 'static;

    fn kind(&self) -> StageKind;

    /// Handle one unit of work. Returning an error aborts the pipeline.
    async fn process(&self, input: Self::Input) -> Result<Option<Self::Output>>;
}

/// Receive loop shared by every stage: process until the inbound channel is
/// closed and drained, counting each completed unit and publishing its output.
///
/// A unit is counted before its output is published, so a consumer's counter
/// can never run ahead of its producer's.
pub async fn run_stage<S: Stage>(
    stage: S,
    mut inlet: mpsc::Receiver<S::Input>,
    outlet: Outlet<S::Output>,
    counters: Arc<ProgressCounters>,
) -> Result<u64> {
    let kind = stage.kind();
    let mut processed = 0u64;

    while let Some(input) = inlet.recv().await {
        let output = stage.process(input).await?;
        counters.record(kind);
        processed += 1;

        if let Some(output) = output {
            outlet.publish(output).await?;
        }
    }

    info!(stage = %kind, processed, "inbound channel drained, stage finished");

    // Closes every outbound channel exactly once.
    drop(outlet);
    Ok(processed)
}

/// A named output port delivering every item to all of its consumers.
///
/// Each consumer has its own channel, so consumers never compete for items.
/// Sends happen in consumer order and block while a consumer's buffer is full.
pub struct Outlet<T> {
    port: String,
    senders: Vec<mpsc::Sender<T>>,
}

impl<T: Clone + Send> Outlet<T> {
    pub fn new(port: impl Into<String>, senders: Vec<mpsc::Sender<T>>) -> Self {
        Self {
            port: port.into(),
            senders,
        }
    }

    pub async fn publish(&self, item: T) -> Result<(), PipelineError> {
        let Some((last, rest)) = self.senders.split_last() else {
            return Ok(());
        };

        for tx in rest {
            tx.send(item.clone()).await.map_err(|_| self.disconnected())?;
        }
        last.send(item).await.map_err(|_| self.disconnected())?;

        debug!(port = %self.port, consumers = self.senders.len(), "published");
        Ok(())
    }

    fn disconnected(&self) -> PipelineError {
        PipelineError::Disconnected {
            port: self.port.clone(),
        }
    }
}
