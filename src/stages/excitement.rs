use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::StageContext;
use crate::bins;
use crate::core::{Frame, Stage, StageKind};

/// Scores how exciting a frame is. The score is the frame's attribute row
/// index, a deterministic placeholder for a real model.
pub struct ExcitementScoring {
    ctx: StageContext,
}

impl ExcitementScoring {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub fn score(&self, frame: &Frame) -> i64 {
        self.ctx.table.row_index(frame.stream_index) as i64
    }
}

#[async_trait]
impl Stage for ExcitementScoring {
    type Input = Frame;
    type Output = ();

    fn kind(&self) -> StageKind {
        StageKind::ExcitementScoring
    }

    async fn process(&self, frame: Frame) -> Result<Option<()>> {
        let ex_level = self.score(&frame);
        self.ctx
            .write(&frame.record_key, bins! { "exLevel" => ex_level })
            .await?;

        debug!(key = %frame.record_key, ex_level, "excitement level stored");
        Ok(None)
    }
}
