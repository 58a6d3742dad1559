use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::StageContext;
use crate::bins;
use crate::core::{FaceSet, Frame, Stage, StageKind};
use crate::ids::IdGenerator;

/// Mints one face identifier per person in the frame's attribute row,
/// stores them as `faceIds` and emits the resulting `FaceSet` for the
/// attribute stages.
pub struct FaceDetection {
    ctx: StageContext,
    ids: Arc<dyn IdGenerator>,
}

impl FaceDetection {
    pub fn new(ctx: StageContext, ids: Arc<dyn IdGenerator>) -> Self {
        Self { ctx, ids }
    }

    /// Identifiers in row order, so position `i` names row entry `i`.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<String>> {
        let row = self.ctx.table.row_for(frame.stream_index);
        let mut face_ids = Vec::with_capacity(row.len());
        for _ in row {
            face_ids.push(self.ids.new_identifier()?);
        }
        Ok(face_ids)
    }
}

#[async_trait]
impl Stage for FaceDetection {
    type Input = Frame;
    type Output = FaceSet;

    fn kind(&self) -> StageKind {
        StageKind::FaceDetection
    }

    async fn process(&self, frame: Frame) -> Result<Option<FaceSet>> {
        let face_ids = self.detect(&frame)?;

        // The write must land before anyone downstream sees the faces.
        self.ctx
            .write(&frame.record_key, bins! { "faceIds" => face_ids.clone() })
            .await?;

        debug!(key = %frame.record_key, faces = face_ids.len(), "faces stored");

        Ok(Some(FaceSet::from_frame(&frame, face_ids)))
    }
}
