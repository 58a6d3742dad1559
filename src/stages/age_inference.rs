use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use super::StageContext;
use crate::bins;
use crate::core::{FaceSet, Stage, StageKind};

/// Maps every detected face to an age and stores the map as `ages`
pub struct AgeInference {
    ctx: StageContext,
}

impl AgeInference {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub fn infer(&self, faces: &FaceSet) -> BTreeMap<String, i64> {
        let row = self.ctx.table.row_for(faces.stream_index);
        faces
            .face_ids
            .iter()
            .zip(row)
            .map(|(id, person)| (id.clone(), person.age))
            .collect()
    }
}

#[async_trait]
impl Stage for AgeInference {
    type Input = FaceSet;
    type Output = ();

    fn kind(&self) -> StageKind {
        StageKind::AgeInference
    }

    async fn process(&self, faces: FaceSet) -> Result<Option<()>> {
        let ages = self.infer(&faces);
        self.ctx.write(&faces.record_key, bins! { "ages" => ages }).await?;

        debug!(key = %faces.record_key, "ages stored");
        Ok(None)
    }
}
