use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use super::StageContext;
use crate::bins;
use crate::core::{FaceSet, Stage, StageKind};

/// Maps every detected face to a gender and stores the map as `genders`
pub struct GenderInference {
    ctx: StageContext,
}

impl GenderInference {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }

    pub fn infer(&self, faces: &FaceSet) -> BTreeMap<String, String> {
        let row = self.ctx.table.row_for(faces.stream_index);
        faces
            .face_ids
            .iter()
            .zip(row)
            .map(|(id, person)| (id.clone(), person.gender.to_string()))
            .collect()
    }
}

#[async_trait]
impl Stage for GenderInference {
    type Input = FaceSet;
    type Output = ();

    fn kind(&self) -> StageKind {
        StageKind::GenderInference
    }

    async fn process(&self, faces: FaceSet) -> Result<Option<()>> {
        let genders = self.infer(&faces);
        self.ctx
            .write(&faces.record_key, bins! { "genders" => genders })
            .await?;

        debug!(key = %faces.record_key, "genders stored");
        Ok(None)
    }
}
