pub mod age_inference;
pub mod excitement;
pub mod face_detection;
pub mod gender_inference;

pub use age_inference::AgeInference;
pub use excitement::ExcitementScoring;
pub use face_detection::FaceDetection;
pub use gender_inference::GenderInference;

use std::sync::Arc;

use crate::core::AttributeTable;
use crate::error::PipelineResult;
use crate::store::{Bins, RecordStore, StoreLocation};

/// Collaborators every stage shares
#[derive(Clone)]
pub struct StageContext {
    pub store: Arc<dyn RecordStore>,
    pub location: StoreLocation,
    pub table: Arc<AttributeTable>,
}

impl StageContext {
    pub fn new(store: Arc<dyn RecordStore>, location: StoreLocation, table: Arc<AttributeTable>) -> Self {
        Self {
            store,
            location,
            table,
        }
    }

    /// Partial update of the record stored under `record_key`.
    pub async fn write(&self, record_key: &str, bins: Bins) -> PipelineResult<()> {
        let key = self.location.key(record_key);
        self.store.upsert(&key, bins).await
    }
}
