//! Face identifier minting.

use uuid::Uuid;

use crate::error::PipelineResult;

/// Source of globally unique opaque identifiers, callable from any stage.
pub trait IdGenerator: Send + Sync {
    fn new_identifier(&self) -> PipelineResult<String>;
}

/// Random (v4) UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_identifier(&self) -> PipelineResult<String> {
        Ok(Uuid::new_v4().to_string())
    }
}
