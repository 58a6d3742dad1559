use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{Bins, Record, RecordKey, RecordStore, StoreLocation};
use crate::error::PipelineResult;

/// In-process store with the same partial-update semantics as the real one.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, Record>>,
    write_latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write by `latency` to mimic a network round-trip.
    pub fn with_write_latency(latency: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            write_latency: Some(latency),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of every record currently stored.
    pub async fn records(&self) -> HashMap<RecordKey, Record> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(&self, key: &RecordKey, bins: Bins) -> PipelineResult<()> {
        if let Some(latency) = self.write_latency {
            tokio::time::sleep(latency).await;
        }

        let mut records = self.records.write().await;
        let record = records.entry(key.clone()).or_default();
        record.bins.extend(bins);
        record.generation += 1;
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> PipelineResult<Option<Record>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn scan(&self, location: &StoreLocation) -> PipelineResult<Vec<(RecordKey, Record)>> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .iter()
            .filter(|(key, _)| key.namespace == location.namespace && key.set_name == location.set_name)
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matching)
    }
}
