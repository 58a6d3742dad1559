#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ingestlab::config::PipelineConfig;
use ingestlab::error::{PipelineError, PipelineResult};
use ingestlab::ids::IdGenerator;
use ingestlab::store::{write_error, Bins, MemoryStore, Record, RecordKey, RecordStore, StoreLocation};
use ingestlab::IngestPipeline;

/// Ids `face-000000`, `face-000001`, ... in minting order
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn new_identifier(&self) -> PipelineResult<String> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(format!("face-{:06}", n))
    }
}

pub struct BrokenIds;

impl IdGenerator for BrokenIds {
    fn new_identifier(&self) -> PipelineResult<String> {
        Err(PipelineError::IdentifierGeneration {
            reason: "entropy source unavailable".to_string(),
        })
    }
}

/// Memory store that remembers which bins every write carried
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingStore {
    /// User keys of every write that touched `bin`, in write order
    pub fn keys_written_with(&self, bin: &str) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, bins)| bins.iter().any(|b| b == bin))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl RecordStore for RecordingStore {
    async fn upsert(&self, key: &RecordKey, bins: Bins) -> PipelineResult<()> {
        let names = bins.keys().cloned().collect();
        self.inner.upsert(key, bins).await?;
        self.writes.lock().unwrap().push((key.user_key.clone(), names));
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> PipelineResult<Option<Record>> {
        self.inner.get(key).await
    }

    async fn scan(&self, location: &StoreLocation) -> PipelineResult<Vec<(RecordKey, Record)>> {
        self.inner.scan(location).await
    }
}

/// Fails every write that carries `bin`, after letting `allowed` of them through
pub struct FailingStore {
    inner: MemoryStore,
    bin: &'static str,
    allowed: u64,
    seen: AtomicU64,
}

impl FailingStore {
    pub fn on_bin(bin: &'static str) -> Self {
        Self::on_bin_after(bin, 0)
    }

    pub fn on_bin_after(bin: &'static str, allowed: u64) -> Self {
        Self {
            inner: MemoryStore::new(),
            bin,
            allowed,
            seen: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn upsert(&self, key: &RecordKey, bins: Bins) -> PipelineResult<()> {
        if bins.contains_key(self.bin) && self.seen.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(write_error(key, &bins, "simulated store outage"));
        }
        self.inner.upsert(key, bins).await
    }

    async fn get(&self, key: &RecordKey) -> PipelineResult<Option<Record>> {
        self.inner.get(key).await
    }

    async fn scan(&self, location: &StoreLocation) -> PipelineResult<Vec<(RecordKey, Record)>> {
        self.inner.scan(location).await
    }
}

pub fn bounded_config(frames: u64, streams: u32) -> PipelineConfig {
    PipelineConfig {
        frame_count: frames,
        stream_count: streams,
        ..PipelineConfig::default()
    }
}

pub fn memory_pipeline(config: PipelineConfig) -> (IngestPipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let pipeline = IngestPipeline::new(config, store.clone(), Arc::new(SequentialIds::default())).unwrap();
    (pipeline, store)
}

pub fn slow_store(latency_ms: u64) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_write_latency(Duration::from_millis(latency_ms)))
}

/// The single record whose `streamId` bin equals `stream_id`
pub async fn record_for_stream(store: &MemoryStore, location: &StoreLocation, stream_id: i64) -> Record {
    let records = store.scan(location).await.unwrap();
    let mut matching: Vec<Record> = records
        .into_iter()
        .filter(|(_, r)| r.bin("streamId").and_then(|b| b.as_int()) == Some(stream_id))
        .map(|(_, r)| r)
        .collect();
    assert_eq!(matching.len(), 1, "expected exactly one record for stream {}", stream_id);
    matching.remove(0)
}

/// Memory store that delays only writes carrying `bin`
pub struct SlowBinStore {
    inner: MemoryStore,
    bin: &'static str,
    latency: Duration,
}

impl SlowBinStore {
    pub fn new(bin: &'static str, latency_ms: u64) -> Self {
        Self {
            inner: MemoryStore::new(),
            bin,
            latency: Duration::from_millis(latency_ms),
        }
    }
}

#[async_trait]
impl RecordStore for SlowBinStore {
    async fn upsert(&self, key: &RecordKey, bins: Bins) -> PipelineResult<()> {
        if bins.contains_key(self.bin) {
            tokio::time::sleep(self.latency).await;
        }
        self.inner.upsert(key, bins).await
    }

    async fn get(&self, key: &RecordKey) -> PipelineResult<Option<Record>> {
        self.inner.get(key).await
    }

    async fn scan(&self, location: &StoreLocation) -> PipelineResult<Vec<(RecordKey, Record)>> {
        self.inner.scan(location).await
    }
}

/// The first `PipelineError` in an error chain
pub fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain().find_map(|e| e.downcast_ref::<PipelineError>())
}
