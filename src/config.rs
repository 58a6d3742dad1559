//! Run configuration, loaded from a JSON file and overridden from the CLI.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::core::{AttributeTable, Person, ThumbnailTemplate};
use crate::error::{PipelineError, PipelineResult};
use crate::store::StoreLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Process `frame_count` frames, drain every stage, exit
    Bounded,
    /// Sweep all streams forever, reporting after every sweep
    Continuous,
}

impl Default for RunMode {
    fn default() -> Self {
        Self::Bounded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DriverStrategy {
    /// One loop emits every frame in order
    Sequential,
    /// One short-lived worker per frame
    Pool,
}

impl Default for DriverStrategy {
    fn default() -> Self {
        Self::Sequential
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
}

impl Default for StoreBackend {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub set_name: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            host: "127.0.0.1".to_string(),
            port: 3000,
            namespace: "test".to_string(),
            set_name: "search-engine".to_string(),
        }
    }
}

impl StoreSettings {
    pub fn location(&self) -> StoreLocation {
        StoreLocation::new(&self.namespace, &self.set_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub store: StoreSettings,
    pub mode: RunMode,
    pub frame_count: u64,
    pub stream_count: u32,
    pub driver: DriverStrategy,

    /// Upper bound on simultaneously running pool workers, unbounded if unset
    pub pool_concurrency: Option<usize>,

    pub report_interval_ms: u64,
    pub channel_capacity: usize,
    pub thumbnail_base_url: String,
    pub event_id: i64,

    /// Replaces the built-in table when set
    pub attribute_table: Option<Vec<Vec<Person>>>,

    /// Re-read and check every record after a bounded run
    pub verify: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            mode: RunMode::Bounded,
            frame_count: 1000,
            stream_count: 1000,
            driver: DriverStrategy::Sequential,
            pool_concurrency: None,
            report_interval_ms: 1000,
            channel_capacity: 1,
            thumbnail_base_url: "https://thumbnails.example.com/sample-thumbnails/".to_string(),
            event_id: 1,
            attribute_table: None,
            verify: false,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(config: Value) -> PipelineResult<Self> {
        let config: Self = serde_json::from_value(config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_json(value)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.stream_count == 0 {
            return Err(PipelineError::config("stream_count", "must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(PipelineError::config("channel_capacity", "must be at least 1"));
        }
        if self.store.host.trim().is_empty() {
            return Err(PipelineError::config("store.host", "must not be empty"));
        }
        if self.store.port == 0 {
            return Err(PipelineError::config("store.port", "must be non-zero"));
        }
        if self.pool_concurrency == Some(0) {
            return Err(PipelineError::config("pool_concurrency", "must be at least 1"));
        }

        match self.mode {
            RunMode::Bounded => {
                if self.frame_count == 0 {
                    return Err(PipelineError::config("frame_count", "must be at least 1"));
                }
            }
            RunMode::Continuous => {
                if self.report_interval_ms == 0 {
                    return Err(PipelineError::config(
                        "report_interval_ms",
                        "must be at least 1 in continuous mode",
                    ));
                }
                if self.driver == DriverStrategy::Pool {
                    return Err(PipelineError::config(
                        "driver",
                        "the pool driver only supports bounded mode",
                    ));
                }
            }
        }

        self.table().map(|_| ())
    }

    pub fn table(&self) -> PipelineResult<AttributeTable> {
        match &self.attribute_table {
            Some(rows) => AttributeTable::new(rows.clone()),
            None => Ok(AttributeTable::builtin()),
        }
    }

    pub fn thumbnails(&self) -> ThumbnailTemplate {
        ThumbnailTemplate::new(&self.thumbnail_base_url)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}
