//! Key-value store boundary.
//!
//! Records are addressed by namespace, set and user key and hold named bins.
//! Every write is a partial update: bins present in the write replace bins of
//! the same name, all other bins of the record are left untouched.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreBackend, StoreSettings};
use crate::error::{PipelineError, PipelineResult};

/// Value of a single bin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinValue {
    Int(i64),
    Str(String),
    StrList(Vec<String>),
    IntMap(BTreeMap<String, i64>),
    StrMap(BTreeMap<String, String>),
}

impl BinValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Self::StrList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_map(&self) -> Option<&BTreeMap<String, i64>> {
        match self {
            Self::IntMap(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::StrMap(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for BinValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for BinValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for BinValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Vec<String>> for BinValue {
    fn from(v: Vec<String>) -> Self {
        Self::StrList(v)
    }
}

impl From<BTreeMap<String, i64>> for BinValue {
    fn from(v: BTreeMap<String, i64>) -> Self {
        Self::IntMap(v)
    }
}

impl From<BTreeMap<String, String>> for BinValue {
    fn from(v: BTreeMap<String, String>) -> Self {
        Self::StrMap(v)
    }
}

pub type Bins = BTreeMap<String, BinValue>;

/// Builds a `Bins` map from `name => value` pairs.
#[macro_export]
macro_rules! bins {
    ($($name:expr => $value:expr),* $(,)?) => {{
        let mut bins = $crate::store::Bins::new();
        $( bins.insert($name.to_string(), $crate::store::BinValue::from($value)); )*
        bins
    }};
}

/// A stored record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub bins: Bins,

    /// Number of writes applied to the record
    pub generation: u32,
}

impl Record {
    pub fn bin(&self, name: &str) -> Option<&BinValue> {
        self.bins.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub namespace: String,
    pub set_name: String,
    pub user_key: String,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.set_name, self.user_key)
    }
}

/// Fixed namespace and set every record of the workload lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub namespace: String,
    pub set_name: String,
}

impl StoreLocation {
    pub fn new(namespace: impl Into<String>, set_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set_name: set_name.into(),
        }
    }

    pub fn key(&self, user_key: &str) -> RecordKey {
        RecordKey {
            namespace: self.namespace.clone(),
            set_name: self.set_name.clone(),
            user_key: user_key.to_string(),
        }
    }
}

/// Store client shared by every stage. Implementations must be safe to call
/// concurrently; the pipeline adds no locking around them.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the record if absent, otherwise merge `bins` into it.
    async fn upsert(&self, key: &RecordKey, bins: Bins) -> PipelineResult<()>;

    async fn get(&self, key: &RecordKey) -> PipelineResult<Option<Record>>;

    /// Every record stored under `location`.
    async fn scan(&self, location: &StoreLocation) -> PipelineResult<Vec<(RecordKey, Record)>>;
}

/// Build a `Write` error naming the record and the bins that failed.
pub fn write_error(key: &RecordKey, bins: &Bins, reason: impl Into<String>) -> PipelineError {
    PipelineError::Write {
        key: key.to_string(),
        bins: bins.keys().cloned().collect::<Vec<_>>().join(", "),
        reason: reason.into(),
    }
}

/// Open the configured store.
///
/// The address is only checked for being well-formed. The memory backend
/// opens no connection and accepts any such address.
pub fn connect(settings: &StoreSettings) -> PipelineResult<Arc<dyn RecordStore>> {
    let address = format!("{}:{}", settings.host, settings.port);

    if settings.host.trim().is_empty() {
        return Err(PipelineError::Connection {
            address,
            reason: "host is empty".to_string(),
        });
    }
    if settings.port == 0 {
        return Err(PipelineError::Connection {
            address,
            reason: "port must be non-zero".to_string(),
        });
    }

    match settings.backend {
        StoreBackend::Memory => {
            info!(%address, backend = "memory", "memory store opened, address not contacted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
