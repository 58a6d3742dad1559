use serde::{Deserialize, Serialize};

/// One synthetic frame ingested from a camera stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub stream_index: u32,

    /// Seconds since epoch
    pub timestamp: i64,

    /// `"{stream_index}:{timestamp}"`
    pub record_key: String,

    pub thumbnail_url: String,
}

impl Frame {
    pub fn new(stream_index: u32, timestamp: i64, thumbnails: &ThumbnailTemplate) -> Self {
        Self {
            stream_index,
            timestamp,
            record_key: record_key(stream_index, timestamp),
            thumbnail_url: thumbnails.url_for(stream_index),
        }
    }
}

pub fn record_key(stream_index: u32, timestamp: i64) -> String {
    format!("{}:{}", stream_index, timestamp)
}

/// Faces found on a frame, fanned out to the attribute stages.
///
/// `face_ids[i]` belongs to entry `i` of the attribute row for `stream_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSet {
    pub stream_index: u32,
    pub timestamp: i64,
    pub record_key: String,
    pub face_ids: Vec<String>,
}

impl FaceSet {
    pub fn from_frame(frame: &Frame, face_ids: Vec<String>) -> Self {
        Self {
            stream_index: frame.stream_index,
            timestamp: frame.timestamp,
            record_key: frame.record_key.clone(),
            face_ids,
        }
    }
}

/// Builds thumbnail URLs as `{base_url}{index:03}.{extension}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailTemplate {
    pub base_url: String,
    pub extension: String,
}

impl ThumbnailTemplate {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            extension: "jpeg".to_string(),
        }
    }

    pub fn url_for(&self, stream_index: u32) -> String {
        format!("{}{:03}.{}", self.base_url, stream_index, self.extension)
    }
}
