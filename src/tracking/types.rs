//! Frame and tracking result types shared by all tracking backends.

use serde::{Deserialize, Serialize};

use crate::retarget::PoseMatrix;

/// Opaque identifier of a decoded video frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// The current camera image as seen by the render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrame {
    /// Media clock time in milliseconds
    pub timestamp_ms: f64,
    pub handle: FrameHandle,
}

impl VideoFrame {
    pub fn new(timestamp_ms: f64, handle: FrameHandle) -> Self {
        Self {
            timestamp_ms,
            handle,
        }
    }
}

/// How much of the stream is available, ordered from least to most.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    /// Nothing known about the stream yet
    #[default]
    HaveNothing,
    /// Stream metadata known, no frame decoded
    HaveMetadata,
    /// A frame for the current position is available
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Whether a frame can be read at the current position.
    pub fn has_current_data(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// A single expression score, e.g. `("jawOpen", 0.42)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "category_name", alias = "name")]
    pub name: String,
    /// Score in [0, 1]
    pub score: f32,
}

impl Category {
    pub fn new(name: &str, score: f32) -> Self {
        Self {
            name: name.to_string(),
            score,
        }
    }
}

/// Output of one landmark detection. Both parts are absent when no face was
/// found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingResult {
    pub pose: Option<PoseMatrix>,
    /// Ordered scores, names unique within one result
    pub expressions: Option<Vec<Category>>,
}

impl TrackingResult {
    pub fn is_empty(&self) -> bool {
        self.pose.is_none() && self.expressions.is_none()
    }
}
