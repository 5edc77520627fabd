use crate::analytics::geometry::BoundingBox;
use crate::capture::Frame;
use crate::db::models::Zone;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One detector hit in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Self {
        Self {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            confidence,
        }
    }
}

/// Person detector.
///
/// Output order is significant: zone matching breaks ties by the first
/// detection in the returned list.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run inference on a frame, returning person boxes at or above the threshold
    async fn infer(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;

    fn model_version(&self) -> &str;
}

/// Source of the "belongings present" signal used for abandoned-item timing
#[async_trait]
pub trait BelongingsSensor: Send + Sync {
    /// Ids of the zones that currently hold an unattended object
    async fn zones_with_objects(&self, frame: &Frame, zones: &[Zone]) -> Result<HashSet<String>>;
}
