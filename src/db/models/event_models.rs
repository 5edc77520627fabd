use crate::analytics::geometry::BoundingBox;
use crate::db::models::OccupancyStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kinds of rows written to `detection_events`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Per-cycle telemetry, batched
    DetectionFrame,
    PersonEnter,
    PersonLeave,
    AbandonedDetected,
    ItemRemoved,
    StatusChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DetectionFrame => "detection_frame",
            EventType::PersonEnter => "person_enter",
            EventType::PersonLeave => "person_leave",
            EventType::AbandonedDetected => "abandoned_detected",
            EventType::ItemRemoved => "item_removed",
            EventType::StatusChange => "status_change",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection event, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub id: Uuid,
    pub store_id: String,
    pub seat_id: String,
    pub channel_id: i32,
    pub event_type: EventType,
    pub previous_status: Option<OccupancyStatus>,
    pub new_status: Option<OccupancyStatus>,
    pub person_detected: bool,
    pub person_count: i32,
    pub object_detected: bool,
    pub confidence: Option<f32>,
    pub bbox: Option<BoundingBox>,
    pub processing_time_ms: Option<i32>,
    pub model_version: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl DetectionEvent {
    pub fn new(store_id: &str, seat_id: &str, channel_id: i32, event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id: store_id.to_string(),
            seat_id: seat_id.to_string(),
            channel_id,
            event_type,
            previous_status: None,
            new_status: None,
            person_detected: false,
            person_count: 0,
            object_detected: false,
            confidence: None,
            bbox: None,
            processing_time_ms: None,
            model_version: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_status_change(&self) -> bool {
        self.event_type != EventType::DetectionFrame
    }
}
