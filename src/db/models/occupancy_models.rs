use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seat occupancy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyStatus {
    #[default]
    Empty,
    Occupied,
    Abandoned,
}

impl OccupancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyStatus::Empty => "empty",
            OccupancyStatus::Occupied => "occupied",
            OccupancyStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.trim().to_lowercase().as_str() {
            "empty" => Ok(OccupancyStatus::Empty),
            "occupied" => Ok(OccupancyStatus::Occupied),
            "abandoned" => Ok(OccupancyStatus::Abandoned),
            other => Err(Error::Serialization(format!(
                "Unknown occupancy status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known state of one seat
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub status: OccupancyStatus,
    pub person_detected: bool,
    pub object_detected: bool,
    pub detection_confidence: Option<f32>,
    pub last_person_seen: Option<DateTime<Utc>>,
    pub last_empty_time: Option<DateTime<Utc>>,
    /// Only meaningful while `status` is `Empty`
    pub vacant_duration_seconds: i64,
}

/// Row of the `seat_status` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OccupancyRow {
    pub status: String,
    pub person_detected: Option<bool>,
    pub object_detected: Option<bool>,
    pub detection_confidence: Option<f32>,
    pub last_person_seen: Option<DateTime<Utc>>,
    pub last_empty_time: Option<DateTime<Utc>>,
    pub vacant_duration_seconds: Option<i32>,
}

impl TryFrom<OccupancyRow> for OccupancyRecord {
    type Error = Error;

    fn try_from(row: OccupancyRow) -> Result<Self, Self::Error> {
        Ok(OccupancyRecord {
            status: OccupancyStatus::parse(&row.status)?,
            person_detected: row.person_detected.unwrap_or(false),
            object_detected: row.object_detected.unwrap_or(false),
            detection_confidence: row.detection_confidence,
            last_person_seen: row.last_person_seen,
            last_empty_time: row.last_empty_time,
            vacant_duration_seconds: row.vacant_duration_seconds.unwrap_or(0).max(0) as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OccupancyStatus::Empty,
            OccupancyStatus::Occupied,
            OccupancyStatus::Abandoned,
        ] {
            assert_eq!(OccupancyStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_eq!(OccupancyStatus::parse(" OCCUPIED ").unwrap(), OccupancyStatus::Occupied);
        assert!(OccupancyStatus::parse("reserved").is_err());
    }

    #[test]
    fn row_nulls_take_defaults() {
        let row = OccupancyRow {
            status: "empty".to_string(),
            person_detected: None,
            object_detected: None,
            detection_confidence: None,
            last_person_seen: None,
            last_empty_time: None,
            vacant_duration_seconds: None,
        };
        let record = OccupancyRecord::try_from(row).unwrap();
        assert_eq!(record, OccupancyRecord::default());
    }
}
