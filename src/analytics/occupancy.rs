use crate::analytics::zone_matcher::MatchResult;
use crate::db::models::{EventType, OccupancyRecord, OccupancyStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Event emitted for a status transition
pub fn event_for_transition(previous: OccupancyStatus, new: OccupancyStatus) -> EventType {
    use OccupancyStatus::*;
    match (previous, new) {
        (Empty, Occupied) => EventType::PersonEnter,
        (Occupied, Empty) => EventType::PersonLeave,
        (Empty, Abandoned) | (Occupied, Abandoned) => EventType::AbandonedDetected,
        (Abandoned, Occupied) => EventType::PersonEnter,
        (Abandoned, Empty) => EventType::ItemRemoved,
        _ => EventType::StatusChange,
    }
}

/// Result of one observation of one zone
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub previous: OccupancyStatus,
    pub record: OccupancyRecord,
    /// Set only when the status changed
    pub event: Option<EventType>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.event.is_some()
    }
}

/// Per-zone occupancy tracking for one channel
pub struct OccupancyStateMachine {
    polling_interval: Duration,
    abandoned_threshold: Duration,
    records: HashMap<String, OccupancyRecord>,
    abandoned_timers: HashMap<String, Duration>,
}

impl OccupancyStateMachine {
    pub fn new(polling_interval: Duration, abandoned_threshold: Duration) -> Self {
        Self {
            polling_interval,
            abandoned_threshold,
            records: HashMap::new(),
            abandoned_timers: HashMap::new(),
        }
    }

    /// Seed a zone from its persisted record; a missing record starts EMPTY
    pub fn seed(&mut self, zone_id: &str, record: Option<OccupancyRecord>) {
        self.records
            .insert(zone_id.to_string(), record.unwrap_or_default());
        self.abandoned_timers.remove(zone_id);
    }

    pub fn status(&self, zone_id: &str) -> OccupancyStatus {
        self.records
            .get(zone_id)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn abandoned_timer(&self, zone_id: &str) -> Duration {
        self.abandoned_timers
            .get(zone_id)
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn observe(
        &mut self,
        zone_id: &str,
        matched: &MatchResult,
        object_detected: bool,
        now: DateTime<Utc>,
    ) -> Transition {
        let prior = self.records.get(zone_id).cloned().unwrap_or_default();
        let previous = prior.status;
        let person_detected = matched.is_occupied();

        let timer = self
            .abandoned_timers
            .entry(zone_id.to_string())
            .or_insert(Duration::ZERO);

        let new_status = if person_detected {
            *timer = Duration::ZERO;
            OccupancyStatus::Occupied
        } else if object_detected {
            *timer += self.polling_interval;
            if *timer >= self.abandoned_threshold {
                OccupancyStatus::Abandoned
            } else {
                OccupancyStatus::Empty
            }
        } else {
            *timer = Duration::ZERO;
            OccupancyStatus::Empty
        };

        let mut record = OccupancyRecord {
            status: new_status,
            person_detected,
            object_detected,
            detection_confidence: person_detected.then_some(matched.score as f32),
            last_person_seen: prior.last_person_seen,
            last_empty_time: None,
            vacant_duration_seconds: 0,
        };

        match new_status {
            OccupancyStatus::Empty => match prior.last_empty_time {
                Some(since) => {
                    record.last_empty_time = Some(since);
                    record.vacant_duration_seconds = (now - since).num_seconds().max(0);
                }
                None => record.last_empty_time = Some(now),
            },
            OccupancyStatus::Occupied => record.last_person_seen = Some(now),
            OccupancyStatus::Abandoned => {}
        }

        self.records.insert(zone_id.to_string(), record.clone());

        Transition {
            previous,
            event: (new_status != previous).then(|| event_for_transition(previous, new_status)),
            record,
        }
    }
}
