use crate::db::models::DetectionEvent;
use crate::error::Error;
use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

const INSERT_COLUMNS: &str = r#"
    INSERT INTO detection_events (
        id, store_id, seat_id, channel_id, event_type, previous_status, new_status,
        person_detected, person_count, object_detected, confidence,
        bbox_x1, bbox_y1, bbox_x2, bbox_y2,
        processing_time_ms, model_version, metadata, created_at
    )
"#;

/// Events repository for `detection_events`
#[derive(Clone)]
pub struct EventsRepository {
    pool: Arc<PgPool>,
}

impl EventsRepository {
    /// Create a new events repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Insert a single event
    pub async fn create(&self, event: &DetectionEvent) -> Result<()> {
        self.create_many(std::slice::from_ref(event)).await?;
        Ok(())
    }

    /// Insert several events with one statement
    pub async fn create_many(&self, events: &[DetectionEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(INSERT_COLUMNS);
        builder.push_values(events, |mut row, event| {
            let bbox = event.bbox.map(|b| b.to_array());
            row.push_bind(event.id)
                .push_bind(&event.store_id)
                .push_bind(&event.seat_id)
                .push_bind(event.channel_id)
                .push_bind(event.event_type.as_str())
                .push_bind(event.previous_status.map(|s| s.as_str()))
                .push_bind(event.new_status.map(|s| s.as_str()))
                .push_bind(event.person_detected)
                .push_bind(event.person_count)
                .push_bind(event.object_detected)
                .push_bind(event.confidence)
                .push_bind(bbox.map(|b| b[0]))
                .push_bind(bbox.map(|b| b[1]))
                .push_bind(bbox.map(|b| b[2]))
                .push_bind(bbox.map(|b| b[3]))
                .push_bind(event.processing_time_ms)
                .push_bind(&event.model_version)
                .push_bind(&event.metadata)
                .push_bind(event.created_at);
        });

        let result = builder
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to insert event batch: {}", e)))?;

        Ok(result.rows_affected())
    }
}
