use crate::db::models::{OccupancyRecord, OccupancyRow};
use crate::error::Error;
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

/// Live per-seat state in `seat_status`
#[derive(Clone)]
pub struct OccupancyRepository {
    pool: Arc<PgPool>,
}

impl OccupancyRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn get(&self, store_id: &str, seat_id: &str) -> Result<Option<OccupancyRecord>> {
        let row = sqlx::query_as::<_, OccupancyRow>(
            r#"
            SELECT status, person_detected, object_detected, detection_confidence,
                   last_person_seen, last_empty_time, vacant_duration_seconds
            FROM seat_status
            WHERE store_id = $1 AND seat_id = $2
            "#,
        )
        .bind(store_id)
        .bind(seat_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get seat status: {}", e)))?;

        Ok(row.map(OccupancyRecord::try_from).transpose()?)
    }

    /// Insert or replace the seat's state
    pub async fn upsert(&self, store_id: &str, seat_id: &str, record: &OccupancyRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seat_status (
                store_id, seat_id, status, person_detected, object_detected,
                detection_confidence, last_person_seen, last_empty_time,
                vacant_duration_seconds, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (store_id, seat_id) DO UPDATE SET
                status = EXCLUDED.status,
                person_detected = EXCLUDED.person_detected,
                object_detected = EXCLUDED.object_detected,
                detection_confidence = EXCLUDED.detection_confidence,
                last_person_seen = EXCLUDED.last_person_seen,
                last_empty_time = EXCLUDED.last_empty_time,
                vacant_duration_seconds = EXCLUDED.vacant_duration_seconds,
                updated_at = NOW()
            "#,
        )
        .bind(store_id)
        .bind(seat_id)
        .bind(record.status.as_str())
        .bind(record.person_detected)
        .bind(record.object_detected)
        .bind(record.detection_confidence)
        .bind(record.last_person_seen)
        .bind(record.last_empty_time)
        .bind(record.vacant_duration_seconds.min(i32::MAX as i64) as i32)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update seat status: {}", e)))?;

        Ok(())
    }
}
