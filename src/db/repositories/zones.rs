use crate::db::models::{Zone, ZoneRow};
use crate::error::Error;
use anyhow::Result;
use log::warn;
use sqlx::PgPool;
use std::sync::Arc;

/// Seat (zone) definitions from the `seats` table
#[derive(Clone)]
pub struct ZonesRepository {
    pool: Arc<PgPool>,
}

impl ZonesRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Active zones mapped to one channel. Rows with unusable geometry are skipped.
    pub async fn get_by_channel(&self, store_id: &str, channel_id: i32) -> Result<Vec<Zone>> {
        let rows = sqlx::query_as::<_, ZoneRow>(
            r#"
            SELECT seat_id, store_id, channel_id, roi_type, roi_polygon, seat_label
            FROM seats
            WHERE store_id = $1 AND channel_id = $2 AND is_active = TRUE
            ORDER BY seat_id
            "#,
        )
        .bind(store_id)
        .bind(channel_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get seats for channel: {}", e)))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Zone::try_from(row) {
                Ok(zone) => Some(zone),
                Err(e) => {
                    warn!("Skipping seat: {}", e);
                    None
                }
            })
            .collect())
    }
}
