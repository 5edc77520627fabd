use crate::db::models::Store;
use crate::error::Error;
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct StoresRepository {
    pool: Arc<PgPool>,
}

impl StoresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, store_id: &str) -> Result<Option<Store>> {
        let result = sqlx::query_as::<_, Store>(
            r#"
            SELECT store_id, store_name, rtsp_host, rtsp_port, total_channels,
                   active_channels, is_active
            FROM stores
            WHERE store_id = $1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get store by ID: {}", e)))?;

        Ok(result)
    }
}
