use crate::db::models::SystemLogEntry;
use crate::error::Error;
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct SystemLogsRepository {
    pool: Arc<PgPool>,
}

impl SystemLogsRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, entry: &SystemLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO system_logs (store_id, log_level, component, message, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.store_id)
        .bind(&entry.log_level)
        .bind(&entry.component)
        .bind(&entry.message)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to write system log: {}", e)))?;

        Ok(())
    }
}
