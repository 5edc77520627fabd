use crate::config::DatabaseConfig;
use crate::error::Error;
use anyhow::Result;
use log::{error, info};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;

pub mod memory;
pub mod migrations;
pub mod models;
pub mod persistence;
pub mod repositories;

pub use memory::MemoryPersistence;
pub use persistence::{Persistence, PgPersistence};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL pool shared by every channel worker
pub struct DatabaseService {
    pub pool: Arc<PgPool>,
    config: DatabaseConfig,
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

impl DatabaseService {
    /// Open the pool, then apply the schema if `auto_migrate` is set
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to seat database");

        let pool = pool_options(config)
            .connect(&config.url)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        info!(
            "Seat database pool ready (max {} connections)",
            config.max_connections
        );

        let service = Self {
            pool: Arc::new(pool),
            config: config.clone(),
        };

        if config.auto_migrate {
            service.run_migrations().await?;
        }

        Ok(service)
    }

    /// Apply the SQL files from `migrations_dir` in order
    pub async fn run_migrations(&self) -> Result<()> {
        info!(
            "Applying seat schema from {}",
            self.config.migrations_dir.display()
        );

        migrations::run_migrations(&self.pool, &self.config.migrations_dir)
            .await
            .map_err(|e| Error::Database(format!("Failed to run migrations: {}", e)))?;

        info!("Seat schema up to date");

        Ok(())
    }

    /// `false` when `SELECT 1` fails; startup continues either way
    pub async fn health_check(&self) -> Result<bool> {
        match sqlx::query("SELECT 1").execute(&*self.pool).await {
            Ok(_) => Ok(true),
            Err(e) => {
                error!("Seat database unreachable: {}", e);
                Ok(false)
            }
        }
    }

    /// Worker-facing handle; every query it runs is capped by `query_timeout_secs`
    pub fn persistence(&self) -> PgPersistence {
        PgPersistence::new(
            self.pool.clone(),
            Duration::from_secs(self.config.query_timeout_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_follows_configured_size() {
        let config = DatabaseConfig {
            max_connections: 12,
            ..DatabaseConfig::default()
        };

        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 12);
        assert_eq!(options.get_acquire_timeout(), ACQUIRE_TIMEOUT);
    }
}
