use crate::db::models::{DetectionEvent, OccupancyRecord, Store, SystemLogEntry, Zone};
use crate::db::repositories::{
    EventsRepository, OccupancyRepository, StoresRepository, SystemLogsRepository,
    ZonesRepository,
};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Storage backend used by the workers
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>>;

    async fn fetch_zones(&self, store_id: &str, channel_id: i32) -> Result<Vec<Zone>>;

    async fn get_record(&self, store_id: &str, zone_id: &str) -> Result<Option<OccupancyRecord>>;

    async fn put_record(&self, store_id: &str, zone_id: &str, record: &OccupancyRecord)
        -> Result<()>;

    async fn append_event(&self, event: &DetectionEvent) -> Result<()>;

    async fn append_events_batch(&self, events: &[DetectionEvent]) -> Result<()>;

    async fn log_system_event(&self, entry: &SystemLogEntry) -> Result<()>;
}

/// PostgreSQL persistence with a deadline on every query
pub struct PgPersistence {
    stores: StoresRepository,
    zones: ZonesRepository,
    occupancy: OccupancyRepository,
    events: EventsRepository,
    system_logs: SystemLogsRepository,
    query_timeout: Duration,
}

impl PgPersistence {
    pub fn new(pool: Arc<PgPool>, query_timeout: Duration) -> Self {
        Self {
            stores: StoresRepository::new(pool.clone()),
            zones: ZonesRepository::new(pool.clone()),
            occupancy: OccupancyRepository::new(pool.clone()),
            events: EventsRepository::new(pool.clone()),
            system_logs: SystemLogsRepository::new(pool),
            query_timeout,
        }
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                Error::Database(format!("{} timed out after {:?}", what, self.query_timeout))
            })?
    }
}

#[async_trait]
impl Persistence for PgPersistence {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        self.bounded("get_store", self.stores.get_by_id(store_id)).await
    }

    async fn fetch_zones(&self, store_id: &str, channel_id: i32) -> Result<Vec<Zone>> {
        self.bounded("fetch_zones", self.zones.get_by_channel(store_id, channel_id))
            .await
    }

    async fn get_record(&self, store_id: &str, zone_id: &str) -> Result<Option<OccupancyRecord>> {
        self.bounded("get_record", self.occupancy.get(store_id, zone_id))
            .await
    }

    async fn put_record(
        &self,
        store_id: &str,
        zone_id: &str,
        record: &OccupancyRecord,
    ) -> Result<()> {
        self.bounded("put_record", self.occupancy.upsert(store_id, zone_id, record))
            .await
    }

    async fn append_event(&self, event: &DetectionEvent) -> Result<()> {
        self.bounded("append_event", self.events.create(event)).await
    }

    async fn append_events_batch(&self, events: &[DetectionEvent]) -> Result<()> {
        self.bounded("append_events_batch", self.events.create_many(events))
            .await
            .map(|_| ())
    }

    async fn log_system_event(&self, entry: &SystemLogEntry) -> Result<()> {
        self.bounded("log_system_event", self.system_logs.create(entry))
            .await
    }
}
