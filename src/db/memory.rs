use crate::db::models::{DetectionEvent, OccupancyRecord, Store, SystemLogEntry, Zone};
use crate::db::persistence::Persistence;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct State {
    stores: HashMap<String, Store>,
    zones: HashMap<(String, i32), Vec<Zone>>,
    records: HashMap<(String, String), OccupancyRecord>,
    events: Vec<DetectionEvent>,
    system_logs: Vec<SystemLogEntry>,
}

/// Process-local persistence for dry runs.
///
/// Channels without registered zones report `NotFound`, so zone lookups
/// fall through to the local snapshots.
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<State>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_store(&self, store: Store) {
        self.state().stores.insert(store.store_id.clone(), store);
    }

    pub fn insert_zones(&self, store_id: &str, channel_id: i32, zones: Vec<Zone>) {
        self.state()
            .zones
            .insert((store_id.to_string(), channel_id), zones);
    }

    pub fn insert_record(&self, store_id: &str, zone_id: &str, record: OccupancyRecord) {
        self.state()
            .records
            .insert((store_id.to_string(), zone_id.to_string()), record);
    }

    pub fn record(&self, store_id: &str, zone_id: &str) -> Option<OccupancyRecord> {
        self.state()
            .records
            .get(&(store_id.to_string(), zone_id.to_string()))
            .cloned()
    }

    pub fn events(&self) -> Vec<DetectionEvent> {
        self.state().events.clone()
    }

    pub fn system_logs(&self) -> Vec<SystemLogEntry> {
        self.state().system_logs.clone()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        Ok(self.state().stores.get(store_id).cloned())
    }

    async fn fetch_zones(&self, store_id: &str, channel_id: i32) -> Result<Vec<Zone>> {
        self.state()
            .zones
            .get(&(store_id.to_string(), channel_id))
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("No zones for {} channel {}", store_id, channel_id)).into()
            })
    }

    async fn get_record(&self, store_id: &str, zone_id: &str) -> Result<Option<OccupancyRecord>> {
        Ok(self.record(store_id, zone_id))
    }

    async fn put_record(
        &self,
        store_id: &str,
        zone_id: &str,
        record: &OccupancyRecord,
    ) -> Result<()> {
        self.insert_record(store_id, zone_id, record.clone());
        Ok(())
    }

    async fn append_event(&self, event: &DetectionEvent) -> Result<()> {
        self.state().events.push(event.clone());
        Ok(())
    }

    async fn append_events_batch(&self, events: &[DetectionEvent]) -> Result<()> {
        self.state().events.extend_from_slice(events);
        Ok(())
    }

    async fn log_system_event(&self, entry: &SystemLogEntry) -> Result<()> {
        self.state().system_logs.push(entry.clone());
        Ok(())
    }
}
