use crate::db::models::Zone;
use crate::db::persistence::Persistence;
use crate::error::Error;
use crate::zones::snapshot;
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

type CacheKey = (String, i32);

struct CacheEntry {
    zones: Vec<Zone>,
    fetched_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheKeyStats {
    pub store_id: String,
    pub channel_id: i32,
    pub zones: usize,
    pub age_secs: f64,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub ttl_secs: u64,
    pub keys: Vec<CacheKeyStats>,
}

/// Process-wide zone cache shared by all workers.
///
/// The lock is held only for map access, never across a fetch.
pub struct ZoneCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ZoneCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self, store_id: &str, channel_id: i32) -> Option<Vec<Zone>> {
        self.entries()
            .get(&(store_id.to_string(), channel_id))
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.zones.clone())
    }

    fn any(&self, store_id: &str, channel_id: i32) -> Option<Vec<Zone>> {
        self.entries()
            .get(&(store_id.to_string(), channel_id))
            .map(|e| e.zones.clone())
    }

    fn put(&self, store_id: &str, channel_id: i32, zones: Vec<Zone>) {
        self.entries().insert(
            (store_id.to_string(), channel_id),
            CacheEntry {
                zones,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, store_id: &str, channel_id: i32) {
        if self
            .entries()
            .remove(&(store_id.to_string(), channel_id))
            .is_some()
        {
            debug!("Zone cache invalidated: {}:{}", store_id, channel_id);
        }
    }

    pub fn invalidate_store(&self, store_id: &str) {
        self.entries().retain(|(store, _), _| store != store_id);
        debug!("Zone cache invalidated for store: {}", store_id);
    }

    pub fn clear(&self) {
        self.entries().clear();
        debug!("Zone cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        let mut keys: Vec<CacheKeyStats> = entries
            .iter()
            .map(|((store_id, channel_id), entry)| {
                let age = entry.fetched_at.elapsed();
                CacheKeyStats {
                    store_id: store_id.clone(),
                    channel_id: *channel_id,
                    zones: entry.zones.len(),
                    age_secs: age.as_secs_f64(),
                    expired: age >= self.ttl,
                }
            })
            .collect();
        keys.sort_by(|a, b| (&a.store_id, a.channel_id).cmp(&(&b.store_id, b.channel_id)));

        CacheStats {
            entries: entries.len(),
            ttl_secs: self.ttl.as_secs(),
            keys,
        }
    }
}

/// Where a zone list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    FreshCache,
    Primary,
    StaleCache,
    Snapshot,
    Nothing,
}

/// Zone lookup with fallbacks: fresh cache, backend, stale cache, local snapshot
pub struct ZoneRepository {
    persistence: Arc<dyn Persistence>,
    cache: Arc<ZoneCache>,
    snapshot_dir: PathBuf,
}

impl ZoneRepository {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        cache: Arc<ZoneCache>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            persistence,
            cache,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    pub fn cache(&self) -> &Arc<ZoneCache> {
        &self.cache
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    async fn save_snapshot(&self, store_id: &str, channel_id: i32, zones: Vec<Zone>) {
        let dir = self.snapshot_dir.clone();
        let store = store_id.to_string();
        let saved = tokio::task::spawn_blocking(move || {
            snapshot::save_snapshot(&dir, &store, channel_id, &zones)
        })
        .await;

        match saved {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Failed to save zone snapshot: {}", e),
            Err(e) => debug!("Zone snapshot task failed: {}", e),
        }
    }

    async fn load_snapshot(&self, store_id: &str, channel_id: i32) -> Result<Option<Vec<Zone>>> {
        let dir = self.snapshot_dir.clone();
        let store = store_id.to_string();
        tokio::task::spawn_blocking(move || snapshot::load_snapshot(&dir, &store, channel_id))
            .await
            .map_err(|e| Error::Internal(format!("Zone snapshot task failed: {}", e)))?
    }

    /// Zones for a channel; empty only when every source came up empty
    pub async fn get_zones(&self, store_id: &str, channel_id: i32) -> Vec<Zone> {
        self.resolve(store_id, channel_id).await.0
    }

    pub async fn resolve(&self, store_id: &str, channel_id: i32) -> (Vec<Zone>, ZoneSource) {
        if let Some(zones) = self.cache.fresh(store_id, channel_id) {
            debug!("Zone cache hit: {}:{}", store_id, channel_id);
            return (zones, ZoneSource::FreshCache);
        }

        match self.persistence.fetch_zones(store_id, channel_id).await {
            Ok(zones) => {
                self.cache.put(store_id, channel_id, zones.clone());
                if !zones.is_empty() {
                    self.save_snapshot(store_id, channel_id, zones.clone()).await;
                }
                debug!(
                    "Fetched {} zones for {}:{}",
                    zones.len(),
                    store_id,
                    channel_id
                );
                (zones, ZoneSource::Primary)
            }
            Err(e) => {
                warn!(
                    "Zone fetch failed for {}:{}, using fallback: {}",
                    store_id, channel_id, e
                );

                if let Some(zones) = self.cache.any(store_id, channel_id) {
                    info!("Using stale zone cache for {}:{}", store_id, channel_id);
                    return (zones, ZoneSource::StaleCache);
                }

                match self.load_snapshot(store_id, channel_id).await {
                    Ok(Some(zones)) => {
                        info!(
                            "Loaded {} zones from snapshot {}",
                            zones.len(),
                            snapshot::snapshot_path(&self.snapshot_dir, store_id, channel_id)
                                .display()
                        );
                        (zones, ZoneSource::Snapshot)
                    }
                    Ok(None) => (Vec::new(), ZoneSource::Nothing),
                    Err(e) => {
                        debug!("Failed to load zone snapshot: {}", e);
                        (Vec::new(), ZoneSource::Nothing)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::geometry::BoundingBox;
    use crate::db::models::ZoneShape;
    use crate::testing::FlakyPersistence;
    use std::sync::atomic::Ordering;

    fn zone(id: &str, channel_id: i32) -> Zone {
        Zone {
            id: id.to_string(),
            label: id.to_string(),
            store_id: "oryudong".to_string(),
            channel_id,
            shape: ZoneShape::Rectangle(BoundingBox::new(100, 100, 200, 200)),
        }
    }

    fn setup(dir: &Path) -> (Arc<FlakyPersistence>, ZoneRepository) {
        let db = Arc::new(FlakyPersistence::new());
        db.inner
            .insert_zones("oryudong", 1, vec![zone("A-01", 1), zone("A-02", 1)]);
        let repo = ZoneRepository::new(
            db.clone(),
            Arc::new(ZoneCache::new(Duration::from_secs(60))),
            dir,
        );
        (db, repo)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_skips_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());

        let (zones, source) = repo.resolve("oryudong", 1).await;
        assert_eq!(source, ZoneSource::Primary);
        assert_eq!(zones.len(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        let (zones, source) = repo.resolve("oryudong", 1).await;
        assert_eq!(source, ZoneSource::FreshCache);
        assert_eq!(zones.len(), 2);
        assert_eq!(db.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());

        repo.get_zones("oryudong", 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        let (_, source) = repo.resolve("oryudong", 1).await;

        assert_eq!(source, ZoneSource::Primary);
        assert_eq!(db.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_cache_served_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());

        repo.get_zones("oryudong", 1).await;
        tokio::time::advance(Duration::from_secs(300)).await;
        db.fail_fetch.store(true, Ordering::SeqCst);

        let (zones, source) = repo.resolve("oryudong", 1).await;
        assert_eq!(source, ZoneSource::StaleCache);
        assert_eq!(zones.len(), 2);
    }

    #[tokio::test]
    async fn snapshot_used_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());

        // First successful fetch writes the snapshot
        repo.get_zones("oryudong", 1).await;
        assert!(snapshot::snapshot_path(dir.path(), "oryudong", 1).exists());

        repo.cache().clear();
        db.fail_fetch.store(true, Ordering::SeqCst);

        let (zones, source) = repo.resolve("oryudong", 1).await;
        assert_eq!(source, ZoneSource::Snapshot);
        assert_eq!(zones, vec![zone("A-01", 1), zone("A-02", 1)]);
    }

    #[tokio::test]
    async fn unwritable_snapshot_dir_does_not_fail_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, b"").unwrap();
        let (db, repo) = setup(&blocked);

        let (zones, source) = repo.resolve("oryudong", 1).await;
        assert_eq!(source, ZoneSource::Primary);
        assert_eq!(zones.len(), 2);

        repo.cache().clear();
        db.fail_fetch.store(true, Ordering::SeqCst);
        let (zones, source) = repo.resolve("oryudong", 1).await;
        assert!(zones.is_empty());
        assert_eq!(source, ZoneSource::Nothing);
    }

    #[tokio::test]
    async fn nothing_available_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());
        db.fail_fetch.store(true, Ordering::SeqCst);

        let (zones, source) = repo.resolve("oryudong", 7).await;
        assert!(zones.is_empty());
        assert_eq!(source, ZoneSource::Nothing);
    }

    #[tokio::test]
    async fn empty_result_does_not_overwrite_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());

        repo.get_zones("oryudong", 1).await;
        db.inner.insert_zones("oryudong", 1, Vec::new());
        repo.cache().clear();

        assert!(repo.get_zones("oryudong", 1).await.is_empty());
        let on_disk = snapshot::load_snapshot(dir.path(), "oryudong", 1)
            .unwrap()
            .unwrap();
        assert_eq!(on_disk.len(), 2);
    }

    #[tokio::test]
    async fn invalidation_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let (db, repo) = setup(dir.path());
        db.inner.insert_zones("oryudong", 2, vec![zone("B-01", 2)]);
        db.inner.insert_store(crate::db::models::Store::new("gangnam"));
        db.inner.insert_zones("gangnam", 1, vec![zone("C-01", 1)]);

        repo.get_zones("oryudong", 1).await;
        repo.get_zones("oryudong", 2).await;
        repo.get_zones("gangnam", 1).await;
        assert_eq!(repo.cache().stats().entries, 3);

        repo.cache().invalidate("oryudong", 2);
        assert_eq!(repo.cache().stats().entries, 2);

        repo.cache().invalidate_store("oryudong");
        let stats = repo.cache().stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.keys[0].store_id, "gangnam");

        repo.cache().clear();
        assert_eq!(repo.cache().stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_report_age_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, repo) = setup(dir.path());

        repo.get_zones("oryudong", 1).await;
        tokio::time::advance(Duration::from_secs(90)).await;

        let stats = repo.cache().stats();
        assert_eq!(stats.ttl_secs, 60);
        assert_eq!(stats.keys[0].zones, 2);
        assert!(stats.keys[0].expired);
        assert!(stats.keys[0].age_secs >= 90.0);
    }
}
