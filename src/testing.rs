//! Fakes shared by unit tests.

use crate::analytics::detection::{BelongingsSensor, Detection, Detector};
use crate::capture::{Frame, Transport, VideoSource, VideoSourceFactory};
use crate::db::memory::MemoryPersistence;
use crate::db::models::{DetectionEvent, OccupancyRecord, Store, SystemLogEntry, Zone};
use crate::db::persistence::Persistence;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn test_frame() -> Frame {
    Frame::new(vec![0; 8 * 6 * 3], 8, 6)
}

/// Behaviour of one scripted source
#[derive(Clone)]
pub struct SourceScript {
    opens: bool,
    frames: usize,
    frame: Frame,
}

impl SourceScript {
    /// Opens and yields `frames` frames, then reads fail
    pub fn working(frame: Frame, frames: usize) -> Self {
        Self {
            opens: true,
            frames,
            frame,
        }
    }

    pub fn endless() -> Self {
        Self::working(test_frame(), usize::MAX)
    }

    pub fn refusing() -> Self {
        Self {
            opens: false,
            frames: 0,
            frame: test_frame(),
        }
    }
}

struct ScriptedSource {
    script: SourceScript,
    connected: bool,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoSource for ScriptedSource {
    async fn connect(&mut self, _timeout: Duration) -> bool {
        self.connected = self.script.opens;
        self.connected
    }

    async fn read_frame(&mut self) -> Option<Frame> {
        if !self.connected || self.script.frames == 0 {
            return None;
        }
        self.script.frames -= 1;
        Some(self.script.frame.clone())
    }

    async fn close(&mut self) {
        self.connected = false;
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out sources in script order, then copies of `fallback`
pub struct ScriptedFactory {
    scripts: Mutex<VecDeque<SourceScript>>,
    fallback: SourceScript,
    created: Mutex<Vec<Transport>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    /// Refusing sources once the scripts run out
    pub fn new(scripts: Vec<SourceScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback: SourceScript::refusing(),
            created: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every source behaves like `script`
    pub fn always(script: SourceScript) -> Self {
        Self {
            fallback: script,
            ..Self::new(Vec::new())
        }
    }

    pub fn created(&self) -> Vec<Transport> {
        self.created.lock().unwrap().clone()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl VideoSourceFactory for ScriptedFactory {
    fn create(&self, _url: &str, transport: Transport) -> Box<dyn VideoSource> {
        self.created.lock().unwrap().push(transport);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Box::new(ScriptedSource {
            script,
            connected: false,
            closed: self.closed.clone(),
        })
    }
}

/// Replays queued responses, then repeats `fallback`
pub struct ScriptedDetector {
    responses: Mutex<VecDeque<std::result::Result<Vec<Detection>, String>>>,
    fallback: Vec<Detection>,
    pub calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn always(detections: Vec<Detection>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: detections,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then(self, response: std::result::Result<Vec<Detection>, &str>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(response.map_err(|e| e.to_string()));
        self
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn infer(&self, _frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(d)) => Ok(d),
            Some(Err(e)) => Err(Error::Inference(e).into()),
            None => Ok(self.fallback.clone()),
        }
    }

    fn model_version(&self) -> &str {
        "test-model"
    }
}

/// Never returns
pub struct HangingDetector;

#[async_trait]
impl Detector for HangingDetector {
    async fn infer(&self, _frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>> {
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        Ok(Vec::new())
    }

    fn model_version(&self) -> &str {
        "hang"
    }
}

/// Reports the same zones as holding belongings every cycle
pub struct FixedBelongings(pub HashSet<String>);

#[async_trait]
impl BelongingsSensor for FixedBelongings {
    async fn zones_with_objects(&self, _frame: &Frame, _zones: &[Zone]) -> Result<HashSet<String>> {
        Ok(self.0.clone())
    }
}

/// In-memory persistence with switchable failures and call counters
#[derive(Default)]
pub struct FlakyPersistence {
    pub inner: MemoryPersistence,
    pub fail_fetch: AtomicBool,
    pub fail_records: AtomicBool,
    pub fail_events: AtomicBool,
    pub fail_zones: Mutex<HashSet<String>>,
    pub fetch_calls: AtomicUsize,
    pub put_calls: AtomicUsize,
    pub event_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl FlakyPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_put_for(&self, zone_id: &str) {
        self.fail_zones.lock().unwrap().insert(zone_id.to_string());
    }
}

fn injected(what: &str) -> anyhow::Error {
    Error::Database(format!("injected {} failure", what)).into()
}

#[async_trait]
impl Persistence for FlakyPersistence {
    async fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        self.inner.get_store(store_id).await
    }

    async fn fetch_zones(&self, store_id: &str, channel_id: i32) -> Result<Vec<Zone>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(injected("fetch"));
        }
        self.inner.fetch_zones(store_id, channel_id).await
    }

    async fn get_record(&self, store_id: &str, zone_id: &str) -> Result<Option<OccupancyRecord>> {
        self.inner.get_record(store_id, zone_id).await
    }

    async fn put_record(
        &self,
        store_id: &str,
        zone_id: &str,
        record: &OccupancyRecord,
    ) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_records.load(Ordering::SeqCst)
            || self.fail_zones.lock().unwrap().contains(zone_id)
        {
            return Err(injected("put_record"));
        }
        self.inner.put_record(store_id, zone_id, record).await
    }

    async fn append_event(&self, event: &DetectionEvent) -> Result<()> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(injected("append_event"));
        }
        self.inner.append_event(event).await
    }

    async fn append_events_batch(&self, events: &[DetectionEvent]) -> Result<()> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(injected("append_events_batch"));
        }
        self.inner.append_events_batch(events).await
    }

    async fn log_system_event(&self, entry: &SystemLogEntry) -> Result<()> {
        self.inner.log_system_event(entry).await
    }
}
