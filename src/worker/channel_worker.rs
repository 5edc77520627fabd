use crate::analytics::detection::{BelongingsSensor, Detector};
use crate::analytics::occupancy::OccupancyStateMachine;
use crate::analytics::zone_matcher::{match_zones, MatchResult};
use crate::capture::{Frame, StreamConnector, VideoSourceFactory};
use crate::config::Config;
use crate::db::models::{EventType, LogLevel, OccupancyStatus, SystemLogEntry, Zone};
use crate::db::persistence::Persistence;
use crate::services::{EventLogger, EventLoggerStats, PerformanceMonitor, PerformanceStats};
use crate::zones::ZoneRepository;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const PROGRESS_EVERY: u64 = 20;
const PERF_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Lifecycle of one channel worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Uninitialized,
    Initializing,
    Running,
    Reconnecting,
    Stopped,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::Initializing => "initializing",
            WorkerState::Running => "running",
            WorkerState::Reconnecting => "reconnecting",
            WorkerState::Stopped => "stopped",
            WorkerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tunables for one worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store_id: String,
    pub channel_id: i32,
    pub rtsp_url: String,
    pub polling_interval: Duration,
    pub confidence_threshold: f32,
    pub iou_threshold: f64,
    pub abandoned_threshold: Duration,
    pub connect_timeout: Duration,
    pub max_capture_errors: u32,
    pub capture_retry_delay: Duration,
    pub reconnect_delay: Duration,
    pub reconnect_attempts: u32,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub frame_logging: bool,
}

impl WorkerConfig {
    pub fn from_config(config: &Config, channel_id: i32, rtsp_url: String) -> Self {
        Self {
            store_id: config.store.id.clone(),
            channel_id,
            rtsp_url,
            polling_interval: config.polling_interval(),
            confidence_threshold: config.detection.confidence_threshold,
            iou_threshold: config.detection.iou_threshold as f64,
            abandoned_threshold: Duration::from_secs(config.detection.abandoned_threshold_secs),
            connect_timeout: Duration::from_secs(config.stream.connect_timeout_secs),
            max_capture_errors: config.stream.max_capture_errors.max(1),
            capture_retry_delay: Duration::from_millis(config.stream.capture_retry_delay_ms),
            reconnect_delay: Duration::from_secs(config.stream.reconnect_delay_secs),
            reconnect_attempts: config.stream.reconnect_attempts,
            batch_size: config.event_log.batch_size,
            flush_interval: Duration::from_secs(config.event_log.flush_interval_secs),
            frame_logging: config.event_log.frame_logging,
        }
    }
}

/// Collaborators shared by all workers of a process
#[derive(Clone)]
pub struct WorkerContext {
    pub persistence: Arc<dyn Persistence>,
    pub zones: Arc<ZoneRepository>,
    pub detector: Arc<dyn Detector>,
    pub sources: Arc<dyn VideoSourceFactory>,
    pub belongings: Option<Arc<dyn BelongingsSensor>>,
}

/// Summary returned when a worker exits
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub store_id: String,
    pub channel_id: i32,
    pub state: WorkerState,
    pub frames_processed: u64,
    pub performance: PerformanceStats,
    pub events: EventLoggerStats,
}

enum Reconnect {
    Connected,
    Exhausted,
    Cancelled,
}

/// Sleep unless cancelled first; true when cancelled
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Per-run mutable state
struct Session {
    zones: Vec<Zone>,
    machine: OccupancyStateMachine,
    logger: EventLogger,
    perf: PerformanceMonitor,
    connector: StreamConnector,
    frames: u64,
}

/// Polling loop for one camera channel
pub struct ChannelWorker {
    config: WorkerConfig,
    ctx: WorkerContext,
    state: watch::Sender<WorkerState>,
    label: String,
}

impl ChannelWorker {
    pub fn new(config: WorkerConfig, ctx: WorkerContext) -> Self {
        let (state, _) = watch::channel(WorkerState::Uninitialized);
        let label = format!("[{}/ch {}]", config.store_id, config.channel_id);
        Self {
            config,
            ctx,
            state,
            label,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn channel_id(&self) -> i32 {
        self.config.channel_id
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
        debug!("{} state -> {}", self.label, state);
    }

    /// Run until cancelled or failed. Cancellation is honoured between cycles.
    pub async fn run(self, cancel: CancellationToken) -> WorkerReport {
        self.set_state(WorkerState::Initializing);

        let Some(mut session) = self.initialize().await else {
            self.set_state(WorkerState::Failed);
            return WorkerReport {
                store_id: self.config.store_id.clone(),
                channel_id: self.config.channel_id,
                state: WorkerState::Failed,
                frames_processed: 0,
                performance: PerformanceMonitor::new(&self.label, PERF_REPORT_INTERVAL).stats(),
                events: EventLoggerStats::default(),
            };
        };

        info!("{} Connecting to stream", self.label);
        let mut final_state = WorkerState::Stopped;

        if !session.connector.connect(self.config.connect_timeout).await {
            error!("{} Initial stream connection failed", self.label);
            self.log_system(
                LogLevel::Error,
                "Initial stream connection failed",
                json!({ "channel_id": self.config.channel_id }),
            )
            .await;
            self.set_state(WorkerState::Reconnecting);
            match self.reconnect(&mut session, &cancel).await {
                Reconnect::Connected => {}
                Reconnect::Exhausted => final_state = WorkerState::Failed,
                Reconnect::Cancelled => {}
            }
        }

        if !session.connector.is_connected() {
            return self.finish(session, final_state).await;
        }

        self.set_state(WorkerState::Running);
        info!(
            "{} Monitoring {} zones every {:?}",
            self.label,
            session.zones.len(),
            self.config.polling_interval
        );

        let mut consecutive_errors: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let Some(frame) = session.connector.capture_frame().await else {
                consecutive_errors += 1;
                session.perf.record_error();
                warn!(
                    "{} Frame capture failed ({}/{})",
                    self.label, consecutive_errors, self.config.max_capture_errors
                );

                if consecutive_errors >= self.config.max_capture_errors {
                    error!("{} Too many capture errors, reconnecting", self.label);
                    self.log_system(
                        LogLevel::Warning,
                        "Too many capture errors, reconnecting",
                        json!({
                            "channel_id": self.config.channel_id,
                            "consecutive_errors": consecutive_errors,
                        }),
                    )
                    .await;
                    session.connector.disconnect().await;
                    self.set_state(WorkerState::Reconnecting);

                    match self.reconnect(&mut session, &cancel).await {
                        Reconnect::Connected => {
                            consecutive_errors = 0;
                            self.set_state(WorkerState::Running);
                            continue;
                        }
                        Reconnect::Cancelled => break,
                        Reconnect::Exhausted => {
                            final_state = WorkerState::Failed;
                            break;
                        }
                    }
                }

                if pause(&cancel, self.config.capture_retry_delay).await {
                    break;
                }
                continue;
            };

            consecutive_errors = 0;
            self.process_frame(&mut session, &frame).await;

            if pause(&cancel, self.config.polling_interval).await {
                break;
            }
        }

        self.finish(session, final_state).await
    }

    /// Load zones and seed prior state; `None` when no zones resolve
    async fn initialize(&self) -> Option<Session> {
        let store_id = &self.config.store_id;
        let channel_id = self.config.channel_id;

        let zones = self.ctx.zones.get_zones(store_id, channel_id).await;
        if zones.is_empty() {
            error!("{} No zones configured, worker not started", self.label);
            self.log_system(
                LogLevel::Error,
                "No zones configured, worker not started",
                json!({ "channel_id": channel_id }),
            )
            .await;
            return None;
        }

        let mut machine = OccupancyStateMachine::new(
            self.config.polling_interval,
            self.config.abandoned_threshold,
        );
        for zone in &zones {
            let prior = match self.ctx.persistence.get_record(store_id, &zone.id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        "{} Could not load state for zone {}, starting empty: {}",
                        self.label, zone.id, e
                    );
                    None
                }
            };
            machine.seed(&zone.id, prior);
        }

        info!(
            "{} Initialized with zones: {}",
            self.label,
            zones
                .iter()
                .map(|z| z.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let logger = EventLogger::new(
            self.ctx.persistence.clone(),
            store_id,
            channel_id,
            self.config.batch_size,
            self.config.flush_interval,
        )
        .with_frame_logging(self.config.frame_logging);

        Some(Session {
            zones,
            machine,
            logger,
            perf: PerformanceMonitor::new(&self.label, PERF_REPORT_INTERVAL),
            connector: StreamConnector::new(&self.config.rtsp_url, self.ctx.sources.clone()),
            frames: 0,
        })
    }

    async fn reconnect(&self, session: &mut Session, cancel: &CancellationToken) -> Reconnect {
        for attempt in 1..=self.config.reconnect_attempts {
            if pause(cancel, self.config.reconnect_delay).await {
                return Reconnect::Cancelled;
            }
            info!(
                "{} Reconnect attempt {}/{}",
                self.label, attempt, self.config.reconnect_attempts
            );
            if session.connector.connect(self.config.connect_timeout).await {
                info!("{} Reconnected", self.label);
                return Reconnect::Connected;
            }
        }
        error!(
            "{} Giving up after {} reconnect attempts",
            self.label, self.config.reconnect_attempts
        );
        self.log_system(
            LogLevel::Error,
            "Reconnect attempts exhausted",
            json!({
                "channel_id": self.config.channel_id,
                "attempts": self.config.reconnect_attempts,
            }),
        )
        .await;
        Reconnect::Exhausted
    }

    async fn process_frame(&self, session: &mut Session, frame: &Frame) {
        let started = Instant::now();

        let detections = match self
            .ctx
            .detector
            .infer(frame, self.config.confidence_threshold)
            .await
        {
            Ok(d) => d,
            Err(e) => {
                warn!("{} Detection failed, skipping frame: {}", self.label, e);
                session.perf.record_error();
                return;
            }
        };

        let matches = match_zones(&session.zones, &detections, self.config.iou_threshold);
        let processing_ms = started.elapsed().as_millis() as i32;
        session.perf.record_frame(processing_ms as f64);

        let objects = match &self.ctx.belongings {
            Some(sensor) => sensor
                .zones_with_objects(frame, &session.zones)
                .await
                .unwrap_or_else(|e| {
                    warn!("{} Belongings check failed: {}", self.label, e);
                    HashSet::new()
                }),
            None => HashSet::new(),
        };

        let now = Utc::now();
        let model_version = self.ctx.detector.model_version().to_string();
        let mut occupied = 0usize;

        for zone in &session.zones {
            let Some(matched) = matches.get(&zone.id) else {
                continue;
            };
            let object_detected = objects.contains(&zone.id);

            let mut telemetry = session.logger.event(&zone.id, EventType::DetectionFrame);
            fill_detection(&mut telemetry, matched, object_detected);
            telemetry.processing_time_ms = Some(processing_ms);
            telemetry.model_version = Some(model_version.clone());
            session.logger.log(telemetry).await;

            let transition = session
                .machine
                .observe(&zone.id, matched, object_detected, now);
            if transition.record.status == OccupancyStatus::Occupied {
                occupied += 1;
            }

            if let Err(e) = self
                .ctx
                .persistence
                .put_record(&self.config.store_id, &zone.id, &transition.record)
                .await
            {
                warn!("{} Failed to update zone {}: {}", self.label, zone.id, e);
                session.perf.record_warning();
                self.log_system(
                    LogLevel::Warning,
                    "Failed to update seat status",
                    json!({
                        "channel_id": self.config.channel_id,
                        "seat_id": zone.id,
                        "error": e.to_string(),
                    }),
                )
                .await;
            }

            if let Some(event_type) = transition.event {
                let mut event = session.logger.event(&zone.id, event_type);
                fill_detection(&mut event, matched, object_detected);
                event.previous_status = Some(transition.previous);
                event.new_status = Some(transition.record.status);
                event.model_version = Some(model_version.clone());
                event.metadata = Some(json!({
                    "detections_count": detections.len(),
                    "iou": matched.score,
                }));
                session.logger.log(event).await;

                info!(
                    "{} Zone {} {} -> {} ({}, score {:.3})",
                    self.label,
                    zone.id,
                    transition.previous,
                    transition.record.status,
                    event_type,
                    matched.score
                );
            }
        }

        session.frames += 1;
        if session.frames % PROGRESS_EVERY == 0 {
            let total = session.zones.len();
            debug!(
                "{} Processed {} frames, {} people, occupancy {}/{} ({:.1}%)",
                self.label,
                session.frames,
                detections.len(),
                occupied,
                total,
                occupied as f64 * 100.0 / total.max(1) as f64
            );
        }
    }

    /// Best-effort `system_logs` row for this channel
    async fn log_system(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        let entry = SystemLogEntry::new(&self.config.store_id, level, "worker", message)
            .with_metadata(metadata);
        if let Err(e) = self.ctx.persistence.log_system_event(&entry).await {
            warn!("{} Failed to write system log: {}", self.label, e);
        }
    }

    async fn finish(&self, mut session: Session, state: WorkerState) -> WorkerReport {
        session.logger.close().await;
        session.connector.disconnect().await;
        session.perf.report();

        let performance = session.perf.stats();
        let (level, message) = if state == WorkerState::Failed {
            (LogLevel::Error, "Worker failed")
        } else {
            (LogLevel::Info, "Worker stopped")
        };
        self.log_system(
            level,
            message,
            json!({
                "channel_id": self.config.channel_id,
                "frame_count": session.frames,
                "uptime_hours": (performance.uptime_hours() * 100.0).round() / 100.0,
                "avg_fps": (performance.fps * 100.0).round() / 100.0,
                "error_count": performance.error_count,
            }),
        )
        .await;

        self.set_state(state);
        info!("{} Worker {} after {} frames", self.label, state, session.frames);

        WorkerReport {
            store_id: self.config.store_id.clone(),
            channel_id: self.config.channel_id,
            state,
            frames_processed: session.frames,
            performance,
            events: session.logger.stats(),
        }
    }
}

fn fill_detection(
    event: &mut crate::db::models::DetectionEvent,
    matched: &MatchResult,
    object_detected: bool,
) {
    let person = matched.is_occupied();
    event.person_detected = person;
    event.person_count = i32::from(matched.matched_detection.is_some());
    event.object_detected = object_detected;
    event.confidence = person.then_some(matched.score as f32);
    event.bbox = matched.matched_detection.map(|d| d.bbox);
}
