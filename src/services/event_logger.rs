use crate::db::models::{DetectionEvent, EventType};
use crate::db::persistence::Persistence;
use log::{debug, error};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventLoggerStats {
    pub total_logged: u64,
    pub batch_inserts: u64,
    pub errors: u64,
    pub pending_batch: usize,
}

/// Writes detection events for one channel.
///
/// Frame telemetry is queued and written in bulk when the queue reaches
/// `batch_size` or `flush_interval` has passed since the last flush. A failed
/// bulk write drops the batch. Status changes are written one by one as they
/// happen and are never retried.
pub struct EventLogger {
    persistence: Arc<dyn Persistence>,
    store_id: String,
    channel_id: i32,
    batch_size: usize,
    flush_interval: Duration,
    frame_logging: bool,
    batch: Vec<DetectionEvent>,
    last_flush: Instant,
    stats: EventLoggerStats,
}

impl EventLogger {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        store_id: &str,
        channel_id: i32,
        batch_size: usize,
        flush_interval: Duration,
    ) -> Self {
        Self {
            persistence,
            store_id: store_id.to_string(),
            channel_id,
            batch_size: batch_size.max(1),
            flush_interval,
            frame_logging: true,
            batch: Vec::with_capacity(batch_size),
            last_flush: Instant::now(),
            stats: EventLoggerStats::default(),
        }
    }

    /// Disable or enable per-frame telemetry
    pub fn with_frame_logging(mut self, enabled: bool) -> Self {
        self.frame_logging = enabled;
        self
    }

    /// Blank event for this logger's store and channel
    pub fn event(&self, seat_id: &str, event_type: EventType) -> DetectionEvent {
        DetectionEvent::new(&self.store_id, seat_id, self.channel_id, event_type)
    }

    /// Route an event: status changes are written now, telemetry is batched
    pub async fn log(&mut self, event: DetectionEvent) {
        if event.is_status_change() {
            self.log_status_change(event).await;
        } else {
            self.log_frame(event).await;
        }
    }

    /// Queue a telemetry event, flushing when the batch is due
    pub async fn log_frame(&mut self, event: DetectionEvent) {
        if !self.frame_logging {
            return;
        }

        self.batch.push(event);

        if self.batch.len() >= self.batch_size || self.last_flush.elapsed() >= self.flush_interval
        {
            self.flush().await;
        }
    }

    /// Write a status-change event immediately
    pub async fn log_status_change(&mut self, event: DetectionEvent) {
        match self.persistence.append_event(&event).await {
            Ok(()) => {
                self.stats.total_logged += 1;
                debug!(
                    "Logged {} for seat {} ({:?} -> {:?})",
                    event.event_type, event.seat_id, event.previous_status, event.new_status
                );
            }
            Err(e) => {
                self.stats.errors += 1;
                error!(
                    "Failed to log {} for seat {}: {}",
                    event.event_type, event.seat_id, e
                );
            }
        }
    }

    /// Write out the pending batch
    pub async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.batch);
        match self.persistence.append_events_batch(&batch).await {
            Ok(()) => {
                self.stats.total_logged += batch.len() as u64;
                self.stats.batch_inserts += 1;
                debug!("Flushed {} telemetry events", batch.len());
            }
            Err(e) => {
                self.stats.errors += 1;
                error!("Dropping {} telemetry events: {}", batch.len(), e);
            }
        }
        self.last_flush = Instant::now();
    }

    pub async fn close(&mut self) {
        self.flush().await;
    }

    pub fn stats(&self) -> EventLoggerStats {
        EventLoggerStats {
            pending_batch: self.batch.len(),
            ..self.stats
        }
    }
}
