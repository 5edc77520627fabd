use log::info;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub uptime_secs: f64,
    pub total_frames: u64,
    pub fps: f64,
    pub avg_detection_ms: f64,
    pub error_count: u64,
    pub warning_count: u64,
    pub error_rate: f64,
}

impl PerformanceStats {
    pub fn uptime_hours(&self) -> f64 {
        self.uptime_secs / 3600.0
    }
}

/// Per-worker throughput and latency counters with a periodic log report
pub struct PerformanceMonitor {
    label: String,
    report_interval: Duration,
    started_at: Instant,
    last_report: Instant,
    frame_count: u64,
    detection_ms_total: f64,
    error_count: u64,
    warning_count: u64,
}

impl PerformanceMonitor {
    pub fn new(label: &str, report_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            label: label.to_string(),
            report_interval,
            started_at: now,
            last_report: now,
            frame_count: 0,
            detection_ms_total: 0.0,
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn record_frame(&mut self, detection_ms: f64) {
        self.frame_count += 1;
        self.detection_ms_total += detection_ms;

        if self.last_report.elapsed() >= self.report_interval {
            self.report();
            self.last_report = Instant::now();
        }
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    pub fn record_warning(&mut self) {
        self.warning_count += 1;
    }

    pub fn stats(&self) -> PerformanceStats {
        let uptime = self.started_at.elapsed().as_secs_f64();
        let per = |n: f64, d: f64| if d > 0.0 { n / d } else { 0.0 };

        PerformanceStats {
            uptime_secs: uptime,
            total_frames: self.frame_count,
            fps: per(self.frame_count as f64, uptime),
            avg_detection_ms: per(self.detection_ms_total, self.frame_count as f64),
            error_count: self.error_count,
            warning_count: self.warning_count,
            error_rate: per(self.error_count as f64, self.frame_count as f64),
        }
    }

    pub fn report(&self) {
        let s = self.stats();
        if s.uptime_secs == 0.0 {
            return;
        }
        info!(
            "{} Performance report: uptime={:.2}h frames={} fps={:.2} avg_detection={:.2}ms errors={} warnings={} error_rate={:.4}",
            self.label,
            s.uptime_hours(),
            s.total_frames,
            s.fps,
            s.avg_detection_ms,
            s.error_count,
            s.warning_count,
            s.error_rate
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn computes_rates() {
        let mut monitor = PerformanceMonitor::new("[test/ch 1]", Duration::from_secs(60));
        monitor.record_frame(100.0);
        monitor.record_frame(50.0);
        monitor.record_error();
        monitor.record_warning();

        tokio::time::advance(Duration::from_secs(10)).await;
        let stats = monitor.stats();

        assert_eq!(stats.total_frames, 2);
        assert!((stats.fps - 0.2).abs() < 1e-6);
        assert!((stats.avg_detection_ms - 75.0).abs() < 1e-9);
        assert!((stats.error_rate - 0.5).abs() < 1e-9);
        assert_eq!(stats.warning_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_monitor_has_zero_rates() {
        let monitor = PerformanceMonitor::new("[test/ch 1]", Duration::from_secs(60));
        let stats = monitor.stats();
        assert_eq!(stats.fps, 0.0);
        assert_eq!(stats.avg_detection_ms, 0.0);
        assert_eq!(stats.error_rate, 0.0);
    }
}
