pub mod event_logger;
pub mod performance;

pub use event_logger::{EventLogger, EventLoggerStats};
pub use performance::{PerformanceMonitor, PerformanceStats};
