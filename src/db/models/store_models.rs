use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store (site) with its camera gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Store {
    pub store_id: String,
    pub store_name: Option<String>,
    pub rtsp_host: Option<String>,
    pub rtsp_port: Option<i32>,
    pub total_channels: Option<i32>,
    /// Explicit channel list; overrides `total_channels` when set
    pub active_channels: Option<Vec<i32>>,
    pub is_active: bool,
}

impl Store {
    pub fn new(store_id: &str) -> Self {
        Self {
            store_id: store_id.to_string(),
            store_name: None,
            rtsp_host: None,
            rtsp_port: None,
            total_channels: None,
            active_channels: None,
            is_active: true,
        }
    }
}

/// Severity stored in `system_logs.log_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Row for `system_logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLogEntry {
    pub store_id: Option<String>,
    pub log_level: String,
    pub component: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl SystemLogEntry {
    pub fn new(store_id: &str, level: LogLevel, component: &str, message: &str) -> Self {
        Self {
            store_id: Some(store_id.to_string()),
            log_level: level.as_str().to_string(),
            component: component.to_string(),
            message: message.to_string(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn info(store_id: &str, component: &str, message: &str) -> Self {
        Self::new(store_id, LogLevel::Info, component, message)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
