use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Decoded RGB frame
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB, three bytes per pixel, no row padding
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 3
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// RTSP lower transport to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// Connection order: interleaved TCP first, then UDP
    pub const FALLBACK_ORDER: [Transport; 2] = [Transport::Tcp, Transport::Udp];
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => f.write_str("tcp"),
            Transport::Udp => f.write_str("udp"),
        }
    }
}

/// Low-level video capture handle.
///
/// Implementations bound every call by their own timeouts and report
/// failures as `false` / `None`.
#[async_trait]
pub trait VideoSource: Send {
    async fn connect(&mut self, timeout: Duration) -> bool;

    async fn read_frame(&mut self) -> Option<Frame>;

    async fn close(&mut self);
}

/// Builds a fresh source for a URL and transport
pub trait VideoSourceFactory: Send + Sync {
    fn create(&self, url: &str, transport: Transport) -> Box<dyn VideoSource>;
}
