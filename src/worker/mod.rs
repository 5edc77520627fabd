pub mod channel_worker;
pub mod supervisor;

pub use channel_worker::{ChannelWorker, WorkerConfig, WorkerContext, WorkerReport, WorkerState};
pub use supervisor::{resolve_channels, rtsp_url, WorkerSupervisor};
