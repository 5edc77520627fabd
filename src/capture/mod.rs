pub mod connector;
pub mod gstreamer_source;
pub mod source;

pub use connector::StreamConnector;
pub use gstreamer_source::GstreamerSourceFactory;
pub use source::{Frame, Transport, VideoSource, VideoSourceFactory};
