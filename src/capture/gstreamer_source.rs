use crate::capture::source::{Frame, Transport, VideoSource, VideoSourceFactory};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_rtsp::RTSPLowerTrans;
use log::{debug, warn};
use std::time::Duration;

/// Builds GStreamer-backed RTSP sources
pub struct GstreamerSourceFactory {
    read_timeout: Duration,
}

impl GstreamerSourceFactory {
    pub fn new(read_timeout: Duration) -> Result<Self> {
        gst::init().map_err(|e| Error::Capture(format!("Failed to initialize GStreamer: {}", e)))?;
        Ok(Self { read_timeout })
    }
}

impl VideoSourceFactory for GstreamerSourceFactory {
    fn create(&self, url: &str, transport: Transport) -> Box<dyn VideoSource> {
        Box::new(GstreamerSource::new(url, transport, self.read_timeout))
    }
}

struct Pipeline {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
}

/// `rtspsrc ! decodebin ! videoconvert ! appsink` producing packed RGB frames
pub struct GstreamerSource {
    url: String,
    transport: Transport,
    read_timeout: Duration,
    pipeline: Option<Pipeline>,
}

impl GstreamerSource {
    pub fn new(url: &str, transport: Transport, read_timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            transport,
            read_timeout,
            pipeline: None,
        }
    }

    fn build_pipeline(&self, timeout: Duration) -> Result<Pipeline> {
        let pipeline = gst::Pipeline::new();

        let protocols = match self.transport {
            Transport::Tcp => RTSPLowerTrans::TCP,
            Transport::Udp => RTSPLowerTrans::UDP,
        };

        let rtspsrc = gst::ElementFactory::make("rtspsrc")
            .property("location", &self.url)
            .property("latency", 0u32)
            .property("protocols", protocols)
            .property("tcp-timeout", timeout.as_micros() as u64)
            .property("timeout", timeout.as_micros() as u64)
            .build()?;
        let decodebin = gst::ElementFactory::make("decodebin").build()?;
        let videoconvert = gst::ElementFactory::make("videoconvert").build()?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        let appsink = gst_app::AppSink::builder()
            .caps(&caps)
            .max_buffers(1)
            .drop(true)
            .sync(false)
            .build();

        pipeline.add_many([&rtspsrc, &decodebin, &videoconvert, appsink.upcast_ref()])?;
        videoconvert.link(&appsink)?;

        // rtspsrc exposes one pad per RTP stream once SDP negotiation is done
        let decodebin_weak = decodebin.downgrade();
        rtspsrc.connect_pad_added(move |_, src_pad| {
            let Some(decodebin) = decodebin_weak.upgrade() else {
                return;
            };
            let is_video = src_pad
                .current_caps()
                .and_then(|caps| {
                    caps.structure(0)
                        .and_then(|s| s.get::<String>("media").ok())
                })
                .map(|media| media == "video")
                .unwrap_or(false);
            if !is_video {
                return;
            }
            let Some(sink_pad) = decodebin.static_pad("sink") else {
                return;
            };
            if sink_pad.is_linked() {
                return;
            }
            if let Err(e) = src_pad.link(&sink_pad) {
                warn!("Failed to link rtspsrc to decodebin: {:?}", e);
            }
        });

        let convert_weak = videoconvert.downgrade();
        decodebin.connect_pad_added(move |_, src_pad| {
            let Some(convert) = convert_weak.upgrade() else {
                return;
            };
            let is_raw_video = src_pad
                .current_caps()
                .and_then(|caps| {
                    caps.structure(0)
                        .map(|s| s.name().as_str().starts_with("video/x-raw"))
                })
                .unwrap_or(false);
            if !is_raw_video {
                return;
            }
            let Some(sink_pad) = convert.static_pad("sink") else {
                return;
            };
            if sink_pad.is_linked() {
                return;
            }
            if let Err(e) = src_pad.link(&sink_pad) {
                warn!("Failed to link decodebin to videoconvert: {:?}", e);
            }
        });

        Ok(Pipeline { pipeline, appsink })
    }

    /// Drain pending bus messages, returning the first fatal one
    fn poll_bus(pipeline: &gst::Pipeline) -> Option<String> {
        let bus = pipeline.bus()?;
        while let Some(message) = bus.pop() {
            use gst::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Some(format!(
                        "error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => return Some("end of stream".to_string()),
                _ => {}
            }
        }
        None
    }

    fn teardown(&mut self) {
        if let Some(p) = self.pipeline.take() {
            if let Err(e) = p.pipeline.set_state(gst::State::Null) {
                debug!("Failed to stop pipeline for {}: {:?}", self.url, e);
            }
        }
    }
}

#[async_trait]
impl VideoSource for GstreamerSource {
    async fn connect(&mut self, timeout: Duration) -> bool {
        self.teardown();

        let built = match self.build_pipeline(timeout) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to build RTSP pipeline ({}): {}", self.transport, e);
                return false;
            }
        };

        if let Err(e) = built.pipeline.set_state(gst::State::Playing) {
            warn!("Failed to start RTSP pipeline ({}): {:?}", self.transport, e);
            let _ = built.pipeline.set_state(gst::State::Null);
            return false;
        }

        let pipeline = built.pipeline.clone();
        let waited = tokio::task::spawn_blocking(move || {
            let (result, current, _) =
                pipeline.state(gst::ClockTime::from_mseconds(timeout.as_millis() as u64));
            result.is_ok() && current == gst::State::Playing
        })
        .await
        .unwrap_or(false);

        if let Some(err) = Self::poll_bus(&built.pipeline) {
            warn!("RTSP pipeline failed ({}): {}", self.transport, err);
            let _ = built.pipeline.set_state(gst::State::Null);
            return false;
        }

        if !waited {
            warn!(
                "RTSP pipeline did not reach PLAYING within {:?} ({})",
                timeout, self.transport
            );
            let _ = built.pipeline.set_state(gst::State::Null);
            return false;
        }

        self.pipeline = Some(built);
        true
    }

    async fn read_frame(&mut self) -> Option<Frame> {
        let p = self.pipeline.as_ref()?;

        if let Some(err) = Self::poll_bus(&p.pipeline) {
            warn!("RTSP stream error: {}", err);
            return None;
        }

        let appsink = p.appsink.clone();
        let timeout = gst::ClockTime::from_mseconds(self.read_timeout.as_millis() as u64);
        let sample = tokio::task::spawn_blocking(move || appsink.try_pull_sample(timeout))
            .await
            .ok()
            .flatten()?;

        match sample_to_frame(&sample) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Dropping undecodable sample: {}", e);
                None
            }
        }
    }

    async fn close(&mut self) {
        self.teardown();
    }
}

impl Drop for GstreamerSource {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Copy an RGB sample into a tightly packed frame, removing row padding
fn sample_to_frame(sample: &gst::Sample) -> Result<Frame> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| Error::Capture("Sample missing buffer".to_string()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| Error::Capture("Sample missing caps".to_string()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| Error::Capture(format!("Failed to parse caps as video info: {}", e)))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = width as usize * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer
        .map_readable()
        .map_err(|e| Error::Capture(format!("Failed to map buffer: {}", e)))?;
    let data = map.as_slice();

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .ok_or_else(|| Error::Capture("Buffer shorter than frame".to_string()))?;
        return Ok(Frame::new(pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| Error::Capture("Buffer row out of bounds".to_string()))?;
        pixels.extend_from_slice(line);
    }

    Ok(Frame::new(pixels, width, height))
}
