//! RTSP frame source.
//!
//! Pulls frames from an IP camera stream. Decoding is delegated to a
//! GStreamer pipeline behind the `source-rtsp` feature; `stub://` locators
//! always work via the synthetic backend. A stalled or disconnected stream is
//! a mid-stream read error; a clean EOS from the pipeline is ordinary
//! end-of-stream.

use anyhow::Result;

use crate::frame::Frame;
use crate::source::{is_stub_locator, validate_rtsp_url, FrameStream, SyntheticStream};
#[cfg(not(feature = "source-rtsp"))]
use crate::source::source_open_error;

/// Frame stream over an RTSP connection.
pub struct RtspStream {
    backend: RtspBackend,
}

enum RtspBackend {
    Synthetic(SyntheticStream),
    #[cfg(feature = "source-rtsp")]
    Gstreamer(gst::GstRtspStream),
}

impl RtspStream {
    pub fn open(url: &str) -> Result<Self> {
        validate_rtsp_url(url)?;
        if is_stub_locator(url) {
            return Ok(Self {
                backend: RtspBackend::Synthetic(SyntheticStream::open(url)?),
            });
        }
        #[cfg(feature = "source-rtsp")]
        {
            Ok(Self {
                backend: RtspBackend::Gstreamer(gst::GstRtspStream::open(url)?),
            })
        }
        #[cfg(not(feature = "source-rtsp"))]
        {
            Err(source_open_error(format!(
                "opening '{}' requires the source-rtsp feature",
                url
            )))
        }
    }
}

impl FrameStream for RtspStream {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            RtspBackend::Synthetic(stream) => stream.next_frame(),
            #[cfg(feature = "source-rtsp")]
            RtspBackend::Gstreamer(stream) => stream.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            RtspBackend::Synthetic(stream) => stream.close(),
            #[cfg(feature = "source-rtsp")]
            RtspBackend::Gstreamer(stream) => stream.close(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            RtspBackend::Synthetic(stream) => stream.describe(),
            #[cfg(feature = "source-rtsp")]
            RtspBackend::Gstreamer(stream) => stream.describe(),
        }
    }
}

pub(crate) fn open_rtsp(url: &str) -> Result<Box<dyn FrameStream>> {
    Ok(Box::new(RtspStream::open(url)?))
}

#[cfg(feature = "source-rtsp")]
mod gst {
    use std::time::Duration;

    use anyhow::{Context, Result};

    use crate::error::AppError;
    use crate::frame::Frame;

    const PULL_TIMEOUT: Duration = Duration::from_secs(5);

    pub(crate) struct GstRtspStream {
        url: String,
        pipeline: Option<gstreamer::Pipeline>,
        appsink: gstreamer_app::AppSink,
        frame_count: u64,
    }

    impl GstRtspStream {
        /// Build and start the pipeline:
        /// rtspsrc ! decodebin ! videoconvert ! RGB caps ! appsink
        pub(crate) fn open(url: &str) -> Result<Self> {
            gstreamer::init().context("initialize gstreamer")?;

            let pipeline_description = format!(
                "rtspsrc location={} latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
                 appsink name=appsink sync=false max-buffers=1 drop=true",
                url
            );
            let pipeline = gstreamer::parse::launch(&pipeline_description)
                .context("build RTSP pipeline")?
                .downcast::<gstreamer::Pipeline>()
                .map_err(|_| anyhow::anyhow!("RTSP pipeline is not a Pipeline"))?;

            let appsink = pipeline
                .by_name("appsink")
                .context("appsink element missing from pipeline")?
                .downcast::<gstreamer_app::AppSink>()
                .map_err(|_| anyhow::anyhow!("appsink element has unexpected type"))?;

            let caps = gstreamer::Caps::builder("video/x-raw")
                .field("format", "RGB")
                .build();
            appsink.set_caps(Some(&caps));
            appsink.set_max_buffers(1);
            appsink.set_drop(true);
            appsink.set_sync(false);

            pipeline
                .set_state(gstreamer::State::Playing)
                .context("set RTSP pipeline to Playing")?;
            log::info!("source: connected to {} (gstreamer)", url);

            Ok(Self {
                url: url.to_string(),
                pipeline: Some(pipeline),
                appsink,
                frame_count: 0,
            })
        }

        fn drain_bus(&self) -> Result<bool> {
            let Some(pipeline) = self.pipeline.as_ref() else {
                return Ok(true);
            };
            let Some(bus) = pipeline.bus() else {
                return Ok(false);
            };
            while let Some(message) = bus.timed_pop(gstreamer::ClockTime::ZERO) {
                use gstreamer::MessageView;
                match message.view() {
                    MessageView::Error(err) => {
                        return Err(AppError::StreamRead(format!(
                            "gstreamer error from {:?}: {}",
                            err.src().map(|s| s.path_string()),
                            err.error()
                        ))
                        .into());
                    }
                    MessageView::Eos(..) => return Ok(true),
                    _ => {}
                }
            }
            Ok(false)
        }

        pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.pipeline.is_none() {
                return Ok(None);
            }
            if self.drain_bus()? {
                return Ok(None);
            }

            let sample = self
                .appsink
                .try_pull_sample(gstreamer::ClockTime::from_mseconds(
                    PULL_TIMEOUT.as_millis() as u64,
                ))
                .ok_or_else(|| AppError::StreamRead("RTSP stream stalled".to_string()))?;

            let (pixels, width, height) = sample_to_pixels(&sample)?;
            self.frame_count += 1;
            Ok(Some(Frame::new(pixels, width, height)?))
        }

        pub(crate) fn close(&mut self) {
            if let Some(pipeline) = self.pipeline.take() {
                if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                    log::warn!("source: failed to stop RTSP pipeline: {}", e);
                }
            }
            log::debug!(
                "source: released {} after {} frames",
                self.url,
                self.frame_count
            );
        }

        pub(crate) fn describe(&self) -> String {
            format!("{} (gstreamer)", self.url)
        }
    }

    fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
        let buffer = sample.buffer().context("RTSP sample missing buffer")?;
        let caps = sample.caps().context("RTSP sample missing caps")?;
        let info = gstreamer_video::VideoInfo::from_caps(caps)
            .context("parse RTSP caps as video info")?;

        let width = info.width();
        let height = info.height();
        let row_bytes = (width as usize) * 3;
        let stride = info.stride()[0] as usize;

        let map = buffer.map_readable().context("map RTSP buffer")?;
        let data = map.as_slice();

        if stride == row_bytes {
            return Ok((data.to_vec(), width, height));
        }

        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            pixels.extend_from_slice(
                data.get(start..end)
                    .context("RTSP buffer row is out of bounds")?,
            );
        }

        Ok((pixels, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_rtsp_streams_unbounded_frames() {
        let mut stream = RtspStream::open("stub://front_camera").unwrap();
        for _ in 0..5 {
            assert!(stream.next_frame().unwrap().is_some());
        }
        stream.close();
        assert!(stream.next_frame().unwrap().is_none());
    }

    #[test]
    fn non_rtsp_scheme_is_rejected() {
        assert!(RtspStream::open("http://camera.local/stream").is_err());
    }
}
