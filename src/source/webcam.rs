//! Webcam frame source.
//!
//! Captures frames from a local V4L2 device selected by index. Capture is
//! delegated to libv4l behind the `source-webcam-v4l2` feature; without it,
//! opening a webcam reports an unsupported-source error (the session simply
//! does not start).

use anyhow::Result;

#[cfg(not(feature = "source-webcam-v4l2"))]
use crate::source::source_open_error;
use crate::source::{validate_webcam_device, FrameStream};

pub(crate) fn open_webcam(device: u32) -> Result<Box<dyn FrameStream>> {
    validate_webcam_device(device)?;
    #[cfg(feature = "source-webcam-v4l2")]
    {
        Ok(Box::new(v4l2::V4l2Stream::open(device)?))
    }
    #[cfg(not(feature = "source-webcam-v4l2"))]
    {
        Err(source_open_error(format!(
            "webcam capture on /dev/video{} requires the source-webcam-v4l2 feature",
            device
        )))
    }
}

#[cfg(feature = "source-webcam-v4l2")]
mod v4l2 {
    use anyhow::{Context, Result};
    use ouroboros::self_referencing;
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;

    use crate::error::AppError;
    use crate::frame::{Frame, RGB_BYTES_PER_PIXEL};
    use crate::source::{source_open_error, FrameStream};

    #[self_referencing]
    struct CaptureState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    /// Open webcam capture handle.
    pub(crate) struct V4l2Stream {
        device_index: u32,
        width: u32,
        height: u32,
        state: Option<CaptureState>,
        frame_count: u64,
    }

    impl V4l2Stream {
        pub(crate) fn open(device_index: u32) -> Result<Self> {
            let mut device = v4l::Device::new(device_index as usize).map_err(|e| {
                source_open_error(format!("open /dev/video{}: {}", device_index, e))
            })?;

            let mut format = device.format().context("read v4l2 format")?;
            format.fourcc = v4l::FourCC::new(b"RGB3");
            let format = device
                .set_format(&format)
                .context("request RGB capture format")?;
            if &format.fourcc.repr != b"RGB3" {
                return Err(source_open_error(format!(
                    "/dev/video{} cannot capture packed RGB (got {})",
                    device_index, format.fourcc
                )));
            }

            let state = CaptureStateTryBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|e| anyhow::Error::new(e).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;

            log::info!(
                "source: connected to /dev/video{} ({}x{})",
                device_index,
                format.width,
                format.height
            );
            Ok(Self {
                device_index,
                width: format.width,
                height: format.height,
                state: Some(state),
                frame_count: 0,
            })
        }
    }

    impl FrameStream for V4l2Stream {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let Some(state) = self.state.as_mut() else {
                return Ok(None);
            };
            let expected = (self.width as usize) * (self.height as usize) * RGB_BYTES_PER_PIXEL;
            let pixels = state
                .with_stream_mut(|stream| -> Result<Vec<u8>> {
                    let (buf, _meta) = stream.next().map_err(|e| {
                        anyhow::Error::new(AppError::StreamRead(format!(
                            "capture from webcam failed: {}",
                            e
                        )))
                    })?;
                    Ok(buf[..buf.len().min(expected)].to_vec())
                })?;
            if pixels.len() != expected {
                return Err(AppError::StreamRead(format!(
                    "webcam produced {} bytes, expected {}",
                    pixels.len(),
                    expected
                ))
                .into());
            }
            self.frame_count += 1;
            Ok(Some(Frame::new(pixels, self.width, self.height)?))
        }

        fn close(&mut self) {
            self.state = None;
            log::debug!(
                "source: released /dev/video{} after {} frames",
                self.device_index,
                self.frame_count
            );
        }

        fn describe(&self) -> String {
            format!("/dev/video{} (v4l2)", self.device_index)
        }
    }
}
