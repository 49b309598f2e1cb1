//! Stored-video file source.
//!
//! Opens a local video file and yields decoded frames in order until the file
//! is exhausted. Decoding is delegated: the real backend uses FFmpeg behind
//! the `source-video-ffmpeg` feature, and `stub://` locators always work via
//! the synthetic backend.

use std::path::Path;

use anyhow::Result;

use crate::frame::Frame;
use crate::source::{is_stub_locator, validate_video_path, FrameStream, SyntheticStream};
#[cfg(feature = "source-video-ffmpeg")]
use crate::source::video_ffmpeg::FfmpegVideoStream;
#[cfg(not(feature = "source-video-ffmpeg"))]
use crate::source::source_open_error;

/// Frame stream over a stored video file.
pub struct VideoFileStream {
    backend: VideoBackend,
}

enum VideoBackend {
    Synthetic(SyntheticStream),
    #[cfg(feature = "source-video-ffmpeg")]
    Ffmpeg(FfmpegVideoStream),
}

impl VideoFileStream {
    pub fn open(path: &Path) -> Result<Self> {
        let locator = path.to_string_lossy();
        if is_stub_locator(&locator) {
            return Ok(Self {
                backend: VideoBackend::Synthetic(SyntheticStream::open(&locator)?),
            });
        }
        validate_video_path(path)?;
        #[cfg(feature = "source-video-ffmpeg")]
        {
            Ok(Self {
                backend: VideoBackend::Ffmpeg(FfmpegVideoStream::open(path)?),
            })
        }
        #[cfg(not(feature = "source-video-ffmpeg"))]
        {
            Err(source_open_error(format!(
                "opening '{}' requires the source-video-ffmpeg feature",
                path.display()
            )))
        }
    }
}

impl FrameStream for VideoFileStream {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            VideoBackend::Synthetic(stream) => stream.next_frame(),
            #[cfg(feature = "source-video-ffmpeg")]
            VideoBackend::Ffmpeg(stream) => stream.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            VideoBackend::Synthetic(stream) => stream.close(),
            #[cfg(feature = "source-video-ffmpeg")]
            VideoBackend::Ffmpeg(stream) => stream.close(),
        }
    }

    fn describe(&self) -> String {
        match &self.backend {
            VideoBackend::Synthetic(stream) => stream.describe(),
            #[cfg(feature = "source-video-ffmpeg")]
            VideoBackend::Ffmpeg(stream) => stream.describe(),
        }
    }
}

pub(crate) fn open_video(path: &Path) -> Result<Box<dyn FrameStream>> {
    Ok(Box::new(VideoFileStream::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn stub_video_streams_frames() {
        let mut stream = VideoFileStream::open(Path::new("stub://clip?frames=2")).unwrap();
        assert!(stream.next_frame().unwrap().is_some());
        assert!(stream.next_frame().unwrap().is_some());
        assert!(stream.next_frame().unwrap().is_none());
        stream.close();
    }

    #[test]
    fn missing_file_fails_to_open() {
        assert!(VideoFileStream::open(&PathBuf::from("no_such_clip.mp4")).is_err());
    }
}
