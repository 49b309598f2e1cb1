//! Frame sources.
//!
//! This module maps a user-selected source kind plus its locator to either a
//! single decoded image or an open, pull-based frame stream:
//! - Still images (file upload path)
//! - Stored video files (feature: source-video-ffmpeg)
//! - Webcam devices (feature: source-webcam-v4l2)
//! - RTSP streams (feature: source-rtsp)
//! - YouTube URLs (feature: source-youtube)
//! - `stub://` synthetic sources (always available, used by tests)
//!
//! Each kind owns its own validation rules; the kinds are disjoint. A failed
//! open is reported exactly once and never retried; the caller must
//! re-trigger. End-of-stream is an ordinary `Ok(None)`, not an error.

mod rtsp;
mod still;
mod synthetic;
mod video;
#[cfg(feature = "source-video-ffmpeg")]
pub(crate) mod video_ffmpeg;
mod webcam;
mod youtube;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Result;

use crate::error::AppError;
use crate::frame::Frame;

pub use rtsp::RtspStream;
pub use synthetic::SyntheticStream;
pub use video::VideoFileStream;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "webm"];
const MAX_WEBCAM_DEVICE: u32 = 16;

/// A pull-based, ordered stream of frames from one open source handle.
pub trait FrameStream {
    /// Pull the next frame. `Ok(None)` signals ordinary end-of-stream (file
    /// exhausted, device closed); `Err` is a mid-stream read failure.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying capture handle. The streaming loop calls this
    /// exactly once on every exit path.
    fn close(&mut self);

    /// Short human-readable description for operator logs.
    fn describe(&self) -> String;
}

/// A user-selected source: kind plus kind-specific locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    Image { path: PathBuf },
    Video { path: PathBuf },
    Webcam { device: u32 },
    Rtsp { url: String },
    Youtube { url: String },
}

impl SourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Image { .. } => "image",
            SourceSpec::Video { .. } => "video",
            SourceSpec::Webcam { .. } => "webcam",
            SourceSpec::Rtsp { .. } => "rtsp",
            SourceSpec::Youtube { .. } => "youtube",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SourceSpec::Image { path } => format!("image {}", path.display()),
            SourceSpec::Video { path } => format!("video {}", path.display()),
            SourceSpec::Webcam { device } => format!("webcam /dev/video{}", device),
            SourceSpec::Rtsp { url } => format!("rtsp {}", url),
            SourceSpec::Youtube { url } => format!("youtube {}", url),
        }
    }
}

/// Result of opening a source: still sources decode to one image, everything
/// else yields a stream handle.
pub enum OpenedSource {
    Still(Frame),
    Stream(Box<dyn FrameStream>),
}

/// Validate the locator and open the source.
///
/// Every failure path returns an `AppError::SourceOpen` wrapped in the error
/// chain; nothing here panics on bad operator input.
pub fn open_source(spec: &SourceSpec) -> Result<OpenedSource> {
    match spec {
        SourceSpec::Image { path } => still::open_image(path).map(OpenedSource::Still),
        SourceSpec::Video { path } => video::open_video(path).map(OpenedSource::Stream),
        SourceSpec::Webcam { device } => webcam::open_webcam(*device).map(OpenedSource::Stream),
        SourceSpec::Rtsp { url } => rtsp::open_rtsp(url).map(OpenedSource::Stream),
        SourceSpec::Youtube { url } => youtube::open_youtube(url).map(OpenedSource::Stream),
    }
}

pub(crate) fn source_open_error(message: impl Into<String>) -> anyhow::Error {
    AppError::SourceOpen(message.into()).into()
}

pub(crate) fn is_stub_locator(locator: &str) -> bool {
    locator.starts_with("stub://")
}

pub(crate) fn validate_extension(path: &Path, allowed: &[&str], kind: &str) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    match extension {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(source_open_error(format!(
            "unsupported {} extension for '{}' (expected one of {})",
            kind,
            path.display(),
            allowed.join(", ")
        ))),
    }
}

pub(crate) fn validate_local_path(path: &Path, allowed: &[&str], kind: &str) -> Result<()> {
    validate_extension(path, allowed, kind)?;
    let metadata = std::fs::metadata(path).map_err(|e| {
        source_open_error(format!("{} '{}' is not readable: {}", kind, path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(source_open_error(format!(
            "{} '{}' is not a regular file",
            kind,
            path.display()
        )));
    }
    Ok(())
}

pub(crate) fn validate_image_path(path: &Path) -> Result<()> {
    validate_local_path(path, IMAGE_EXTENSIONS, "image")
}

pub(crate) fn validate_video_path(path: &Path) -> Result<()> {
    validate_local_path(path, VIDEO_EXTENSIONS, "video")
}

pub(crate) fn validate_webcam_device(device: u32) -> Result<()> {
    if device > MAX_WEBCAM_DEVICE {
        return Err(source_open_error(format!(
            "webcam device index {} out of range (0..={})",
            device, MAX_WEBCAM_DEVICE
        )));
    }
    Ok(())
}

pub(crate) fn validate_rtsp_url(url: &str) -> Result<()> {
    if is_stub_locator(url) || url.starts_with("rtsp://") {
        Ok(())
    } else {
        Err(source_open_error(format!(
            "'{}' is not an rtsp:// URL",
            url
        )))
    }
}

/// Watch-page and short-link forms only; playlists and channels are not
/// valid session locators.
pub(crate) fn validate_youtube_url(url: &str) -> Result<()> {
    if is_stub_locator(url) {
        return Ok(());
    }
    static YOUTUBE_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = YOUTUBE_RE.get_or_init(|| {
        regex::Regex::new(
            r"^https?://(www\.)?(youtube\.com/watch\?v=[A-Za-z0-9_-]{6,}|youtu\.be/[A-Za-z0-9_-]{6,})",
        )
        .expect("youtube locator pattern compiles")
    });
    if re.is_match(url) {
        Ok(())
    } else {
        Err(source_open_error(format!(
            "'{}' is not a recognized YouTube watch URL",
            url
        )))
    }
}

impl SourceSpec {
    /// Run the kind-specific locator validation without opening the source.
    pub fn validate(&self) -> Result<()> {
        match self {
            SourceSpec::Image { path } => {
                if is_stub_locator(&path.to_string_lossy()) {
                    Ok(())
                } else {
                    validate_image_path(path)
                }
            }
            SourceSpec::Video { path } => {
                if is_stub_locator(&path.to_string_lossy()) {
                    Ok(())
                } else {
                    validate_video_path(path)
                }
            }
            SourceSpec::Webcam { device } => validate_webcam_device(*device),
            SourceSpec::Rtsp { url } => validate_rtsp_url(url),
            SourceSpec::Youtube { url } => validate_youtube_url(url),
        }
    }
}

/// Decode an image file (or `stub://` locator) into one frame, used by the
/// still-image session path.
pub fn open_still(path: &Path) -> Result<Frame> {
    still::open_image(path)
}
