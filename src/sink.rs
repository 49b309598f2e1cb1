//! Display sinks.
//!
//! A sink is the single-slot surface the loop publishes annotated frames to:
//! each `show` replaces whatever was shown before. The file sink overwrites
//! one PNG on disk (an external page or viewer polls it); the memory sink
//! records frames for tests; the null sink discards everything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::frame::Frame;

pub trait DisplaySink {
    /// Replace the currently shown content with this frame and caption.
    fn show(&mut self, frame: &Frame, caption: &str) -> Result<()>;
}

/// Sink that overwrites a single PNG file per `show`.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for FileSink {
    fn show(&mut self, frame: &Frame, caption: &str) -> Result<()> {
        frame
            .to_rgb_image()
            .save_with_format(&self.path, image::ImageFormat::Png)
            .with_context(|| format!("write display frame to {}", self.path.display()))?;
        log::debug!("display: {} -> {}", caption, self.path.display());
        Ok(())
    }
}

/// Sink that keeps shown frames in memory. Tests read back both the latest
/// slot and the full publish history.
#[derive(Default)]
pub struct MemorySink {
    shown: Vec<(Frame, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&(Frame, String)> {
        self.shown.last()
    }

    pub fn shown(&self) -> &[(Frame, String)] {
        &self.shown
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

impl DisplaySink for MemorySink {
    fn show(&mut self, frame: &Frame, caption: &str) -> Result<()> {
        self.shown.push((frame.clone(), caption.to_string()));
        Ok(())
    }
}

/// Sink that discards everything.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn show(&mut self, _frame: &Frame, _caption: &str) -> Result<()> {
        Ok(())
    }
}
