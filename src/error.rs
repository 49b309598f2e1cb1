//! Error taxonomy for the detection console.
//!
//! Each variant names the boundary where the failure originated. Errors are
//! caught at that boundary, logged, and surfaced to the operator as a visible
//! message; none of them are allowed to take down the process, and nothing is
//! retried automatically.

use std::fmt;

#[derive(Clone, Debug)]
pub enum AppError {
    /// The source locator was invalid, unreachable, or unsupported.
    SourceOpen(String),
    /// A frame read failed mid-stream (device disconnect, decode error).
    StreamRead(String),
    /// The detector backend failed to produce a result.
    Inference(String),
    /// The result store could not be reached or written.
    Persistence(String),
    /// A stored blob could not be decoded back into an image.
    Decode(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::SourceOpen(_) => "SOURCE_OPEN",
            AppError::StreamRead(_) => "STREAM_READ",
            AppError::Inference(_) => "INFERENCE",
            AppError::Persistence(_) => "PERSISTENCE",
            AppError::Decode(_) => "DECODE",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::SourceOpen(m)
            | AppError::StreamRead(m)
            | AppError::Inference(m)
            | AppError::Persistence(m)
            | AppError::Decode(m) => m,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}
