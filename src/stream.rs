//! Streaming detection loop.
//!
//! One session drives a source through detection and out to the display sink
//! as an explicit state machine:
//!
//! ```text
//! Idle -> Opening -> Streaming -> (Ended | Cancelled | Failed)
//! ```
//!
//! End-of-stream and cancellation are ordinary transitions, not exceptional
//! control flow. The source handle is released exactly once on every exit
//! path. Nothing in here retries: a failed open or a mid-stream read error is
//! reported once and the session ends; the operator re-triggers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::annotate::OverlayStyle;
use crate::detect::{run_detection, DetectorBackend, TrackerKind, TrackerState};
use crate::sink::DisplaySink;
use crate::source::{open_source, FrameStream, OpenedSource, SourceSpec};

/// Session lifecycle states. `Ended`, `Cancelled`, and `Failed` are terminal;
/// a new trigger starts a fresh session from `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Opening,
    Streaming,
    Ended,
    Cancelled,
    Failed,
}

/// Shared cancellation flag, checked between frame reads. The binary wires
/// this to Ctrl-C; tests flip it directly.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-session knobs supplied by the operator before each run.
#[derive(Clone, Debug)]
pub struct StreamSettings {
    /// Confidence threshold in [0.0, 1.0].
    pub confidence: f32,
    /// Frames are resized to this resolution before inference.
    pub target_width: u32,
    pub target_height: u32,
    /// Tracking configuration; `None` disables track identities.
    pub tracker: Option<TrackerKind>,
}

/// Outcome of one session. `error` carries the reported message for the
/// `Failed` state; frames already published stay visible regardless.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub state: StreamState,
    pub frames_rendered: u64,
    pub error: Option<String>,
}

impl SessionReport {
    fn failed(frames_rendered: u64, error: String) -> Self {
        Self {
            state: StreamState::Failed,
            frames_rendered,
            error: Some(error),
        }
    }
}

/// Open the source and run the session to a terminal state.
///
/// Open failures transition straight to `Failed` without starting the loop.
/// A still-image source is a one-frame session.
pub fn run_session(
    spec: &SourceSpec,
    settings: &StreamSettings,
    backend: &Arc<Mutex<dyn DetectorBackend>>,
    style: &OverlayStyle,
    sink: &mut dyn DisplaySink,
    cancel: &CancelToken,
) -> SessionReport {
    log::info!("session: opening {}", spec.describe());
    let opened = match open_source(spec) {
        Ok(opened) => opened,
        Err(e) => {
            let message = format!("{:#}", e);
            log::warn!("session: open failed: {}", message);
            return SessionReport::failed(0, message);
        }
    };

    match opened {
        OpenedSource::Still(frame) => {
            let mut stream = SingleFrameStream::new(frame);
            drive_stream(&mut stream, settings, backend, style, sink, cancel)
        }
        OpenedSource::Stream(mut stream) => {
            drive_stream(stream.as_mut(), settings, backend, style, sink, cancel)
        }
    }
}

/// Drive an already-open stream to a terminal state.
///
/// The stream handle is closed exactly once before this returns, whichever
/// exit path is taken. A fresh tracker state is created per call, so track
/// identities never leak between sessions.
pub fn drive_stream(
    stream: &mut dyn FrameStream,
    settings: &StreamSettings,
    backend: &Arc<Mutex<dyn DetectorBackend>>,
    style: &OverlayStyle,
    sink: &mut dyn DisplaySink,
    cancel: &CancelToken,
) -> SessionReport {
    let mut tracker = settings.tracker.map(TrackerState::new);
    let mut frames_rendered = 0u64;
    let mut error = None;
    log::debug!("session: streaming from {}", stream.describe());

    let state = loop {
        if cancel.is_cancelled() {
            break StreamState::Cancelled;
        }

        match stream.next_frame() {
            Ok(Some(frame)) => {
                let frame = frame.resized(settings.target_width, settings.target_height);
                match run_detection(
                    backend,
                    &frame,
                    settings.confidence,
                    tracker.as_mut(),
                    style,
                ) {
                    Ok((detections, overlay)) => {
                        let caption =
                            format!("frame {}: {} detections", frames_rendered + 1, detections.len());
                        if let Err(e) = sink.show(&overlay, &caption) {
                            // Display is best-effort; the previously shown
                            // frame simply stays up.
                            log::warn!("session: display sink error: {:#}", e);
                        }
                        frames_rendered += 1;
                    }
                    Err(e) => {
                        let message = format!("{:#}", e);
                        log::warn!("session: inference failed: {}", message);
                        error = Some(message);
                        break StreamState::Failed;
                    }
                }
            }
            Ok(None) => break StreamState::Ended,
            Err(e) => {
                let message = format!("{:#}", e);
                log::warn!("session: stream read failed: {}", message);
                error = Some(message);
                break StreamState::Failed;
            }
        }
    };

    stream.close();
    log::info!(
        "session: {:?} after {} frames",
        state,
        frames_rendered
    );
    SessionReport {
        state,
        frames_rendered,
        error,
    }
}

/// Adapter that lets a still image run through the same loop as a stream.
struct SingleFrameStream {
    frame: Option<crate::frame::Frame>,
}

impl SingleFrameStream {
    fn new(frame: crate::frame::Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl FrameStream for SingleFrameStream {
    fn next_frame(&mut self) -> anyhow::Result<Option<crate::frame::Frame>> {
        Ok(self.frame.take())
    }

    fn close(&mut self) {
        self.frame = None;
    }

    fn describe(&self) -> String {
        "still image".to_string()
    }
}
