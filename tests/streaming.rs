//! Session-loop behavior: exact frame counts, terminal states, cancellation,
//! and single release of the source handle on every exit path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use pavewatch::{
    drive_stream, run_session, CancelToken, DetectorBackend, Frame, FrameStream, MemorySink,
    OverlayStyle, SourceSpec, StreamSettings, StreamState, StubBackend,
};

const TARGET_W: u32 = 320;
const TARGET_H: u32 = 180;

fn settings() -> StreamSettings {
    StreamSettings {
        confidence: 0.5,
        target_width: TARGET_W,
        target_height: TARGET_H,
        tracker: None,
    }
}

fn silent_backend() -> Arc<Mutex<dyn DetectorBackend>> {
    Arc::new(Mutex::new(StubBackend::silent()))
}

fn test_frame(seed: u8) -> Frame {
    let data = (0..(64u32 * 48 * 3))
        .map(|i| (i as u8).wrapping_add(seed))
        .collect();
    Frame::new(data, 64, 48).unwrap()
}

/// Test stream that counts `close` calls and can fail partway through.
struct CountingStream {
    frames: Vec<Frame>,
    cursor: usize,
    fail_at: Option<usize>,
    cancel_at: Option<(usize, CancelToken)>,
    closes: Arc<AtomicUsize>,
}

impl CountingStream {
    fn new(frames: Vec<Frame>, closes: Arc<AtomicUsize>) -> Self {
        Self {
            frames,
            cursor: 0,
            fail_at: None,
            cancel_at: None,
            closes,
        }
    }

    fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    fn cancelling_at(mut self, index: usize, cancel: CancelToken) -> Self {
        self.cancel_at = Some((index, cancel));
        self
    }
}

impl FrameStream for CountingStream {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.cursor) {
            return Err(anyhow::anyhow!("device disconnected"));
        }
        if let Some((index, cancel)) = &self.cancel_at {
            if *index == self.cursor {
                cancel.cancel();
            }
        }
        let frame = self.frames.get(self.cursor).cloned();
        self.cursor += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "counting test stream".to_string()
    }
}

#[test]
fn three_frame_video_renders_three_unannotated_overlays_then_ends() {
    let closes = Arc::new(AtomicUsize::new(0));
    let frames = vec![test_frame(0), test_frame(1), test_frame(2)];
    let mut stream = CountingStream::new(frames.clone(), closes.clone());
    let mut sink = MemorySink::new();

    let report = drive_stream(
        &mut stream,
        &settings(),
        &silent_backend(),
        &OverlayStyle::plain(),
        &mut sink,
        &CancelToken::new(),
    );

    assert_eq!(report.state, StreamState::Ended);
    assert_eq!(report.frames_rendered, 3);
    assert!(report.error.is_none());
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    // With zero detections, each published overlay is exactly the resized
    // input frame.
    assert_eq!(sink.len(), 3);
    for (published, original) in sink.shown().iter().zip(frames.iter()) {
        assert_eq!(&published.0, &original.resized(TARGET_W, TARGET_H));
    }
}

#[test]
fn read_error_fails_the_session_and_releases_the_handle_once() {
    let closes = Arc::new(AtomicUsize::new(0));
    let frames = vec![test_frame(0), test_frame(1), test_frame(2)];
    let mut stream = CountingStream::new(frames, closes.clone()).failing_at(2);
    let mut sink = MemorySink::new();

    let report = drive_stream(
        &mut stream,
        &settings(),
        &silent_backend(),
        &OverlayStyle::plain(),
        &mut sink,
        &CancelToken::new(),
    );

    assert_eq!(report.state, StreamState::Failed);
    assert_eq!(report.frames_rendered, 2);
    assert!(report.error.is_some());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    // Frames published before the failure stay visible.
    assert_eq!(sink.len(), 2);
}

#[test]
fn cancellation_stops_within_one_read_and_releases_the_handle_once() {
    let closes = Arc::new(AtomicUsize::new(0));
    let cancel = CancelToken::new();
    let frames = (0..10u8).map(test_frame).collect();
    let mut stream =
        CountingStream::new(frames, closes.clone()).cancelling_at(1, cancel.clone());
    let mut sink = MemorySink::new();

    let report = drive_stream(
        &mut stream,
        &settings(),
        &silent_backend(),
        &OverlayStyle::plain(),
        &mut sink,
        &cancel,
    );

    assert_eq!(report.state, StreamState::Cancelled);
    // The cancel flag is raised while frame index 1 is being read; that frame
    // is still rendered, and the loop stops before the next read.
    assert_eq!(report.frames_rendered, 2);
    assert_eq!(sink.len(), 2);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn exhausted_then_cancelled_token_does_not_double_release() {
    let closes = Arc::new(AtomicUsize::new(0));
    let mut stream = CountingStream::new(vec![test_frame(0)], closes.clone());
    let mut sink = MemorySink::new();
    let cancel = CancelToken::new();

    let report = drive_stream(
        &mut stream,
        &settings(),
        &silent_backend(),
        &OverlayStyle::plain(),
        &mut sink,
        &cancel,
    );
    assert_eq!(report.state, StreamState::Ended);
    cancel.cancel();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_video_locator_yields_one_error_and_no_frames() {
    let mut sink = MemorySink::new();
    let report = run_session(
        &SourceSpec::Video {
            path: PathBuf::from("no_such_clip.mp4"),
        },
        &settings(),
        &silent_backend(),
        &OverlayStyle::plain(),
        &mut sink,
        &CancelToken::new(),
    );

    assert_eq!(report.state, StreamState::Failed);
    assert_eq!(report.frames_rendered, 0);
    assert!(report.error.is_some());
    assert!(sink.is_empty());
}

#[test]
fn unsupported_rtsp_scheme_is_reported_not_fatal() {
    let mut sink = MemorySink::new();
    let report = run_session(
        &SourceSpec::Rtsp {
            url: "http://not-an-rtsp-url/stream".to_string(),
        },
        &settings(),
        &silent_backend(),
        &OverlayStyle::plain(),
        &mut sink,
        &CancelToken::new(),
    );

    assert_eq!(report.state, StreamState::Failed);
    assert_eq!(report.frames_rendered, 0);
    assert!(report.error.is_some());
}

#[test]
fn tracking_session_keeps_ids_stable_on_a_static_scene() {
    // Same frame repeated: the stub backend reports identical candidates, so
    // every detection should carry the same track id on each frame.
    let closes = Arc::new(AtomicUsize::new(0));
    let frames = vec![test_frame(7); 3];
    let mut stream = CountingStream::new(frames, closes.clone());
    let mut sink = MemorySink::new();

    let mut settings = settings();
    settings.confidence = 0.0;
    settings.tracker = Some(pavewatch::TrackerKind::ByteTrack);

    let backend: Arc<Mutex<dyn DetectorBackend>> = Arc::new(Mutex::new(StubBackend::new()));
    let report = drive_stream(
        &mut stream,
        &settings,
        &backend,
        &OverlayStyle::plain(),
        &mut sink,
        &CancelToken::new(),
    );

    assert_eq!(report.state, StreamState::Ended);
    assert_eq!(report.frames_rendered, 3);
    // Identical consecutive overlays imply identical boxes and identical
    // track ids frame over frame.
    let first = &sink.shown()[0].0;
    for (frame, _) in sink.shown().iter().skip(1) {
        assert_eq!(frame, first);
    }
}
