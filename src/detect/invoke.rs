//! Detection invocation.
//!
//! One call runs the backend over one frame, applies the session's confidence
//! threshold, optionally updates the session tracker, and renders the
//! overlay. The threshold is applied here, on the backend's raw candidates,
//! so for thresholds t1 < t2 the t1 result is always a superset of the t2
//! result on the same frame.

use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::annotate::{render_overlay, OverlayStyle};
use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::detect::tracker::TrackerState;
use crate::error::AppError;
use crate::frame::Frame;

/// Run detection over one frame and render its overlay.
///
/// Pure apart from the tracker update: the same frame with the same tracker
/// state always produces the same detections and overlay.
pub fn run_detection(
    backend: &Mutex<dyn DetectorBackend>,
    frame: &Frame,
    confidence_threshold: f32,
    tracker: Option<&mut TrackerState>,
    style: &OverlayStyle,
) -> Result<(Vec<Detection>, Frame)> {
    if !(0.0..=1.0).contains(&confidence_threshold) {
        return Err(anyhow!(
            "confidence threshold {} out of bounds [0.0, 1.0]",
            confidence_threshold
        ));
    }

    let candidates = {
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("detector backend lock poisoned"))?;
        guard
            .detect(frame.data(), frame.width(), frame.height())
            .map_err(|e| AppError::Inference(format!("{:#}", e)))?
    };

    let mut detections: Vec<Detection> = candidates
        .into_iter()
        .filter(|d| d.confidence >= confidence_threshold)
        .collect();

    if let Some(tracker) = tracker {
        tracker.assign(&mut detections);
    }

    let overlay = render_overlay(frame, &detections, style);
    Ok((detections, overlay))
}
