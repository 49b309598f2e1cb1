use anyhow::Result;

use crate::detect::result::Detection;

/// Detector backend trait.
///
/// A backend wraps one pretrained model (or a deterministic substitute) and
/// returns ALL raw candidates it found, unthresholded. Confidence filtering
/// happens in the invoker, which is what makes the threshold behave
/// monotonically: lowering it can only ever add detections.
///
/// Implementations must treat the pixel slice as read-only and ephemeral and
/// must not retain it beyond the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier used for registry lookup and logs.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB8 frame and return raw candidates.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook (model load, first-inference cost).
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
