use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

const DEFECT_LABELS: &[&str] = &["crack", "pothole", "patch", "raveling"];

/// Stub backend for tests and wiring. Derives candidate boxes from a hash of
/// the pixel content, so the same frame always yields the same candidates and
/// different frames yield different ones. Candidate confidences are spread
/// over the full [0, 1] range.
pub struct StubBackend {
    silent: bool,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { silent: false }
    }

    /// A stub that never reports candidates, for exercising the empty-overlay
    /// path.
    pub fn silent() -> Self {
        Self { silent: true }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        if self.silent || width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let digest: [u8; 32] = Sha256::digest(pixels).into();
        let count = (digest[0] % 3) as usize + 2;

        let mut detections = Vec::with_capacity(count);
        for i in 0..count {
            let b = &digest[i * 5..i * 5 + 5];
            let cx = (b[0] as f32 / 255.0) * width as f32;
            let cy = (b[1] as f32 / 255.0) * height as f32;
            let w = (b[2] as f32 / 255.0) * 0.4 * width as f32 + 4.0;
            let h = (b[3] as f32 / 255.0) * 0.4 * height as f32 + 4.0;
            let confidence = b[4] as f32 / 255.0;

            let x = (cx - w / 2.0).clamp(0.0, (width as f32 - 1.0).max(0.0));
            let y = (cy - h / 2.0).clamp(0.0, (height as f32 - 1.0).max(0.0));
            let w = w.min(width as f32 - x);
            let h = h.min(height as f32 - y);

            detections.push(Detection::new(
                BoundingBox::new(x, y, w, h),
                DEFECT_LABELS[i % DEFECT_LABELS.len()],
                confidence,
            ));
        }
        Ok(detections)
    }
}
