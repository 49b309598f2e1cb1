//! Overlay rendering.
//!
//! Draws detection boxes and captions onto a frame. Rendering is pure: it
//! returns a new frame and never mutates tracker or model state. A frame with
//! no detections renders byte-identical to its input.
//!
//! Caption text needs a font; when none is configured the overlay carries
//! boxes only. Box colors are stable per track id (so an object keeps its
//! color while tracked) and otherwise per label.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::Frame;

const CAPTION_SCALE: f32 = 14.0;

/// Rendering options for one session.
#[derive(Clone, Default)]
pub struct OverlayStyle {
    font: Option<FontArc>,
}

impl OverlayStyle {
    /// Boxes only, no caption text.
    pub fn plain() -> Self {
        Self { font: None }
    }

    /// Load a TTF/OTF font for caption text.
    pub fn with_font_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read caption font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow::anyhow!("invalid caption font {}: {}", path.display(), e))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

/// Render detections onto a copy of the frame.
pub fn render_overlay(frame: &Frame, detections: &[Detection], style: &OverlayStyle) -> Frame {
    if detections.is_empty() {
        return frame.clone();
    }

    let mut canvas = frame.to_rgb_image();
    let (width, height) = canvas.dimensions();

    for detection in detections {
        let color = match detection.track_id {
            Some(id) => track_color(id),
            None => label_color(&detection.label),
        };

        let x = detection.bbox.x.clamp(0.0, width.saturating_sub(1) as f32) as i32;
        let y = detection.bbox.y.clamp(0.0, height.saturating_sub(1) as f32) as i32;
        let w = (detection.bbox.width as u32).clamp(1, width.saturating_sub(x as u32).max(1));
        let h = (detection.bbox.height as u32).clamp(1, height.saturating_sub(y as u32).max(1));

        draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), Rgb(color));

        if let Some(font) = &style.font {
            let caption = detection.caption();
            let text_y = (y - CAPTION_SCALE as i32 - 2).max(0);
            draw_text_mut(
                &mut canvas,
                Rgb(color),
                x,
                text_y,
                PxScale::from(CAPTION_SCALE),
                font,
                &caption,
            );
        }
    }

    Frame::from_rgb_image(canvas)
}

/// Stable per-track color: golden-angle hue sampling keeps neighboring ids
/// visually distinct.
fn track_color(id: u32) -> [u8; 3] {
    let hue = (id as f32 * 137.508) % 360.0;
    hsv_to_rgb(hue, 0.8, 0.9)
}

fn label_color(label: &str) -> [u8; 3] {
    let seed = label
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let hue = (seed % 360) as f32;
    hsv_to_rgb(hue, 0.7, 0.95)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn blank_frame() -> Frame {
        Frame::new(vec![0u8; 64 * 48 * 3], 64, 48).unwrap()
    }

    #[test]
    fn empty_detections_render_identically() {
        let frame = blank_frame();
        let overlay = render_overlay(&frame, &[], &OverlayStyle::plain());
        assert_eq!(overlay, frame);
    }

    #[test]
    fn boxes_change_pixels() {
        let frame = blank_frame();
        let detections = vec![Detection::new(
            BoundingBox::new(8.0, 8.0, 16.0, 12.0),
            "crack",
            0.9,
        )];
        let overlay = render_overlay(&frame, &detections, &OverlayStyle::plain());
        assert_ne!(overlay, frame);
        assert_eq!(overlay.width(), frame.width());
        assert_eq!(overlay.height(), frame.height());
    }

    #[test]
    fn out_of_bounds_boxes_are_clamped() {
        let frame = blank_frame();
        let detections = vec![Detection::new(
            BoundingBox::new(-20.0, -20.0, 500.0, 500.0),
            "pothole",
            0.5,
        )];
        // Must not panic.
        let overlay = render_overlay(&frame, &detections, &OverlayStyle::plain());
        assert_ne!(overlay, frame);
    }

    #[test]
    fn track_colors_are_stable_and_distinct() {
        assert_eq!(track_color(7), track_color(7));
        assert_ne!(track_color(1), track_color(2));
    }
}
