//! Raw frame container.
//!
//! A `Frame` is a single RGB8 image: row-major pixel data, three bytes per
//! pixel, no identity beyond its position in a stream. Frames are produced by
//! the source layer, resized to the session's target resolution, consumed by
//! the detector, and discarded. Only rendered overlays outlive the loop (via
//! the result store).

use anyhow::{anyhow, Result};
use image::{imageops::FilterType, ImageBuffer, RgbImage};

/// Bytes per pixel for the RGB8 layout used throughout the crate.
pub const RGB_BYTES_PER_PIXEL: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw RGB8 bytes. The byte length must match the
    /// dimensions exactly (no row padding).
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(RGB_BYTES_PER_PIXEL))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy into an `image` buffer for drawing, encoding, or resizing.
    pub fn to_rgb_image(&self) -> RgbImage {
        // Length is validated at construction, so this cannot fail.
        ImageBuffer::from_raw(self.width, self.height, self.data.clone())
            .expect("frame byte length matches dimensions")
    }

    /// Return a copy scaled to the given resolution. Returns `self` unchanged
    /// when the dimensions already match.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let scaled =
            image::imageops::resize(&self.to_rgb_image(), width, height, FilterType::Triangle);
        Frame::from_rgb_image(scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_byte_length() {
        assert!(Frame::new(vec![0u8; 10], 4, 4).is_err());
    }

    #[test]
    fn resize_changes_dimensions() {
        let frame = Frame::new(vec![0u8; 8 * 6 * 3], 8, 6).unwrap();
        let small = frame.resized(4, 3);
        assert_eq!(small.width(), 4);
        assert_eq!(small.height(), 3);
        assert_eq!(small.data().len(), 4 * 3 * 3);
    }

    #[test]
    fn resize_to_same_dimensions_is_identity() {
        let data: Vec<u8> = (0..(4 * 4 * 3)).map(|i| i as u8).collect();
        let frame = Frame::new(data, 4, 4).unwrap();
        assert_eq!(frame.resized(4, 4), frame);
    }

    #[test]
    fn image_round_trip_preserves_pixels() {
        let data: Vec<u8> = (0..(5 * 2 * 3)).map(|i| (i * 7) as u8).collect();
        let frame = Frame::new(data, 5, 2).unwrap();
        let back = Frame::from_rgb_image(frame.to_rgb_image());
        assert_eq!(back, frame);
    }
}
