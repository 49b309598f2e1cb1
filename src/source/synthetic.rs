//! Synthetic frame generation for `stub://` locators.
//!
//! Every source kind accepts a `stub://` locator that yields deterministic
//! synthetic frames, so the session loop, overlay rendering, and persistence
//! paths are fully exercisable without native media libraries or hardware.
//!
//! Locator grammar: `stub://<name>` for an unbounded stream, or
//! `stub://<name>?frames=N` for a stream that ends after N frames.

use anyhow::Result;

use crate::frame::Frame;
use crate::source::{source_open_error, FrameStream};

pub(crate) const STUB_WIDTH: u32 = 640;
pub(crate) const STUB_HEIGHT: u32 = 480;

/// Generate deterministic RGB pixels for one synthetic frame.
///
/// The pattern varies with the frame index and a per-stream seed so
/// consecutive frames differ (tracking and motion paths see changing input)
/// while the same locator always produces the same sequence.
pub(crate) fn synthetic_pixels(width: u32, height: u32, seed: u64, frame_index: u64) -> Vec<u8> {
    let pixel_count = (width as usize) * (height as usize) * 3;
    let mut pixels = vec![0u8; pixel_count];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        *pixel = ((i as u64).wrapping_add(seed.wrapping_mul(31)).wrapping_add(frame_index * 17)
            % 256) as u8;
    }
    pixels
}

fn seed_from_name(name: &str) -> u64 {
    name.bytes().fold(0u64, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u64))
}

/// Parse a `stub://` locator into (seed, frame limit).
pub(crate) fn parse_stub_locator(locator: &str) -> Result<(u64, Option<u64>)> {
    let rest = locator
        .strip_prefix("stub://")
        .ok_or_else(|| source_open_error(format!("'{}' is not a stub locator", locator)))?;
    let (name, query) = match rest.split_once('?') {
        Some((name, query)) => (name, Some(query)),
        None => (rest, None),
    };
    let mut limit = None;
    if let Some(query) = query {
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("frames", value)) => {
                    let frames: u64 = value.parse().map_err(|_| {
                        source_open_error(format!("invalid frame count in '{}'", locator))
                    })?;
                    limit = Some(frames);
                }
                _ => {
                    return Err(source_open_error(format!(
                        "unrecognized stub parameter in '{}'",
                        locator
                    )))
                }
            }
        }
    }
    Ok((seed_from_name(name), limit))
}

/// Synthetic stream used by `stub://` locators of every streaming kind.
pub struct SyntheticStream {
    locator: String,
    seed: u64,
    limit: Option<u64>,
    frame_count: u64,
    closed: bool,
}

impl SyntheticStream {
    pub fn open(locator: &str) -> Result<Self> {
        let (seed, limit) = parse_stub_locator(locator)?;
        log::info!("source: connected to {} (synthetic)", locator);
        Ok(Self {
            locator: locator.to_string(),
            seed,
            limit,
            frame_count: 0,
            closed: false,
        })
    }

    /// Single synthetic frame for `stub://` still-image locators.
    pub fn still_frame(locator: &str) -> Result<Frame> {
        let (seed, _) = parse_stub_locator(locator)?;
        Frame::new(
            synthetic_pixels(STUB_WIDTH, STUB_HEIGHT, seed, 0),
            STUB_WIDTH,
            STUB_HEIGHT,
        )
    }
}

impl FrameStream for SyntheticStream {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(limit) = self.limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        let pixels = synthetic_pixels(STUB_WIDTH, STUB_HEIGHT, self.seed, self.frame_count);
        self.frame_count += 1;
        Ok(Some(Frame::new(pixels, STUB_WIDTH, STUB_HEIGHT)?))
    }

    fn close(&mut self) {
        self.closed = true;
        log::debug!(
            "source: released {} after {} frames",
            self.locator,
            self.frame_count
        );
    }

    fn describe(&self) -> String {
        format!("{} (synthetic)", self.locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_stream_ends_after_limit() {
        let mut stream = SyntheticStream::open("stub://clip?frames=3").unwrap();
        let mut produced = 0;
        while let Some(_frame) = stream.next_frame().unwrap() {
            produced += 1;
        }
        assert_eq!(produced, 3);
        // Exhausted streams keep signalling end-of-stream.
        assert!(stream.next_frame().unwrap().is_none());
    }

    #[test]
    fn same_locator_produces_identical_sequences() {
        let mut a = SyntheticStream::open("stub://road?frames=2").unwrap();
        let mut b = SyntheticStream::open("stub://road?frames=2").unwrap();
        assert_eq!(a.next_frame().unwrap(), b.next_frame().unwrap());
        assert_eq!(a.next_frame().unwrap(), b.next_frame().unwrap());
    }

    #[test]
    fn consecutive_frames_differ() {
        let mut stream = SyntheticStream::open("stub://road").unwrap();
        let first = stream.next_frame().unwrap().unwrap();
        let second = stream.next_frame().unwrap().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_stub_parameters_are_rejected() {
        assert!(parse_stub_locator("stub://clip?frames=lots").is_err());
        assert!(parse_stub_locator("stub://clip?speed=2").is_err());
    }
}
