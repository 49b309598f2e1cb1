//! Still-image source.
//!
//! Decodes one uploaded image file into a frame. Supported encodings are the
//! ones the upload surface accepts: jpg/jpeg/png/bmp/webp.

use std::path::Path;

use anyhow::Result;

use crate::frame::Frame;
use crate::source::{is_stub_locator, source_open_error, validate_image_path, SyntheticStream};

pub(crate) fn open_image(path: &Path) -> Result<Frame> {
    let locator = path.to_string_lossy();
    if is_stub_locator(&locator) {
        return SyntheticStream::still_frame(&locator);
    }
    validate_image_path(path)?;
    let decoded = image::open(path)
        .map_err(|e| source_open_error(format!("failed to decode '{}': {}", path.display(), e)))?;
    Ok(Frame::from_rgb_image(decoded.to_rgb8()))
}
