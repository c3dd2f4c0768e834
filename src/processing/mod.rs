//! Comparison-image processing
//!
//! Frames are compared on a shrunken grayscale copy:
//! - Luma extraction from any supported pixel format
//! - Nearest-neighbour downscale by the comparison scale

mod convert;
mod scale;

pub use convert::luma_plane;
pub use scale::scale_plane;

use crate::error::Result;
use crate::types::{Frame, GrayImage};

/// Build the comparison image for a frame
///
/// Deterministic: the same frame and scale always give the same image.
pub fn comparison_image(frame: &Frame, comparison_scale: u32) -> Result<GrayImage> {
    let luma = luma_plane(frame)?;
    let target = frame.resolution().scaled_down(comparison_scale);
    let data = scale_plane(&luma, frame.width, frame.height, target.width, target.height)?;
    Ok(GrayImage::new(target.width, target.height, data))
}
