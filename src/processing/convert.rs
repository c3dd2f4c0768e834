//! Luma extraction

use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat};

/// BT.601 luma from packed RGB
#[inline]
fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// Extract the 8-bit luma plane of a frame
pub fn luma_plane(frame: &Frame) -> Result<Vec<u8>> {
    let pixels = frame.width as usize * frame.height as usize;
    if frame.data.len() < frame.format.frame_size(frame.width, frame.height) {
        return Err(Error::Decode(format!(
            "{:?} frame {} is truncated ({} bytes)",
            frame.format,
            frame.resolution(),
            frame.data.len()
        )));
    }

    if frame.format.has_luma_plane() {
        return Ok(frame.data[..pixels].to_vec());
    }

    match frame.format {
        FrameFormat::Rgb24 => Ok(frame.data[..pixels * 3]
            .chunks_exact(3)
            .map(|rgb| rgb_luma(rgb[0], rgb[1], rgb[2]))
            .collect()),
        other => Err(Error::UnsupportedFormat(format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv_takes_first_plane() {
        let mut frame = Frame::new(2, 2, FrameFormat::Yuv420p);
        frame.data[..4].copy_from_slice(&[1, 2, 3, 4]);
        frame.data[4..].fill(200);
        assert_eq!(luma_plane(&frame).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rgb_weights() {
        let frame =
            Frame::from_data(vec![255, 255, 255, 0, 0, 0], 2, 1, FrameFormat::Rgb24).unwrap();
        assert_eq!(luma_plane(&frame).unwrap(), vec![255, 0]);
    }

    #[test]
    fn test_truncated_frame() {
        let frame = Frame {
            data: vec![0; 3],
            width: 2,
            height: 2,
            format: FrameFormat::Gray8,
        };
        assert!(luma_plane(&frame).is_err());
    }
}
