//! Common types used throughout framepace

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Resolution reduced by `factor` in each dimension, never below 1x1
    pub fn scaled_down(&self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self::new((self.width / factor).max(1), (self.height / factor).max(1))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of a full-resolution frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FrameFormat {
    /// Single 8-bit luma plane
    Gray8,
    /// Planar YUV 4:2:0
    #[default]
    Yuv420p,
    /// Planar YUV 4:2:2
    Yuv422p,
    /// Planar YUV 4:4:4
    Yuv444p,
    /// Packed 24-bit RGB
    Rgb24,
}

impl FrameFormat {
    /// Plane layout as `(row_bytes, rows)`, in storage order
    pub fn planes(&self, width: u32, height: u32) -> Vec<(usize, usize)> {
        let w = width as usize;
        let h = height as usize;
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        match self {
            FrameFormat::Gray8 => vec![(w, h)],
            FrameFormat::Yuv420p => vec![(w, h), (cw, ch), (cw, ch)],
            FrameFormat::Yuv422p => vec![(w, h), (cw, h), (cw, h)],
            FrameFormat::Yuv444p => vec![(w, h), (w, h), (w, h)],
            FrameFormat::Rgb24 => vec![(w * 3, h)],
        }
    }

    /// Exact buffer size for a frame of the given dimensions
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.planes(width, height)
            .iter()
            .map(|(row, rows)| row * rows)
            .sum()
    }

    /// Whether the first `width * height` bytes are the luma plane
    pub fn has_luma_plane(&self) -> bool {
        !matches!(self, FrameFormat::Rgb24)
    }
}

/// A full-resolution video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw frame data
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Pixel format
    pub format: FrameFormat,
}

impl Frame {
    /// Create a new frame with a zeroed buffer
    pub fn new(width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            data: vec![0u8; format.frame_size(width, height)],
            width,
            height,
            format,
        }
    }

    /// Create a frame from existing data, checking the buffer size
    pub fn from_data(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(Error::Decode(format!(
                "{:?} frame {}x{} needs {} bytes, got {}",
                format,
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// Get resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Downscaled single-channel image used only for frame differencing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Image filled with a single value
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Framerate representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

impl Framerate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_60: Self = Self::new(60, 1);

    /// Get framerate as f64
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::FPS_60
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den == 1 {
            write!(f, "{} fps", self.num)
        } else {
            write!(f, "{:.2} fps", self.as_f64())
        }
    }
}

/// Stream properties reported by a frame source
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub resolution: Resolution,
    pub framerate: Framerate,
    pub format: FrameFormat,
    /// Frame count if the container reports one
    pub total_frames: Option<u64>,
    /// Codec name, when the source is a compressed container
    pub codec: Option<String>,
    /// Stream parameters the sink should carry over untouched
    pub passthrough: Vec<String>,
}

impl VideoInfo {
    pub fn new(resolution: Resolution, framerate: Framerate, format: FrameFormat) -> Self {
        Self {
            resolution,
            framerate,
            format,
            total_frames: None,
            codec: None,
            passthrough: Vec::new(),
        }
    }

    pub fn with_total_frames(mut self, total: u64) -> Self {
        self.total_frames = Some(total);
        self
    }

    /// Duration in seconds, if the frame count is known
    pub fn duration_secs(&self) -> Option<f64> {
        let fps = self.framerate.as_f64();
        match self.total_frames {
            Some(total) if fps > 0.0 => Some(total as f64 / fps),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_sizes() {
        assert_eq!(FrameFormat::Gray8.frame_size(4, 4), 16);
        assert_eq!(FrameFormat::Yuv420p.frame_size(4, 4), 24);
        assert_eq!(FrameFormat::Yuv420p.frame_size(5, 3), 15 + 2 * 3 * 2);
        assert_eq!(FrameFormat::Yuv422p.frame_size(4, 2), 8 + 2 * 2 * 2);
        assert_eq!(FrameFormat::Rgb24.frame_size(2, 2), 12);
    }

    #[test]
    fn test_from_data_rejects_short_buffer() {
        assert!(Frame::from_data(vec![0; 10], 4, 4, FrameFormat::Gray8).is_err());
        let frame = Frame::from_data(vec![7; 16], 4, 4, FrameFormat::Gray8).unwrap();
        assert_eq!(frame.resolution(), Resolution::new(4, 4));
    }

    #[test]
    fn test_scaled_down_never_zero() {
        let res = Resolution::new(1920, 1080);
        assert_eq!(res.scaled_down(4), Resolution::new(480, 270));
        assert_eq!(Resolution::new(3, 3).scaled_down(8), Resolution::new(1, 1));
    }

    #[test]
    fn test_framerate_display() {
        assert_eq!(Framerate::FPS_60.to_string(), "60 fps");
        assert_eq!(Framerate::new(60000, 1001).to_string(), "59.94 fps");
    }

    #[test]
    fn test_duration() {
        let info = VideoInfo::new(Resolution::new(8, 8), Framerate::FPS_30, FrameFormat::Gray8)
            .with_total_frames(90);
        assert_eq!(info.duration_secs(), Some(3.0));
    }
}
