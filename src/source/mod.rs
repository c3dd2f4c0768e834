//! Frame sources
//!
//! Provides decoded full-resolution frames to the scheduler:
//! - YUV4MPEG2 streams (file or stdin)
//! - In-memory frame lists (tests, benchmarks)
//! - Any FFmpeg-readable container (`ffmpeg` feature)

mod memory;
mod y4m;

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

pub use memory::MemorySource;
pub use y4m::Y4mSource;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;

use crate::error::Result;
use crate::processing::comparison_image;
use crate::types::{Frame, GrayImage, VideoInfo};
use std::path::Path;

/// Trait for frame sources
pub trait FrameSource {
    /// Stream properties, known once the source is open
    fn info(&self) -> &VideoInfo;

    /// Next decoded frame, `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> &VideoInfo {
        (**self).info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// A source frame ready for scheduling
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub image: Frame,
    pub comparison: GrayImage,
    /// 0-based read position
    pub index: u64,
}

/// Wraps a source with read indexing and comparison-image construction
pub struct FrameReader<S> {
    source: S,
    comparison_scale: u32,
    frames_read: u64,
}

impl<S: FrameSource> FrameReader<S> {
    pub fn new(source: S, comparison_scale: u32) -> Self {
        Self {
            source,
            comparison_scale: comparison_scale.max(1),
            frames_read: 0,
        }
    }

    /// Read the next frame, `None` once the source is exhausted
    pub fn read(&mut self) -> Result<Option<SourceFrame>> {
        let Some(image) = self.source.next_frame()? else {
            return Ok(None);
        };

        let comparison = comparison_image(&image, self.comparison_scale)?;
        let index = self.frames_read;
        self.frames_read += 1;

        Ok(Some(SourceFrame {
            image,
            comparison,
            index,
        }))
    }

    pub fn info(&self) -> &VideoInfo {
        self.source.info()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

/// Open a source for `path`
///
/// `-` and `.y4m` files are read as YUV4MPEG2. Other containers need the
/// `ffmpeg` feature.
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>> {
    if is_y4m_path(path) {
        return Ok(Box::new(Y4mSource::open(path)?));
    }

    #[cfg(feature = "ffmpeg")]
    {
        Ok(Box::new(FfmpegSource::open(path)?))
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(crate::error::Error::UnsupportedInput(format!(
            "{}: only YUV4MPEG2 input is supported without the ffmpeg feature \
             (pipe through `ffmpeg -i <input> -f yuv4mpegpipe -`)",
            path.display()
        )))
    }
}

/// Whether `path` names a YUV4MPEG2 stream
pub(crate) fn is_y4m_path(path: &Path) -> bool {
    path.as_os_str() == "-"
        || path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("y4m"))
}
