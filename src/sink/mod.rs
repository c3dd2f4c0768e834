//! Frame sinks
//!
//! Each scheduled record is handed over once with its final repeat count; the
//! sink emits the image that many times in order.

mod memory;
mod y4m;

#[cfg(feature = "ffmpeg")]
mod ffmpeg;

pub use memory::MemorySink;
pub use y4m::Y4mSink;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSink;

use crate::error::Result;
use crate::types::{Frame, VideoInfo};
use std::path::Path;

/// Trait for frame sinks
pub trait FrameSink {
    /// Emit `frame` exactly `repeat` times
    fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()>;

    /// Flush and finalize the stream
    fn finish(&mut self) -> Result<()>;

    /// Frames emitted so far, counting repeats
    fn frames_written(&self) -> u64;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()> {
        (**self).write(frame, repeat)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn frames_written(&self) -> u64 {
        (**self).frames_written()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()> {
        (**self).write(frame, repeat)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn frames_written(&self) -> u64 {
        (**self).frames_written()
    }
}

/// Open a sink for `path` matching the source stream
///
/// `-` and `.y4m` paths get a YUV4MPEG2 stream carrying the source header.
/// Other containers need the `ffmpeg` feature.
pub fn open_sink(path: &Path, info: &VideoInfo) -> Result<Box<dyn FrameSink>> {
    if crate::source::is_y4m_path(path) {
        return Ok(Box::new(Y4mSink::create(path, info)?));
    }

    #[cfg(feature = "ffmpeg")]
    {
        Ok(Box::new(FfmpegSink::create(path, info)?))
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(crate::error::Error::SinkOpen(format!(
            "{}: only YUV4MPEG2 output is supported without the ffmpeg feature",
            path.display()
        )))
    }
}
