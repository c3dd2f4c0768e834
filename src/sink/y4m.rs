//! YUV4MPEG2 frame sink
//!
//! Writes the source header back out, so dimensions, frame rate, interlacing,
//! aspect and colour space are carried over unchanged.

use super::FrameSink;
use crate::error::{Error, Result};
use crate::types::{Frame, VideoInfo};
use crate::y4m::{Y4mHeader, FRAME_MAGIC};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct Y4mSink {
    writer: Box<dyn Write>,
    header: Y4mHeader,
    frames_written: u64,
}

impl Y4mSink {
    /// Create a file, or write to stdout for `-`
    pub fn create(path: &Path, info: &VideoInfo) -> Result<Self> {
        let writer: Box<dyn Write> = if path.as_os_str() == "-" {
            Box::new(BufWriter::new(std::io::stdout()))
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::SinkOpen(format!("Failed to create directory: {}", e))
                    })?;
                }
            }
            let file = File::create(path)
                .map_err(|e| Error::SinkOpen(format!("{}: {}", path.display(), e)))?;
            Box::new(BufWriter::new(file))
        };
        Self::from_writer(writer, info)
    }

    /// Write the stream header to an already open writer
    pub fn from_writer(mut writer: Box<dyn Write>, info: &VideoInfo) -> Result<Self> {
        let header = Y4mHeader::from_info(info);
        header
            .write_to(&mut writer)
            .map_err(|e| Error::SinkOpen(format!("Failed to write header: {}", e)))?;

        Ok(Self {
            writer,
            header,
            frames_written: 0,
        })
    }
}

impl FrameSink for Y4mSink {
    fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()> {
        if frame.resolution() != self.header.resolution || frame.format != self.header.format {
            return Err(Error::SinkWrite(format!(
                "frame {} {:?} does not match stream {} {:?}",
                frame.resolution(),
                frame.format,
                self.header.resolution,
                self.header.format
            )));
        }

        for _ in 0..repeat {
            writeln!(self.writer, "{}", FRAME_MAGIC)
                .and_then(|_| self.writer.write_all(&frame.data))
                .map_err(|e| Error::SinkWrite(e.to_string()))?;
            self.frames_written += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::SinkWrite(format!("Failed to flush output: {}", e)))?;
        tracing::debug!("Y4M output finished: {} frames", self.frames_written);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FrameSource, Y4mSource};
    use crate::types::{FrameFormat, Framerate, Resolution};

    #[test]
    fn test_file_roundtrip_with_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.y4m");

        let mut info = VideoInfo::new(Resolution::new(2, 2), Framerate::new(24000, 1001), FrameFormat::Gray8);
        info.passthrough = vec!["Ip".into(), "A1:1".into()];

        let a = Frame::from_data(vec![1, 2, 3, 4], 2, 2, FrameFormat::Gray8).unwrap();
        let b = Frame::from_data(vec![9, 9, 9, 9], 2, 2, FrameFormat::Gray8).unwrap();

        let mut sink = Y4mSink::create(&path, &info).unwrap();
        sink.write(&a, 2).unwrap();
        sink.write(&b, 1).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.frames_written(), 3);
        drop(sink);

        let text = std::fs::read(&path).unwrap();
        assert!(text.starts_with(b"YUV4MPEG2 W2 H2 F24000:1001 Ip A1:1 Cmono\n"));

        let mut source = Y4mSource::open(&path).unwrap();
        assert_eq!(source.info().framerate, Framerate::new(24000, 1001));
        assert_eq!(source.info().passthrough, vec!["Ip", "A1:1", "Cmono"]);
        let frames: Vec<_> = std::iter::from_fn(|| source.next_frame().unwrap()).collect();
        assert_eq!(frames, vec![a.clone(), a, b]);
    }

    #[test]
    fn test_rejects_mismatched_frame() {
        let info = VideoInfo::new(Resolution::new(2, 2), Framerate::FPS_30, FrameFormat::Gray8);
        let mut sink = Y4mSink::from_writer(Box::new(Vec::<u8>::new()), &info).unwrap();
        let frame = Frame::new(4, 4, FrameFormat::Gray8);
        assert!(matches!(sink.write(&frame, 1), Err(Error::SinkWrite(_))));
    }
}
