//! YUV4MPEG2 frame source
//!
//! Reads uncompressed planar frames from a `.y4m` file or stdin. Any
//! container can be fed in by piping through `ffmpeg -f yuv4mpegpipe`.

use super::FrameSource;
use crate::error::{Error, Result};
use crate::types::{Frame, VideoInfo};
use crate::y4m::{read_line, Y4mHeader, FRAME_MAGIC};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

pub struct Y4mSource {
    reader: Box<dyn BufRead>,
    header: Y4mHeader,
    info: VideoInfo,
}

impl Y4mSource {
    /// Open a file, or stdin for `-`
    pub fn open(path: &Path) -> Result<Self> {
        let reader: Box<dyn BufRead> = if path.as_os_str() == "-" {
            Box::new(BufReader::new(std::io::stdin()))
        } else {
            let file = File::open(path)
                .map_err(|e| Error::SourceOpen(format!("{}: {}", path.display(), e)))?;
            Box::new(BufReader::new(file))
        };
        Self::from_reader(reader)
            .map_err(|e| Error::SourceOpen(format!("{}: {}", path.display(), e)))
    }

    /// Read the stream header from an already open reader
    pub fn from_reader(mut reader: Box<dyn BufRead>) -> Result<Self> {
        let header = Y4mHeader::read_from(&mut reader)?;
        let info = header.video_info();

        tracing::debug!(
            "Y4M stream: {} @ {} ({:?}, {} bytes per frame)",
            header.resolution,
            header.framerate,
            header.format,
            header.frame_size()
        );

        Ok(Self {
            reader,
            header,
            info,
        })
    }

    pub fn header(&self) -> &Y4mHeader {
        &self.header
    }
}

impl FrameSource for Y4mSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(line) = read_line(&mut self.reader)? else {
            return Ok(None);
        };
        if !line.starts_with(FRAME_MAGIC.as_bytes()) {
            return Err(Error::Y4m("expected FRAME marker".into()));
        }

        let mut data = vec![0u8; self.header.frame_size()];
        if let Err(e) = self.reader.read_exact(&mut data) {
            return Err(match e.kind() {
                ErrorKind::UnexpectedEof => Error::Y4m("truncated frame".into()),
                _ => Error::Io(e),
            });
        }

        let resolution = self.header.resolution;
        Frame::from_data(data, resolution.width, resolution.height, self.header.format).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameFormat, Resolution};
    use std::io::Cursor;

    fn source(bytes: Vec<u8>) -> Result<Y4mSource> {
        Y4mSource::from_reader(Box::new(Cursor::new(bytes)))
    }

    #[test]
    fn test_reads_frames() {
        let mut bytes = b"YUV4MPEG2 W2 H2 F25:1 Cmono\n".to_vec();
        bytes.extend_from_slice(b"FRAME\n\x01\x02\x03\x04");
        bytes.extend_from_slice(b"FRAME Ixyz\n\x05\x06\x07\x08");

        let mut src = source(bytes).unwrap();
        assert_eq!(src.info().resolution, Resolution::new(2, 2));
        assert_eq!(src.info().format, FrameFormat::Gray8);

        assert_eq!(src.next_frame().unwrap().unwrap().data, vec![1, 2, 3, 4]);
        assert_eq!(src.next_frame().unwrap().unwrap().data, vec![5, 6, 7, 8]);
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_truncated_frame() {
        let mut bytes = b"YUV4MPEG2 W2 H2 F25:1 Cmono\n".to_vec();
        bytes.extend_from_slice(b"FRAME\n\x01\x02");
        let mut src = source(bytes).unwrap();
        assert!(matches!(src.next_frame(), Err(Error::Y4m(_))));
    }

    #[test]
    fn test_missing_marker() {
        let bytes = b"YUV4MPEG2 W2 H2 F25:1 Cmono\nJUNK\n".to_vec();
        let mut src = source(bytes).unwrap();
        assert!(src.next_frame().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Y4mSource::open(Path::new("/nonexistent/clip.y4m")).err().unwrap();
        assert!(matches!(err, Error::SourceOpen(_)));
    }
}
