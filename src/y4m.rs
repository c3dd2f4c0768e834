//! YUV4MPEG2 stream headers
//!
//! A stream starts with `YUV4MPEG2` followed by space-separated tagged
//! parameters and a newline. Each frame is `FRAME[ params]\n` plus raw planes.

use crate::error::{Error, Result};
use crate::types::{FrameFormat, Framerate, Resolution, VideoInfo};
use std::io::{BufRead, Read, Write};

pub const STREAM_MAGIC: &str = "YUV4MPEG2";
pub const FRAME_MAGIC: &str = "FRAME";

/// Longest header line accepted
const MAX_HEADER_LEN: usize = 4096;

/// Parsed stream header
#[derive(Debug, Clone, PartialEq)]
pub struct Y4mHeader {
    pub resolution: Resolution,
    pub framerate: Framerate,
    pub format: FrameFormat,
    /// Tags other than W, H, F and C, kept verbatim
    pub extra: Vec<String>,
    colorspace_tag: Option<String>,
}

impl Y4mHeader {
    pub fn new(resolution: Resolution, framerate: Framerate, format: FrameFormat) -> Self {
        Self {
            resolution,
            framerate,
            format,
            extra: Vec::new(),
            colorspace_tag: None,
        }
    }

    /// Header for a stream with the given properties
    ///
    /// A `C` token in the passthrough list overrides the colour space tag
    /// derived from the pixel format.
    pub fn from_info(info: &VideoInfo) -> Self {
        let mut header = Self::new(info.resolution, info.framerate, info.format);
        for token in &info.passthrough {
            match token.strip_prefix('C') {
                Some(tag) => header.colorspace_tag = Some(tag.to_string()),
                None => header.extra.push(token.clone()),
            }
        }
        header
    }

    /// Stream properties, with the extra tags and the colour space tag as
    /// passthrough
    pub fn video_info(&self) -> VideoInfo {
        let mut info = VideoInfo::new(self.resolution, self.framerate, self.format);
        info.passthrough = self.extra.clone();
        if let Some(tag) = &self.colorspace_tag {
            info.passthrough.push(format!("C{}", tag));
        }
        info
    }

    /// Parse a header line (without the trailing newline)
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_ascii_whitespace();
        if tokens.next() != Some(STREAM_MAGIC) {
            return Err(Error::Y4m("missing YUV4MPEG2 signature".into()));
        }

        let mut width = None;
        let mut height = None;
        let mut framerate = None;
        let mut colorspace_tag = None;
        let mut extra = Vec::new();

        for token in tokens {
            let mut chars = token.chars();
            let tag = chars.next();
            let value = chars.as_str();
            match tag {
                Some('W') => width = Some(parse_dimension("width", value)?),
                Some('H') => height = Some(parse_dimension("height", value)?),
                Some('F') => framerate = Some(parse_ratio(value)?),
                Some('C') => colorspace_tag = Some(value.to_string()),
                _ => extra.push(token.to_string()),
            }
        }

        let width = width.ok_or_else(|| Error::Y4m("missing W parameter".into()))?;
        let height = height.ok_or_else(|| Error::Y4m("missing H parameter".into()))?;
        let format = match colorspace_tag.as_deref() {
            None => FrameFormat::Yuv420p,
            Some(tag) => colorspace_format(tag)?,
        };

        Ok(Self {
            resolution: Resolution::new(width, height),
            framerate: framerate.unwrap_or_default(),
            format,
            extra,
            colorspace_tag,
        })
    }

    /// Read and parse the header from the start of a stream
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let line = read_line(reader)?
            .ok_or_else(|| Error::Y4m("empty stream".into()))?;
        let text = std::str::from_utf8(&line)
            .map_err(|_| Error::Y4m("header is not ASCII".into()))?;
        Self::parse(text)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(writer, "{}", self)
    }

    /// Bytes of raw picture data per frame
    pub fn frame_size(&self) -> usize {
        self.format
            .frame_size(self.resolution.width, self.resolution.height)
    }

    fn colorspace(&self) -> String {
        match &self.colorspace_tag {
            Some(tag) => tag.clone(),
            None => match self.format {
                FrameFormat::Gray8 => "mono".into(),
                FrameFormat::Yuv420p => "420jpeg".into(),
                FrameFormat::Yuv422p => "422".into(),
                FrameFormat::Yuv444p | FrameFormat::Rgb24 => "444".into(),
            },
        }
    }
}

impl std::fmt::Display for Y4mHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} W{} H{} F{}:{}",
            STREAM_MAGIC,
            self.resolution.width,
            self.resolution.height,
            self.framerate.num,
            self.framerate.den
        )?;
        for token in &self.extra {
            write!(f, " {}", token)?;
        }
        write!(f, " C{}", self.colorspace())
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Y4m(format!("invalid {}: {}", name, value))),
    }
}

fn parse_ratio(value: &str) -> Result<Framerate> {
    let (num, den) = value
        .split_once(':')
        .ok_or_else(|| Error::Y4m(format!("invalid frame rate: {}", value)))?;
    match (num.parse::<u32>(), den.parse::<u32>()) {
        (Ok(num), Ok(den)) if den > 0 => Ok(Framerate::new(num, den)),
        _ => Err(Error::Y4m(format!("invalid frame rate: {}", value))),
    }
}

fn colorspace_format(tag: &str) -> Result<FrameFormat> {
    match tag {
        "420" | "420jpeg" | "420paldv" | "420mpeg2" => Ok(FrameFormat::Yuv420p),
        "422" => Ok(FrameFormat::Yuv422p),
        "444" => Ok(FrameFormat::Yuv444p),
        "mono" => Ok(FrameFormat::Gray8),
        other => Err(Error::UnsupportedFormat(format!("Y4M colorspace C{}", other))),
    }
}

/// Read one `\n`-terminated line, `None` at a clean end of stream
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_HEADER_LEN as u64)
        .read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        return Err(Error::Y4m("unterminated header line".into()));
    }
    line.pop();
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_header() {
        let header =
            Y4mHeader::parse("YUV4MPEG2 W640 H360 F60000:1001 Ip A1:1 C420jpeg XYSCSS=420JPEG")
                .unwrap();
        assert_eq!(header.resolution, Resolution::new(640, 360));
        assert_eq!(header.framerate, Framerate::new(60000, 1001));
        assert_eq!(header.format, FrameFormat::Yuv420p);
        assert_eq!(header.extra, vec!["Ip", "A1:1", "XYSCSS=420JPEG"]);
        assert_eq!(header.frame_size(), 640 * 360 * 3 / 2);
    }

    #[test]
    fn test_defaults_to_420() {
        let header = Y4mHeader::parse("YUV4MPEG2 W4 H2 F30:1").unwrap();
        assert_eq!(header.format, FrameFormat::Yuv420p);
        assert_eq!(header.to_string(), "YUV4MPEG2 W4 H2 F30:1 C420jpeg");
    }

    #[test]
    fn test_roundtrip_keeps_tags() {
        let line = "YUV4MPEG2 W8 H8 F25:1 It A128:117 Cmono";
        let header = Y4mHeader::parse(line).unwrap();
        assert_eq!(header.format, FrameFormat::Gray8);
        assert_eq!(header.to_string(), line);
    }

    #[test]
    fn test_colorspace_survives_video_info() {
        let header = Y4mHeader::parse("YUV4MPEG2 W8 H8 F25:1 Ip C420paldv").unwrap();
        let info = header.video_info();
        assert_eq!(info.passthrough, vec!["Ip", "C420paldv"]);
        assert_eq!(
            Y4mHeader::from_info(&info).to_string(),
            "YUV4MPEG2 W8 H8 F25:1 Ip C420paldv"
        );
    }

    #[test]
    fn test_rejects_bad_headers() {
        assert!(Y4mHeader::parse("MPEG W8 H8").is_err());
        assert!(Y4mHeader::parse("YUV4MPEG2 H8").is_err());
        assert!(Y4mHeader::parse("YUV4MPEG2 W0 H8").is_err());
        assert!(Y4mHeader::parse("YUV4MPEG2 W8 H8 F30:0").is_err());
        assert!(matches!(
            Y4mHeader::parse("YUV4MPEG2 W8 H8 C420p10"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_read_line() {
        let mut input: &[u8] = b"FRAME\nrest";
        assert_eq!(read_line(&mut input).unwrap(), Some(b"FRAME".to_vec()));
        let mut empty: &[u8] = b"";
        assert_eq!(read_line(&mut empty).unwrap(), None);
        let mut cut: &[u8] = b"FRA";
        assert!(read_line(&mut cut).is_err());
    }
}
