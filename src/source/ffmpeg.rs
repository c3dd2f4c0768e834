//! FFmpeg frame source
//!
//! Decodes the best video stream of any container FFmpeg can read and
//! converts every frame to planar YUV 4:2:0.

use super::FrameSource;
use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat, Framerate, Resolution, VideoInfo};
use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as Scaler, Flags as ScalerFlags};

pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Scaler,
    stream_index: usize,
    info: VideoInfo,
    decoded: ffmpeg::frame::Video,
    eof_sent: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::FFmpeg(e.to_string()))?;

        let input = ffmpeg::format::input(&path)
            .map_err(|e| Error::SourceOpen(format!("{}: {}", path.display(), e)))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| Error::SourceOpen(format!("{}: no video stream", path.display())))?;
        let stream_index = stream.index();
        let rate = stream.avg_frame_rate();
        let frames = stream.frames();

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| Error::SourceOpen(format!("Failed to read codec parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| Error::SourceOpen(format!("Failed to open decoder: {}", e)))?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = Scaler::get(
            decoder.format(),
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ScalerFlags::BILINEAR,
        )
        .map_err(|e| Error::FFmpeg(format!("Failed to create scaler: {}", e)))?;

        let framerate = if rate.numerator() > 0 && rate.denominator() > 0 {
            Framerate::new(rate.numerator() as u32, rate.denominator() as u32)
        } else {
            Framerate::default()
        };

        let mut info = VideoInfo::new(
            Resolution::new(width, height),
            framerate,
            FrameFormat::Yuv420p,
        );
        info.codec = Some(decoder.id().name().to_string());
        if frames > 0 {
            info.total_frames = Some(frames as u64);
        }

        tracing::info!(
            "FFmpeg source opened: {} ({}, {} @ {})",
            path.display(),
            decoder.id().name(),
            info.resolution,
            info.framerate
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            info,
            decoded: ffmpeg::frame::Video::empty(),
            eof_sent: false,
        })
    }

    /// Convert the last decoded frame to a packed YUV 4:2:0 buffer
    fn convert(&mut self) -> Result<Frame> {
        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&self.decoded, &mut yuv)
            .map_err(|e| Error::Decode(format!("Scaling failed: {}", e)))?;

        let Resolution { width, height } = self.info.resolution;
        let format = FrameFormat::Yuv420p;
        let mut data = Vec::with_capacity(format.frame_size(width, height));

        // Copy row by row, planes may be padded to their stride
        for (plane, (row_bytes, rows)) in format.planes(width, height).into_iter().enumerate() {
            let stride = yuv.stride(plane);
            let src = yuv.data(plane);
            for row in 0..rows {
                let start = row * stride;
                data.extend_from_slice(&src[start..start + row_bytes]);
            }
        }

        Frame::from_data(data, width, height, format)
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => return self.convert().map(Some),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {}
                Err(e) => return Err(Error::Decode(format!("Failed to receive frame: {}", e))),
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|e| Error::Decode(format!("Failed to send packet: {}", e)))?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| Error::Decode(format!("Failed to flush decoder: {}", e)))?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
            }
        }
    }
}
