//! FFmpeg frame sink
//!
//! Re-encodes the scheduled frames with the source's codec, dimensions and
//! frame rate. Each repeat is a separate encoded frame with its own pts.

use super::FrameSink;
use crate::error::{Error, Result};
use crate::types::{Frame, FrameFormat, VideoInfo};
use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec::Id as CodecId;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as Scaler, Flags as ScalerFlags};
use ffmpeg_next::Dictionary;

pub struct FfmpegSink {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: Option<Scaler>,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    info: VideoInfo,
    pts: i64,
    frames_written: u64,
    finished: bool,
}

impl FfmpegSink {
    pub fn create(path: &Path, info: &VideoInfo) -> Result<Self> {
        ffmpeg::init().map_err(|e| Error::FFmpeg(e.to_string()))?;

        let mut output = ffmpeg::format::output(&path)
            .map_err(|e| Error::SinkOpen(format!("{}: {}", path.display(), e)))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec_id = Self::source_codec(info);
        let codec = ffmpeg::encoder::find(codec_id)
            .ok_or_else(|| Error::SinkOpen(format!("No encoder for codec {:?}", codec_id)))?;

        let framerate = info.framerate;
        let time_base = ffmpeg::Rational::new(framerate.den as i32, framerate.num.max(1) as i32);

        let context = ffmpeg::codec::context::Context::new_with_codec(codec);
        let mut encoder = context
            .encoder()
            .video()
            .map_err(|e| Error::SinkOpen(e.to_string()))?;
        encoder.set_width(info.resolution.width);
        encoder.set_height(info.resolution.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(
            framerate.num as i32,
            framerate.den as i32,
        )));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder
            .open_with(Dictionary::new())
            .map_err(|e| Error::SinkOpen(format!("Failed to open encoder: {}", e)))?;

        let stream_index = {
            let mut stream = output
                .add_stream(codec)
                .map_err(|e| Error::SinkOpen(format!("Failed to add stream: {}", e)))?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            stream.index()
        };

        output
            .write_header()
            .map_err(|e| Error::SinkOpen(format!("Failed to write header: {}", e)))?;

        let scaler = match info.format {
            FrameFormat::Yuv420p => None,
            other => Some(
                Scaler::get(
                    Self::pixel(other),
                    info.resolution.width,
                    info.resolution.height,
                    Pixel::YUV420P,
                    info.resolution.width,
                    info.resolution.height,
                    ScalerFlags::BILINEAR,
                )
                .map_err(|e| Error::FFmpeg(format!("Failed to create scaler: {}", e)))?,
            ),
        };

        tracing::info!(
            "FFmpeg output initialized: {} ({:?}, {} @ {})",
            path.display(),
            codec_id,
            info.resolution,
            info.framerate
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            time_base,
            info: info.clone(),
            pts: 0,
            frames_written: 0,
            finished: false,
        })
    }

    /// Codec of the input stream, H.264 when unknown
    fn source_codec(info: &VideoInfo) -> CodecId {
        info.codec
            .as_deref()
            .and_then(ffmpeg::decoder::find_by_name)
            .map(|codec| codec.id())
            .unwrap_or(CodecId::H264)
    }

    fn pixel(format: FrameFormat) -> Pixel {
        match format {
            FrameFormat::Gray8 => Pixel::GRAY8,
            FrameFormat::Yuv420p => Pixel::YUV420P,
            FrameFormat::Yuv422p => Pixel::YUV422P,
            FrameFormat::Yuv444p => Pixel::YUV444P,
            FrameFormat::Rgb24 => Pixel::RGB24,
        }
    }

    /// Build an FFmpeg frame in the encoder's pixel format
    fn video_frame(&mut self, frame: &Frame) -> Result<ffmpeg::frame::Video> {
        let mut video = ffmpeg::frame::Video::new(Self::pixel(frame.format), frame.width, frame.height);

        // Copy plane rows into the stride-padded FFmpeg buffers
        let mut offset = 0;
        for (plane, (row_bytes, rows)) in frame.format.planes(frame.width, frame.height).into_iter().enumerate() {
            let stride = video.stride(plane);
            let dst = video.data_mut(plane);
            for row in 0..rows {
                dst[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&frame.data[offset..offset + row_bytes]);
                offset += row_bytes;
            }
        }

        match self.scaler.as_mut() {
            None => Ok(video),
            Some(scaler) => {
                let mut converted = ffmpeg::frame::Video::empty();
                scaler
                    .run(&video, &mut converted)
                    .map_err(|e| Error::SinkWrite(format!("Scaling failed: {}", e)))?;
                Ok(converted)
            }
        }
    }

    /// Write every packet the encoder has ready
    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(self.stream_index);
                    let stream_time_base = self
                        .output
                        .stream(self.stream_index)
                        .map(|s| s.time_base())
                        .unwrap_or(self.time_base);
                    packet.rescale_ts(self.time_base, stream_time_base);
                    packet
                        .write_interleaved(&mut self.output)
                        .map_err(|e| Error::SinkWrite(format!("Failed to write packet: {}", e)))?;
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => return Ok(()),
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) => return Err(Error::SinkWrite(format!("Failed to receive packet: {}", e))),
            }
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()> {
        if frame.resolution() != self.info.resolution {
            return Err(Error::SinkWrite(format!(
                "frame {} does not match stream {}",
                frame.resolution(),
                self.info.resolution
            )));
        }

        let mut video = self.video_frame(frame)?;
        for _ in 0..repeat {
            video.set_pts(Some(self.pts));
            self.encoder
                .send_frame(&video)
                .map_err(|e| Error::SinkWrite(format!("Failed to send frame: {}", e)))?;
            self.pts += 1;
            self.frames_written += 1;
            self.drain_packets()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.encoder
            .send_eof()
            .map_err(|e| Error::SinkWrite(format!("Failed to flush encoder: {}", e)))?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .map_err(|e| Error::SinkWrite(format!("Failed to write trailer: {}", e)))?;
        self.finished = true;

        tracing::info!("FFmpeg output finished: {} frames", self.frames_written);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
