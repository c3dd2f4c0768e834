//! In-memory frame source

use super::FrameSource;
use crate::error::Result;
use crate::types::{Frame, VideoInfo};
use std::collections::VecDeque;

/// Yields a prepared list of frames in order
#[derive(Debug, Clone)]
pub struct MemorySource {
    info: VideoInfo,
    frames: VecDeque<Frame>,
}

impl MemorySource {
    pub fn new(info: VideoInfo, frames: impl IntoIterator<Item = Frame>) -> Self {
        let frames: VecDeque<Frame> = frames.into_iter().collect();
        let info = info.with_total_frames(frames.len() as u64);
        Self { info, frames }
    }

    /// Frames not yet read
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}
