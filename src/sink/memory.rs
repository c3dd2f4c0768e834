//! In-memory frame sink

use super::FrameSink;
use crate::error::Result;
use crate::types::Frame;

/// Records every write for inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    emissions: Vec<(Frame, u32)>,
    frames_written: u64,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes in order, as `(image, repeat)`
    pub fn emissions(&self) -> &[(Frame, u32)] {
        &self.emissions
    }

    pub fn repeat_counts(&self) -> Vec<u32> {
        self.emissions.iter().map(|(_, repeat)| *repeat).collect()
    }

    /// Emitted frames with repeats expanded
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.emissions
            .iter()
            .flat_map(|(frame, repeat)| std::iter::repeat(frame).take(*repeat as usize))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()> {
        self.emissions.push((frame.clone(), repeat));
        self.frames_written += repeat as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
