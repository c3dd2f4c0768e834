//! Sliding window of pending distinct frames

use crate::error::{Error, Result};
use crate::types::{Frame, GrayImage};
use std::collections::VecDeque;

/// One detected distinct frame awaiting its final repeat count
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Original-resolution image written to the sink
    pub image: Frame,
    /// Downscaled grayscale copy used for differencing
    pub comparison: GrayImage,
    /// Times the image will be emitted, never below 1
    pub repeat_count: u32,
    /// Dissimilarity to the predecessor when the record was created
    pub priority: f64,
    /// Read position of the first frame of the run
    pub original_index: u64,
}

impl FrameRecord {
    pub fn new(image: Frame, comparison: GrayImage, priority: f64, original_index: u64) -> Self {
        Self {
            image,
            comparison,
            repeat_count: 1,
            priority,
            original_index,
        }
    }

    /// Below the duplicate target, so downsampling may drop it
    pub fn is_at_risk(&self, duplicate_count: u32) -> bool {
        self.repeat_count < duplicate_count
    }
}

/// Bounded, ordered collection of records
///
/// Records enter at the tail and leave from the head. The tail record is the
/// open one that absorbs matching frames.
#[derive(Debug)]
pub struct Window {
    records: VecDeque<FrameRecord>,
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::new(),
            capacity,
        }
    }

    /// Append at the tail
    pub fn admit(&mut self, record: FrameRecord) -> Result<()> {
        if self.is_full() {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.records.push_back(record);
        Ok(())
    }

    /// Oldest record
    pub fn head(&self) -> Option<&FrameRecord> {
        self.records.front()
    }

    /// Remove and return the oldest record
    pub fn evict(&mut self) -> Option<FrameRecord> {
        self.records.pop_front()
    }

    /// Most recently admitted record
    pub fn open(&self) -> Option<&FrameRecord> {
        self.records.back()
    }

    pub fn open_mut(&mut self) -> Option<&mut FrameRecord> {
        self.records.back_mut()
    }

    pub fn get(&self, index: usize) -> Option<&FrameRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FrameRecord> {
        self.records.get_mut(index)
    }

    /// Head to tail
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &FrameRecord> + ExactSizeIterator {
        self.records.iter()
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl DoubleEndedIterator<Item = &mut FrameRecord> + ExactSizeIterator {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of repeat counts of all held records
    pub fn total_repeats(&self) -> u64 {
        self.records.iter().map(|r| r.repeat_count as u64).sum()
    }

    /// Repeat counts head to tail
    pub fn repeat_counts(&self) -> Vec<u32> {
        self.records.iter().map(|r| r.repeat_count).collect()
    }
}
