//! Frame-slot scheduling
//!
//! Drives the frame differ, window, drift controller and slot reallocator in
//! lockstep over a frame source, handing each evicted record to the sink:
//!
//! ```text
//! Filling ──full / end of stream──> Correcting ──> Evicting ──> Filling
//!    │                                  │              │
//!    └─────────── cancelled ────────────┴── exhausted ─┴──> Flushing ──> Done
//! ```
//!
//! All mutable run state lives in the [`Scheduler`]. Telemetry only reads the
//! shared [`Progress`] counters.

use crate::config::SchedulerConfig;
use crate::differ::{FrameDiffer, ThresholdMode};
use crate::drift::{Correction, DriftController};
use crate::error::Result;
use crate::progress::Progress;
use crate::realloc::reallocate;
use crate::sink::FrameSink;
use crate::source::{FrameReader, FrameSource, SourceFrame};
use crate::types::Frame;
use crate::window::{FrameRecord, Window};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Orchestration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Reading frames into the window
    #[default]
    Filling,
    /// Drift correction or slot reallocation
    Correcting,
    /// Writing the head and admitting the held frame
    Evicting,
    /// Writing every remaining record unchanged
    Flushing,
    Done,
}

/// Totals of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames_read: u64,
    pub distinct_frames: u64,
    pub frames_written: u64,
    pub records_written: u64,
    /// Records written with fewer than `duplicate_count` copies
    pub under_target_records: u64,
    /// Phases that trimmed or padded counts to bound drift
    pub drift_corrections: u64,
    pub cancelled: bool,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames read ({} distinct), {} frames written from {} records, \
             {} under target, {} drift corrections{}",
            self.frames_read,
            self.distinct_frames,
            self.frames_written,
            self.records_written,
            self.under_target_records,
            self.drift_corrections,
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}

/// Non-matching frame waiting for a free window slot
#[derive(Debug)]
struct Pending {
    frame: SourceFrame,
    score: f64,
}

/// Online frame-slot scheduler
pub struct Scheduler {
    config: SchedulerConfig,
    window: Window,
    differ: FrameDiffer,
    drift: DriftController,
    pending: Option<Pending>,
    state: SchedulerState,
    exhausted: bool,
    cancel: Arc<AtomicBool>,
    progress: Arc<Progress>,
    frames_read: u64,
    distinct_frames: u64,
    /// Write position
    frames_written: u64,
    records_written: u64,
    under_target_records: u64,
    drift_corrections: u64,
    cancelled: bool,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            window: Window::new(config.buffer_size),
            differ: FrameDiffer::from_config(&config),
            drift: DriftController::new(config.adjustment_bound, config.buffer_size),
            config,
            pending: None,
            state: SchedulerState::Filling,
            exhausted: false,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Progress::new()),
            frames_read: 0,
            distinct_frames: 0,
            frames_written: 0,
            records_written: 0,
            under_target_records: 0,
            drift_corrections: 0,
            cancelled: false,
        }
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Share an externally owned telemetry object
    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Flag that stops the run at the next step boundary when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Last measured (or corrected) drift
    pub fn drift(&self) -> i64 {
        self.drift.drift()
    }

    pub fn threshold_mode(&self) -> ThresholdMode {
        self.differ.threshold().mode()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames_read: self.frames_read,
            distinct_frames: self.distinct_frames,
            frames_written: self.frames_written,
            records_written: self.records_written,
            under_target_records: self.under_target_records,
            drift_corrections: self.drift_corrections,
            cancelled: self.cancelled,
        }
    }

    /// Schedule the whole source into the sink
    pub fn run<S, K>(&mut self, reader: &mut FrameReader<S>, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource,
        K: FrameSink + ?Sized,
    {
        self.progress.begin(reader.info().total_frames);
        tracing::info!("Scheduling with {}", self.config);

        loop {
            match self.step(reader, sink) {
                Ok(SchedulerState::Done) => break,
                Ok(_) => {}
                Err(e) => {
                    if e.is_fatal() {
                        tracing::error!(
                            "Run aborted after {} frames written: {}",
                            self.frames_written,
                            e
                        );
                    }
                    return Err(e);
                }
            }
        }

        let summary = self.summary();
        tracing::info!("Scheduling finished: {}", summary);
        Ok(summary)
    }

    /// Advance the state machine by one state
    pub fn step<S, K>(&mut self, reader: &mut FrameReader<S>, sink: &mut K) -> Result<SchedulerState>
    where
        S: FrameSource,
        K: FrameSink + ?Sized,
    {
        self.state = match self.state {
            SchedulerState::Filling => self.fill(reader)?,
            SchedulerState::Correcting => {
                if self.check_cancelled() {
                    SchedulerState::Flushing
                } else {
                    self.correct();
                    SchedulerState::Evicting
                }
            }
            SchedulerState::Evicting => {
                self.evict(sink)?;
                if self.exhausted {
                    SchedulerState::Flushing
                } else {
                    SchedulerState::Filling
                }
            }
            SchedulerState::Flushing => {
                self.flush(sink)?;
                sink.finish()?;
                SchedulerState::Done
            }
            SchedulerState::Done => SchedulerState::Done,
        };
        Ok(self.state)
    }

    fn check_cancelled(&mut self) -> bool {
        if !self.cancelled && self.cancel.load(Ordering::Relaxed) {
            tracing::info!(
                "Cancelled after {} frames, flushing {} buffered records",
                self.frames_read,
                self.window.len()
            );
            self.cancelled = true;
        }
        self.cancelled
    }

    /// Read until the window is full, the source ends or the run is cancelled
    fn fill<S: FrameSource>(&mut self, reader: &mut FrameReader<S>) -> Result<SchedulerState> {
        loop {
            if self.check_cancelled() {
                return Ok(SchedulerState::Flushing);
            }
            if self.pending.is_some() {
                return Ok(SchedulerState::Correcting);
            }

            let Some(frame) = reader.read()? else {
                tracing::debug!("Source exhausted after {} frames", self.frames_read);
                self.exhausted = true;
                return Ok(if self.window.is_empty() {
                    SchedulerState::Flushing
                } else {
                    SchedulerState::Correcting
                });
            };
            self.frames_read += 1;
            self.progress.record_read();
            self.classify(frame)?;
        }
    }

    /// Group a frame into the open record, or start a new one
    fn classify(&mut self, frame: SourceFrame) -> Result<()> {
        let duplicate_count = self.config.duplicate_count;

        let Some(open) = self.window.open_mut() else {
            self.distinct_frames += 1;
            return self.open_record(frame, 0.0);
        };

        let comparison = self.differ.compare(&open.comparison, &frame.comparison)?;
        if comparison.matched {
            open.repeat_count += 1;
            if open.repeat_count == duplicate_count {
                self.differ.target_reached();
            }
            tracing::trace!(
                "Frame {} matches (score {:.3}), count {}",
                frame.index,
                comparison.score,
                open.repeat_count
            );
            return Ok(());
        }

        tracing::trace!("Frame {} is distinct (score {:.3})", frame.index, comparison.score);
        self.differ.record_opened();
        self.distinct_frames += 1;

        if self.window.is_full() {
            self.pending = Some(Pending {
                frame,
                score: comparison.score,
            });
            Ok(())
        } else {
            self.open_record(frame, comparison.score)
        }
    }

    fn open_record(&mut self, frame: SourceFrame, priority: f64) -> Result<()> {
        let record = FrameRecord::new(frame.image, frame.comparison, priority, frame.index);
        self.window.admit(record)
    }

    /// Bound drift, or repair the middle record when drift is in bound
    fn correct(&mut self) {
        let duplicate_count = self.config.duplicate_count;

        if let Some(drift) = self.drift.tick(self.frames_written, &self.window) {
            tracing::debug!("Drift measured: {}", drift);
        }

        match self.drift.correct(&mut self.window, duplicate_count) {
            Correction::WithinBound => {
                let target = self.config.repair_index(self.window.len());
                let outcome = reallocate(&mut self.window, target, duplicate_count);
                if outcome.moves() > 0 {
                    tracing::debug!(
                        "Reallocated {} slots to window position {} ({} from lower priority)",
                        outcome.moves(),
                        target,
                        outcome.priority_moves
                    );
                }
                if outcome.under_target {
                    tracing::debug!("Window position {} stays below its duplicate target", target);
                }
            }
            correction => {
                self.drift_corrections += 1;
                tracing::debug!(
                    "Drift correction {:?}, drift now {}",
                    correction,
                    self.drift.drift()
                );
            }
        }
    }

    /// Write the head, then admit the held frame
    fn evict<K: FrameSink + ?Sized>(&mut self, sink: &mut K) -> Result<()> {
        if let Some(record) = self.window.evict() {
            self.emit(sink, &record.image, record.repeat_count)?;
        }
        if let Some(pending) = self.pending.take() {
            self.open_record(pending.frame, pending.score)?;
        }
        Ok(())
    }

    /// Write every buffered record as is, then the held frame once
    fn flush<K: FrameSink + ?Sized>(&mut self, sink: &mut K) -> Result<()> {
        while let Some(record) = self.window.evict() {
            self.emit(sink, &record.image, record.repeat_count)?;
        }
        if let Some(pending) = self.pending.take() {
            self.emit(sink, &pending.frame.image, 1)?;
        }
        Ok(())
    }

    fn emit<K: FrameSink + ?Sized>(&mut self, sink: &mut K, image: &Frame, count: u32) -> Result<()> {
        sink.write(image, count)?;
        self.frames_written += count as u64;
        self.records_written += 1;
        if count < self.config.duplicate_count {
            self.under_target_records += 1;
        }
        self.progress.record_written(count as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::error::Error;
    use crate::sink::MemorySink;
    use crate::source::MemorySource;
    use crate::types::{FrameFormat, Framerate, Resolution, VideoInfo};

    /// 8x8 frame with a single lit column
    fn bar(column: u32) -> Frame {
        let mut frame = Frame::new(8, 8, FrameFormat::Gray8);
        for row in 0..8 {
            frame.data[(row * 8 + column % 8) as usize] = 255;
        }
        frame
    }

    fn reader(frames: Vec<Frame>) -> FrameReader<MemorySource> {
        let info = VideoInfo::new(Resolution::new(8, 8), Framerate::FPS_30, FrameFormat::Gray8);
        FrameReader::new(MemorySource::new(info, frames), 1)
    }

    fn config(buffer_size: usize) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_buffer_size(buffer_size)
            .with_comparison_scale(1)
    }

    #[test]
    fn test_empty_source() {
        let mut scheduler = Scheduler::new(config(3));
        let mut sink = MemorySink::new();
        let summary = scheduler.run(&mut reader(vec![]), &mut sink).unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(sink.is_finished());
        assert_eq!(scheduler.state(), SchedulerState::Done);
    }

    #[test]
    fn test_first_record_has_zero_priority() {
        let mut scheduler = Scheduler::new(config(3));
        let mut reader = reader(vec![bar(0), bar(1)]);
        let mut sink = MemorySink::new();

        assert_eq!(scheduler.step(&mut reader, &mut sink).unwrap(), SchedulerState::Correcting);
        let priorities: Vec<f64> = scheduler.window().iter().map(|r| r.priority).collect();
        assert_eq!(priorities[0], 0.0);
        assert!(priorities[1] > 100.0);
        assert_eq!(scheduler.drift(), 0);
    }

    #[test]
    fn test_threshold_relaxes_at_target() {
        let mut scheduler = Scheduler::new(config(4));
        let mut reader = reader(vec![bar(0), bar(0), bar(0), bar(1)]);
        let mut sink = MemorySink::new();

        scheduler.step(&mut reader, &mut sink).unwrap();
        // the distinct fourth frame put it back to strict
        assert_eq!(scheduler.threshold_mode(), ThresholdMode::Strict);
        assert_eq!(scheduler.window().repeat_counts(), vec![3, 1]);
    }

    #[test]
    fn test_held_frame_admitted_after_eviction() {
        let mut scheduler = Scheduler::new(config(2));
        let mut reader = reader(vec![bar(0), bar(1), bar(2), bar(3)]);
        let mut sink = MemorySink::new();

        assert_eq!(scheduler.step(&mut reader, &mut sink).unwrap(), SchedulerState::Correcting);
        assert_eq!(scheduler.window().len(), 2);
        assert_eq!(scheduler.frames_read(), 3);

        scheduler.step(&mut reader, &mut sink).unwrap();
        assert_eq!(scheduler.step(&mut reader, &mut sink).unwrap(), SchedulerState::Filling);
        let indices: Vec<u64> = scheduler.window().iter().map(|r| r.original_index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(sink.frames_written(), 1);
    }

    #[test]
    fn test_cancel_writes_held_frame_once() {
        let mut scheduler = Scheduler::new(config(2));
        let cancel = scheduler.cancel_handle();
        let mut reader = reader(vec![bar(0), bar(0), bar(1), bar(2), bar(3)]);
        let mut sink = MemorySink::new();

        // window [bar0 x2, bar1], bar2 held
        scheduler.step(&mut reader, &mut sink).unwrap();
        cancel.store(true, Ordering::Relaxed);

        let summary = scheduler.run(&mut reader, &mut sink).unwrap();
        assert!(summary.cancelled);
        assert_eq!(sink.repeat_counts(), vec![2, 1, 1]);
        assert_eq!(summary.frames_read, 4);
        assert_eq!(summary.frames_written, 4);
        assert_eq!(reader.frames_read(), 4);
    }

    #[test]
    fn test_progress_counters() {
        let progress = Arc::new(Progress::new());
        let mut scheduler = Scheduler::new(config(3)).with_progress(progress.clone());
        let mut sink = MemorySink::new();
        let frames = vec![bar(0), bar(0), bar(1), bar(2), bar(2), bar(3)];

        scheduler.run(&mut reader(frames), &mut sink).unwrap();
        assert_eq!(progress.frames_read(), 6);
        assert_eq!(progress.frames_written(), sink.frames_written());
        assert_eq!(progress.total_frames(), Some(6));
    }

    /// Passes writes through until the `fail_on`-th call, which errors
    struct FailingSink {
        inner: MemorySink,
        calls: u32,
        fail_on: u32,
    }

    impl FrameSink for FailingSink {
        fn write(&mut self, frame: &Frame, repeat: u32) -> Result<()> {
            self.calls += 1;
            if self.calls == self.fail_on {
                return Err(Error::SinkWrite("disk full".into()));
            }
            self.inner.write(frame, repeat)
        }

        fn finish(&mut self) -> Result<()> {
            self.inner.finish()
        }

        fn frames_written(&self) -> u64 {
            self.inner.frames_written()
        }
    }

    #[test]
    fn test_sink_failure_aborts_after_complete_records() {
        let mut scheduler = Scheduler::new(config(2));
        let mut reader = reader(vec![bar(0), bar(0), bar(1), bar(2), bar(3), bar(4)]);
        let mut sink = FailingSink {
            inner: MemorySink::new(),
            calls: 0,
            fail_on: 2,
        };

        let result = scheduler.run(&mut reader, &mut sink);
        assert!(matches!(result, Err(Error::SinkWrite(_))));
        assert_eq!(sink.inner.emissions().len(), 1);
        assert_eq!(scheduler.frames_written(), sink.inner.frames_written());
        assert_eq!(scheduler.summary().records_written, 1);
        assert!(!sink.inner.is_finished());
    }

    #[test]
    fn test_huge_buffer_size_does_not_preallocate() {
        let config = ConfigOverrides {
            buffer_size: Some(1e30),
            comparison_scale: Some(1.0),
            ..Default::default()
        }
        .resolve();
        assert_eq!(config.buffer_size, usize::MAX);

        let mut scheduler = Scheduler::new(config);
        let mut sink = MemorySink::new();
        let summary = scheduler
            .run(&mut reader(vec![bar(0), bar(0), bar(1)]), &mut sink)
            .unwrap();
        assert_eq!(summary.frames_written, 3);
        assert_eq!(sink.repeat_counts().iter().sum::<u32>(), 3);
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            frames_read: 10,
            distinct_frames: 4,
            frames_written: 10,
            records_written: 4,
            under_target_records: 1,
            drift_corrections: 0,
            cancelled: true,
        };
        let text = summary.to_string();
        assert!(text.starts_with("10 frames read (4 distinct)"));
        assert!(text.ends_with(", cancelled"));
    }
}
