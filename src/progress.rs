//! Progress telemetry
//!
//! The scheduler bumps plain atomic counters; a reporter thread samples them
//! once per interval and logs throughput. Nothing here feeds back into
//! scheduling.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shared, read-mostly run counters
#[derive(Debug, Default)]
pub struct Progress {
    frames_read: AtomicU64,
    frames_written: AtomicU64,
    /// Zero when the source does not report a length
    total_frames: AtomicU64,
    started: Mutex<Option<Instant>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a run
    pub fn begin(&self, total_frames: Option<u64>) {
        self.total_frames
            .store(total_frames.unwrap_or(0), Ordering::Relaxed);
        *self.started.lock() = Some(Instant::now());
    }

    pub fn record_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, frames: u64) {
        self.frames_written.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    pub fn total_frames(&self) -> Option<u64> {
        match self.total_frames.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    /// Time since `begin`, zero before it
    pub fn elapsed(&self) -> Duration {
        let started = *self.started.lock();
        started.map(|start| start.elapsed()).unwrap_or_default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            frames_read: self.frames_read(),
            frames_written: self.frames_written(),
            total_frames: self.total_frames(),
            elapsed: self.elapsed(),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub frames_read: u64,
    pub frames_written: u64,
    pub total_frames: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Share of the source consumed, in percent
    pub fn percent(&self) -> Option<f64> {
        self.total_frames
            .map(|total| 100.0 * self.frames_read as f64 / total as f64)
    }
}

/// One formatted progress line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub frame: u64,
    pub fps: f64,
    /// Source timestamp reached, in seconds
    pub time_secs: f64,
    /// Processing speed relative to realtime
    pub speed: f64,
    pub percent: Option<f64>,
    pub runtime_secs: f64,
}

impl std::fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame= {}  fps= {:.2}  time= {:.2}s  speed= {:.2}x  ",
            self.frame, self.fps, self.time_secs, self.speed
        )?;
        if let Some(percent) = self.percent {
            write!(f, "total= {:.2}%  ", percent)?;
        }
        write!(f, "runtime= {:.2}s", self.runtime_secs)
    }
}

/// Turns successive snapshots into smoothed rates
///
/// Each rate is the mean of the instantaneous value and the previous report.
#[derive(Debug, Clone)]
pub struct RateTracker {
    source_fps: f64,
    last_frames: u64,
    last_elapsed: Duration,
    last_fps: f64,
    last_speed: f64,
}

impl RateTracker {
    pub fn new(source_fps: f64) -> Self {
        Self {
            source_fps,
            last_frames: 0,
            last_elapsed: Duration::ZERO,
            last_fps: 0.0,
            last_speed: 0.0,
        }
    }

    pub fn update(&mut self, snapshot: ProgressSnapshot) -> ProgressReport {
        let frames = snapshot.frames_read.saturating_sub(self.last_frames) as f64;
        let dt = snapshot
            .elapsed
            .saturating_sub(self.last_elapsed)
            .as_secs_f64();

        let (fps, speed) = if dt > 0.0 {
            let instant_fps = frames / dt;
            let instant_speed = if self.source_fps > 0.0 {
                instant_fps / self.source_fps
            } else {
                0.0
            };
            (
                (instant_fps + self.last_fps) / 2.0,
                (instant_speed + self.last_speed) / 2.0,
            )
        } else {
            (self.last_fps, self.last_speed)
        };

        self.last_frames = snapshot.frames_read;
        self.last_elapsed = snapshot.elapsed;
        self.last_fps = fps;
        self.last_speed = speed;

        ProgressReport {
            frame: snapshot.frames_read,
            fps,
            time_secs: if self.source_fps > 0.0 {
                snapshot.frames_read as f64 / self.source_fps
            } else {
                0.0
            },
            speed,
            percent: snapshot.percent(),
            runtime_secs: snapshot.elapsed.as_secs_f64(),
        }
    }
}

/// Background thread logging progress at a fixed interval
pub struct ProgressReporter {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn spawn(progress: Arc<Progress>, source_fps: f64, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::spawn(move || report_loop(progress, source_fps, interval, stop_rx));
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stop the thread and log the final tally
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.send(());
            if handle.join().is_err() {
                tracing::warn!("Progress reporter panicked");
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn report_loop(progress: Arc<Progress>, source_fps: f64, interval: Duration, stop_rx: Receiver<()>) {
    let ticker = crossbeam_channel::tick(interval);
    let mut rates = RateTracker::new(source_fps);

    loop {
        crossbeam_channel::select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                let report = rates.update(progress.snapshot());
                tracing::info!("{}", report);
            }
        }
    }

    let snapshot = progress.snapshot();
    tracing::info!(
        "{} frames processed in {:.2} seconds",
        snapshot.frames_read,
        snapshot.elapsed.as_secs_f64()
    );
}
