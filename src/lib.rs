//! framepace: frame-slot scheduling for near-duplicate video
//!
//! Converts a stream of visually near-duplicate frames into a schedule of
//! per-frame repeat counts, so that downsampling the result later keeps every
//! distinct frame.
//!
//! # Features
//!
//! - **Differencing**: standard deviation of the absolute difference map,
//!   matched under strict/relaxed thresholds with hysteresis
//! - **Scheduling**: bounded sliding window, priority-based slot
//!   reallocation and periodic drift correction
//! - **I/O**: YUV4MPEG2 streams, in-memory frames, and any FFmpeg container
//!   with the `ffmpeg` feature
//!
//! # Example
//!
//! ```rust,no_run
//! use framepace::{open_sink, open_source, FrameReader, Scheduler, SchedulerConfig};
//! use std::path::Path;
//!
//! fn main() -> framepace::Result<()> {
//!     let config = SchedulerConfig::default().with_duplicate_count(2);
//!
//!     let source = open_source(Path::new("input.y4m"))?;
//!     let mut sink = open_sink(Path::new("output.y4m"), source.info())?;
//!     let mut reader = FrameReader::new(source, config.comparison_scale);
//!
//!     let summary = Scheduler::new(config).run(&mut reader, &mut sink)?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod differ;
pub mod drift;
pub mod error;
pub mod processing;
pub mod progress;
pub mod realloc;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod types;
pub mod window;
pub mod y4m;

// Re-exports for convenience
pub use config::{ConfigOverrides, SchedulerConfig};
pub use differ::{FrameDiffer, ThresholdMode, ThresholdState};
pub use error::{Error, Result};
pub use progress::{Progress, ProgressReporter};
pub use scheduler::{RunSummary, Scheduler, SchedulerState};
pub use sink::{open_sink, FrameSink, MemorySink};
pub use source::{open_source, FrameReader, FrameSource, MemorySource};
pub use types::{Frame, FrameFormat, Framerate, GrayImage, Resolution, VideoInfo};
pub use window::{FrameRecord, Window};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
