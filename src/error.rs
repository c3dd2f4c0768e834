//! Error types for framepace

use thiserror::Error;

/// Result type alias for framepace operations
pub type Result<T> = std::result::Result<T, Error>;

/// framepace error type
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("Failed to open source: {0}")]
    SourceOpen(String),

    #[error("Decoding failed: {0}")]
    Decode(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    // Sink errors
    #[error("Failed to open sink: {0}")]
    SinkOpen(String),

    #[error("Sink write failed: {0}")]
    SinkWrite(String),

    // Stream format errors
    #[error("Y4M stream error: {0}")]
    Y4m(String),

    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    // Scheduling errors
    #[error("Comparison images differ in size: {left} vs {right}")]
    DimensionMismatch { left: String, right: String },

    #[error("Window already holds {capacity} records")]
    CapacityExceeded { capacity: usize },

    // FFmpeg errors
    #[cfg(feature = "ffmpeg")]
    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    // General errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error ends the run
    ///
    /// Source and sink failures abort processing; each eviction is a complete
    /// unit of work so no record is left half-written.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SourceOpen(_)
                | Error::Decode(_)
                | Error::SinkOpen(_)
                | Error::SinkWrite(_)
                | Error::Y4m(_)
                | Error::Io(_)
        )
    }
}
