//! Configuration types for framepace

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BUFFER_SIZE: usize = 7;
pub const DEFAULT_COMPARISON_SCALE: u32 = 4;
pub const DEFAULT_ADJUSTMENT_BOUND: i64 = 5;
pub const DEFAULT_DUPLICATE_COUNT: u32 = 2;
pub const DEFAULT_THRESHOLD_STRICT: f64 = 0.5;

/// Resolved scheduler settings; every value is positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Distinct frames held in the sliding window
    pub buffer_size: usize,
    /// Factor by which frames are shrunk before differencing (1 disables)
    pub comparison_scale: u32,
    /// Largest tolerated offset between write and read positions
    pub adjustment_bound: i64,
    /// Copies a distinct frame needs to survive downsampling
    pub duplicate_count: u32,
    /// Dissimilarity cutoff while the open record is below target
    pub threshold_strict: f64,
    /// Dissimilarity cutoff once the open record reached its target
    pub threshold_relaxed: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            comparison_scale: DEFAULT_COMPARISON_SCALE,
            adjustment_bound: DEFAULT_ADJUSTMENT_BOUND,
            duplicate_count: DEFAULT_DUPLICATE_COUNT,
            threshold_strict: DEFAULT_THRESHOLD_STRICT,
            threshold_relaxed: DEFAULT_THRESHOLD_STRICT / 2.0,
        }
    }
}

impl SchedulerConfig {
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    pub fn with_comparison_scale(mut self, scale: u32) -> Self {
        self.comparison_scale = scale.max(1);
        self
    }

    pub fn with_adjustment_bound(mut self, bound: i64) -> Self {
        self.adjustment_bound = bound.max(1);
        self
    }

    pub fn with_duplicate_count(mut self, count: u32) -> Self {
        self.duplicate_count = count.max(1);
        self
    }

    /// Set both cutoffs; relaxed follows as half of strict
    pub fn with_threshold_strict(mut self, strict: f64) -> Self {
        self.threshold_strict = strict;
        self.threshold_relaxed = strict / 2.0;
        self
    }

    pub fn with_threshold_relaxed(mut self, relaxed: f64) -> Self {
        self.threshold_relaxed = relaxed;
        self
    }

    /// Window index whose record gets repaired each cycle
    ///
    /// The middle of the records actually held, so a window still short of
    /// `buffer_size` at the end of the stream is addressed correctly.
    pub fn repair_index(&self, held: usize) -> usize {
        held.min(self.buffer_size) / 2
    }
}

impl std::fmt::Display for SchedulerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "buffer_size={}, comparison_scale={}, adjustment_bound={}, duplicate_count={}, \
             threshold_strict={:.2}, threshold_relaxed={:.2}",
            self.buffer_size,
            self.comparison_scale,
            self.adjustment_bound,
            self.duplicate_count,
            self.threshold_strict,
            self.threshold_relaxed
        )
    }
}

/// Unvalidated option values as typed by the user
///
/// Every option is read as a real number, integer options are truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub buffer_size: Option<f64>,
    pub comparison_scale: Option<f64>,
    pub adjustment_bound: Option<f64>,
    pub duplicate_count: Option<f64>,
    pub threshold_strict: Option<f64>,
    pub threshold_relaxed: Option<f64>,
}

impl ConfigOverrides {
    /// Load overrides from a TOML file with option names as keys
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Layer `other` on top of `self`; values present in `other` win
    pub fn merge(self, other: ConfigOverrides) -> Self {
        Self {
            buffer_size: other.buffer_size.or(self.buffer_size),
            comparison_scale: other.comparison_scale.or(self.comparison_scale),
            adjustment_bound: other.adjustment_bound.or(self.adjustment_bound),
            duplicate_count: other.duplicate_count.or(self.duplicate_count),
            threshold_strict: other.threshold_strict.or(self.threshold_strict),
            threshold_relaxed: other.threshold_relaxed.or(self.threshold_relaxed),
        }
    }

    /// Validate into a `SchedulerConfig`
    ///
    /// Non-positive values are rejected with a warning and the default is
    /// used instead; this never fails.
    pub fn resolve(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();

        let buffer_size = positive("buffer_size", self.buffer_size)
            .map(|v| (v as usize).max(1))
            .unwrap_or(defaults.buffer_size);
        let comparison_scale = positive("comparison_scale", self.comparison_scale)
            .map(|v| (v as u32).max(1))
            .unwrap_or(defaults.comparison_scale);
        let adjustment_bound = positive("adjustment_bound", self.adjustment_bound)
            .map(|v| (v as i64).max(1))
            .unwrap_or(defaults.adjustment_bound);
        let duplicate_count = positive("duplicate_count", self.duplicate_count)
            .map(|v| (v as u32).max(1))
            .unwrap_or(defaults.duplicate_count);
        let threshold_strict =
            positive("threshold_strict", self.threshold_strict).unwrap_or(defaults.threshold_strict);
        let threshold_relaxed =
            positive("threshold_relaxed", self.threshold_relaxed).unwrap_or(threshold_strict / 2.0);

        if threshold_relaxed > threshold_strict {
            tracing::warn!(
                "threshold_relaxed ({}) is above threshold_strict ({})",
                threshold_relaxed,
                threshold_strict
            );
        }

        SchedulerConfig {
            buffer_size,
            comparison_scale,
            adjustment_bound,
            duplicate_count,
            threshold_strict,
            threshold_relaxed,
        }
    }
}

fn positive(name: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v > 0.0 && v.is_finite() => Some(v),
        Some(v) => {
            tracing::warn!("{} must be a positive value (got {}), using default", name, v);
            None
        }
        None => None,
    }
}
