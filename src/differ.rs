//! Frame differencing
//!
//! Two comparison images are scored by the standard deviation of their
//! per-pixel absolute difference. A uniform brightness shift therefore scores
//! zero, while localized change (motion, new content) scores high.
//!
//! Match decisions use two cutoffs with hysteresis: the strict cutoff applies
//! while the open record is below its duplicate target, the relaxed cutoff
//! once it got there. Admitting a new record returns to strict.

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::types::GrayImage;

/// Dissimilarity between two comparison images
///
/// Population standard deviation of `|a - b|` over all pixels. Pure: the
/// same pair always yields the bit-identical score.
pub fn dissimilarity(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    if a.width != b.width || a.height != b.height || a.data.len() != b.data.len() {
        return Err(Error::DimensionMismatch {
            left: a.resolution().to_string(),
            right: b.resolution().to_string(),
        });
    }
    if a.data.is_empty() {
        return Ok(0.0);
    }

    let n = a.data.len() as f64;
    let diffs = || a.data.iter().zip(&b.data).map(|(&x, &y)| x.abs_diff(y) as f64);

    let mean = diffs().sum::<f64>() / n;
    let variance = diffs().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;

    Ok(variance.sqrt())
}

/// Which cutoff is currently applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdMode {
    #[default]
    Strict,
    Relaxed,
}

/// Strict/relaxed cutoffs and the active mode
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdState {
    strict: f64,
    relaxed: f64,
    mode: ThresholdMode,
}

impl ThresholdState {
    /// Starts in strict mode
    pub fn new(strict: f64, relaxed: f64) -> Self {
        Self {
            strict,
            relaxed,
            mode: ThresholdMode::Strict,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.threshold_strict, config.threshold_relaxed)
    }

    /// Cutoff for the active mode
    pub fn active(&self) -> f64 {
        match self.mode {
            ThresholdMode::Strict => self.strict,
            ThresholdMode::Relaxed => self.relaxed,
        }
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    pub fn make_strict(&mut self) {
        self.mode = ThresholdMode::Strict;
    }

    pub fn make_relaxed(&mut self) {
        self.mode = ThresholdMode::Relaxed;
    }

    /// Match decision under the active cutoff
    pub fn is_match(&self, score: f64) -> bool {
        score < self.active()
    }
}

/// Outcome of comparing a new frame against the open record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub score: f64,
    pub matched: bool,
}

/// Scores frames and applies the hysteretic match decision
#[derive(Debug, Clone)]
pub struct FrameDiffer {
    threshold: ThresholdState,
}

impl FrameDiffer {
    pub fn new(threshold: ThresholdState) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(ThresholdState::from_config(config))
    }

    /// Compare `candidate` against the open record's image
    pub fn compare(&self, open: &GrayImage, candidate: &GrayImage) -> Result<Comparison> {
        let score = dissimilarity(open, candidate)?;
        Ok(Comparison {
            score,
            matched: self.threshold.is_match(score),
        })
    }

    /// The open record reached its duplicate target
    pub fn target_reached(&mut self) {
        self.threshold.make_relaxed();
    }

    /// A new record was opened
    pub fn record_opened(&mut self) {
        self.threshold.make_strict();
    }

    pub fn threshold(&self) -> &ThresholdState {
        &self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halves(width: u32, height: u32, vertical: bool) -> GrayImage {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let lit = if vertical { x >= width / 2 } else { y >= height / 2 };
                data.push(if lit { 255 } else { 0 });
            }
        }
        GrayImage::new(width, height, data)
    }

    #[test]
    fn test_identical_images_score_zero() {
        let a = halves(8, 8, true);
        assert_eq!(dissimilarity(&a, &a.clone()).unwrap(), 0.0);
    }

    #[test]
    fn test_uniform_shift_scores_zero() {
        let a = GrayImage::filled(4, 4, 10);
        let b = GrayImage::filled(4, 4, 200);
        assert_eq!(dissimilarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_half_change_score() {
        let a = halves(8, 8, true);
        let b = halves(8, 8, false);
        // diff is 255 on half the pixels and 0 on the rest
        let score = dissimilarity(&a, &b).unwrap();
        assert!((score - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_scoring_is_pure() {
        let a = halves(16, 8, true);
        let b = halves(16, 8, false);
        let first = dissimilarity(&a, &b).unwrap();
        let second = dissimilarity(&a, &b).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = GrayImage::filled(4, 4, 0);
        let b = GrayImage::filled(2, 8, 0);
        assert!(matches!(
            dissimilarity(&a, &b),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_threshold_hysteresis() {
        let mut differ = FrameDiffer::new(ThresholdState::new(0.5, 0.25));
        assert_eq!(differ.threshold().mode(), ThresholdMode::Strict);
        assert!(differ.threshold().is_match(0.3));

        differ.target_reached();
        assert_eq!(differ.threshold().active(), 0.25);
        assert!(!differ.threshold().is_match(0.3));

        differ.record_opened();
        assert_eq!(differ.threshold().mode(), ThresholdMode::Strict);
        assert!(differ.threshold().is_match(0.3));
    }

    #[test]
    fn test_compare_reports_score() {
        let differ = FrameDiffer::new(ThresholdState::new(0.5, 0.25));
        let a = halves(8, 8, true);
        let cmp = differ.compare(&a, &halves(8, 8, false)).unwrap();
        assert!(!cmp.matched);
        assert!(cmp.score > 100.0);
        assert!(differ.compare(&a, &a).unwrap().matched);
    }
}
