//! Drift control
//!
//! Drift is `write_position - original_index(head)`: how far the output has
//! run ahead of (positive) or fallen behind (negative) the input timeline.
//! It is measured once every `buffer_size` correction phases; in between only
//! bulk corrections move it.
//!
//! Within the bound, the phase hands over to slot reallocation. Outside it,
//! repeat counts are trimmed or padded head to tail until the drift is back
//! inside, keeping downstream audio aligned at the cost of local choices.

use crate::window::Window;

/// What the controller did in one correction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Drift inside the bound, reallocation may run
    WithinBound,
    /// Output ahead; copies removed from records above target
    Trimmed { removed: u32 },
    /// Output behind; copies added to records below target
    Padded { added: u32 },
}

/// Periodic drift measurement and bulk correction
#[derive(Debug, Clone)]
pub struct DriftController {
    bound: i64,
    cadence: usize,
    countdown: usize,
    drift: i64,
}

impl DriftController {
    /// `cadence` is the number of phases between measurements
    pub fn new(bound: i64, cadence: usize) -> Self {
        Self {
            bound: bound.max(1),
            cadence: cadence.max(1),
            countdown: 0,
            drift: 0,
        }
    }

    /// Current (possibly stale) drift value
    pub fn drift(&self) -> i64 {
        self.drift
    }

    /// Advance the cadence counter and re-measure when it runs out
    ///
    /// Returns the fresh measurement, or `None` if this phase reuses the last.
    pub fn tick(&mut self, write_position: u64, window: &Window) -> Option<i64> {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return None;
        }
        let head = window.head()?;
        self.drift = write_position as i64 - head.original_index as i64;
        self.countdown = self.cadence;
        Some(self.drift)
    }

    /// Overwrite the drift value directly
    pub fn set_drift(&mut self, drift: i64) {
        self.drift = drift;
    }

    pub fn within_bound(&self) -> bool {
        self.drift.abs() < self.bound
    }

    /// Apply a bulk correction if the drift is out of bound
    pub fn correct(&mut self, window: &mut Window, duplicate_count: u32) -> Correction {
        if self.within_bound() {
            return Correction::WithinBound;
        }

        if self.drift >= self.bound {
            let mut removed = 0;
            'trim: for record in window.iter_mut() {
                while record.repeat_count > duplicate_count {
                    if self.drift < self.bound {
                        break 'trim;
                    }
                    record.repeat_count -= 1;
                    self.drift -= 1;
                    removed += 1;
                }
            }
            Correction::Trimmed { removed }
        } else {
            let mut added = 0;
            'pad: for record in window.iter_mut() {
                while record.repeat_count < duplicate_count {
                    if self.within_bound() {
                        break 'pad;
                    }
                    record.repeat_count += 1;
                    self.drift += 1;
                    added += 1;
                }
            }
            Correction::Padded { added }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::tests::window_of;

    #[test]
    fn test_measures_on_first_tick_then_every_cadence() {
        let window = window_of(3, &[(1, 0.0), (1, 0.0)]);
        let mut drift = DriftController::new(5, 3);

        assert_eq!(drift.tick(4, &window), Some(4));
        assert_eq!(drift.tick(9, &window), None);
        assert_eq!(drift.tick(9, &window), None);
        assert_eq!(drift.drift(), 4);
        assert_eq!(drift.tick(9, &window), Some(9));
    }

    #[test]
    fn test_within_bound_is_untouched() {
        let mut window = window_of(3, &[(3, 0.0), (1, 0.0), (2, 0.0)]);
        let mut drift = DriftController::new(5, 3);
        drift.set_drift(-4);
        assert_eq!(drift.correct(&mut window, 2), Correction::WithinBound);
        assert_eq!(window.repeat_counts(), vec![3, 1, 2]);
    }

    #[test]
    fn test_trims_head_to_tail_until_inside() {
        let mut window = window_of(4, &[(3, 0.0), (3, 0.0), (2, 0.0), (4, 0.0)]);
        let mut drift = DriftController::new(5, 4);
        drift.set_drift(7);

        let before = window.total_repeats();
        let correction = drift.correct(&mut window, 2);

        assert_eq!(correction, Correction::Trimmed { removed: 3 });
        assert_eq!(drift.drift(), 4);
        assert_eq!(window.repeat_counts(), vec![2, 2, 2, 3]);
        assert_eq!(before - window.total_repeats(), 3);
    }

    #[test]
    fn test_trim_stops_when_window_exhausted() {
        let mut window = window_of(3, &[(3, 0.0), (2, 0.0), (1, 0.0)]);
        let mut drift = DriftController::new(2, 3);
        drift.set_drift(6);
        assert_eq!(drift.correct(&mut window, 2), Correction::Trimmed { removed: 1 });
        assert_eq!(drift.drift(), 5);
        assert!(!drift.within_bound());
        assert_eq!(window.repeat_counts(), vec![2, 2, 1]);
    }

    #[test]
    fn test_pads_at_risk_records() {
        let mut window = window_of(4, &[(2, 0.0), (1, 0.0), (1, 0.0), (1, 0.0)]);
        let mut drift = DriftController::new(3, 4);
        drift.set_drift(-4);

        let correction = drift.correct(&mut window, 3);
        assert_eq!(correction, Correction::Padded { added: 2 });
        assert_eq!(drift.drift(), -2);
        assert_eq!(window.repeat_counts(), vec![3, 2, 1, 1]);
    }

    #[test]
    fn test_counts_stay_positive() {
        let mut window = window_of(3, &[(1, 0.0), (1, 0.0), (1, 0.0)]);
        let mut drift = DriftController::new(1, 3);
        drift.set_drift(10);
        assert_eq!(drift.correct(&mut window, 1), Correction::Trimmed { removed: 0 });
        assert!(window.iter().all(|r| r.repeat_count >= 1));
    }
}
