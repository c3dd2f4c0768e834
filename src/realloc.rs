//! Slot reallocation
//!
//! Before the head is written, one at-risk record is topped up to the
//! duplicate target by moving repeat-count units from other records:
//!
//! 1. Safe donors: any record holding more than the target gives one unit.
//! 2. Priority donors: failing that, a record with strictly lower priority
//!    and more than one copy gives one unit.
//!
//! Both passes scan tail to head. Newer records have more cycles left to win
//! a unit back before they are evicted. Each move is count-neutral, so the
//! total emitted by the window never changes here.

use crate::window::Window;

/// Result of one reallocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reallocation {
    /// Units taken from records above the target
    pub safe_moves: u32,
    /// Units taken from lower-priority records
    pub priority_moves: u32,
    /// Target still below `duplicate_count` after all moves
    pub under_target: bool,
}

impl Reallocation {
    pub fn moves(&self) -> u32 {
        self.safe_moves + self.priority_moves
    }
}

/// Raise the record at `target` towards `duplicate_count`
///
/// Returns a default (no-op) result if `target` is out of range or already at
/// target.
pub fn reallocate(window: &mut Window, target: usize, duplicate_count: u32) -> Reallocation {
    let mut outcome = Reallocation::default();

    let Some(target_priority) = window.get(target).map(|r| r.priority) else {
        return outcome;
    };

    loop {
        match window.get(target) {
            Some(record) if record.is_at_risk(duplicate_count) => {}
            _ => break,
        }

        if let Some(donor) = find_safe_donor(window, duplicate_count) {
            transfer(window, donor, target);
            outcome.safe_moves += 1;
            continue;
        }

        if let Some(donor) = find_priority_donor(window, target_priority) {
            transfer(window, donor, target);
            outcome.priority_moves += 1;
            continue;
        }

        outcome.under_target = true;
        break;
    }

    outcome
}

/// Newest record with copies to spare
fn find_safe_donor(window: &Window, duplicate_count: u32) -> Option<usize> {
    window
        .iter()
        .enumerate()
        .rev()
        .find(|(_, r)| r.repeat_count > duplicate_count)
        .map(|(i, _)| i)
}

/// Newest less significant record that would survive losing a copy
fn find_priority_donor(window: &Window, target_priority: f64) -> Option<usize> {
    window
        .iter()
        .enumerate()
        .rev()
        .find(|(_, r)| r.priority < target_priority && r.repeat_count > 1)
        .map(|(i, _)| i)
}

fn transfer(window: &mut Window, from: usize, to: usize) {
    if let Some(donor) = window.get_mut(from) {
        debug_assert!(donor.repeat_count > 1);
        donor.repeat_count -= 1;
    }
    if let Some(target) = window.get_mut(to) {
        target.repeat_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::tests::window_of;

    #[test]
    fn test_safe_donor_preferred_from_tail() {
        // target at index 1; both ends could give, the tail goes first
        let mut window = window_of(4, &[(3, 1.0), (1, 5.0), (2, 1.0), (3, 1.0)]);
        let outcome = reallocate(&mut window, 1, 2);
        assert_eq!(outcome.safe_moves, 1);
        assert_eq!(outcome.priority_moves, 0);
        assert!(!outcome.under_target);
        assert_eq!(window.repeat_counts(), vec![3, 2, 2, 2]);
    }

    #[test]
    fn test_priority_donor_when_no_safe_donor() {
        // every neighbour sits exactly at target; one is less significant
        let mut window = window_of(5, &[(2, 9.0), (2, 3.0), (1, 6.0), (2, 8.0), (2, 7.0)]);
        let outcome = reallocate(&mut window, 2, 2);
        assert_eq!(outcome.priority_moves, 1);
        assert_eq!(window.repeat_counts(), vec![2, 1, 2, 2, 2]);
    }

    #[test]
    fn test_equal_priority_is_not_outbid() {
        let mut window = window_of(3, &[(2, 4.0), (1, 4.0), (2, 4.0)]);
        let outcome = reallocate(&mut window, 1, 2);
        assert!(outcome.under_target);
        assert_eq!(outcome.moves(), 0);
        assert_eq!(window.repeat_counts(), vec![2, 1, 2]);
    }

    #[test]
    fn test_donor_never_drops_below_one() {
        let mut window = window_of(3, &[(1, 0.0), (1, 10.0), (1, 0.0)]);
        let outcome = reallocate(&mut window, 1, 2);
        assert!(outcome.under_target);
        assert!(window.iter().all(|r| r.repeat_count >= 1));
    }

    #[test]
    fn test_multiple_moves_for_high_target() {
        let mut window = window_of(3, &[(5, 0.0), (1, 2.0), (1, 0.0)]);
        let outcome = reallocate(&mut window, 1, 3);
        assert_eq!(outcome.safe_moves, 2);
        assert_eq!(window.repeat_counts(), vec![3, 3, 1]);
    }

    #[test]
    fn test_mixed_passes_conserve_total() {
        let mut window = window_of(4, &[(4, 0.0), (2, 1.0), (1, 9.0), (2, 1.0)]);
        let before = window.total_repeats();
        let outcome = reallocate(&mut window, 2, 3);
        assert_eq!(outcome.safe_moves, 1);
        assert_eq!(outcome.priority_moves, 1);
        assert_eq!(window.total_repeats(), before);
        assert_eq!(window.repeat_counts(), vec![3, 2, 3, 1]);
    }

    #[test]
    fn test_target_out_of_range() {
        let mut window = window_of(4, &[(1, 0.0)]);
        assert_eq!(reallocate(&mut window, 3, 2), Reallocation::default());
    }
}
