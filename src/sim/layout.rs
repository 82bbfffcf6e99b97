//! Calendar layout of candidate groups and their simulation windows.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::series::{DAYS_PER_YEAR, HOURS_PER_DAY};

/// Days available to candidate groups: day 0 and day 364 are never counted.
pub const MAX_GROUP_DAYS: usize = DAYS_PER_YEAR - 2;

/// How the year is cut into candidate groups and how each group is simulated.
///
/// Group `g` counts days `g·N+1 … (g+1)·N`. Its simulation window adds
/// `previous_days` of warm-up before and `next_days` after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayLayout {
    /// Counted days per group (`N`).
    pub days_per_group: usize,
    pub previous_days: usize,
    pub next_days: usize,
    /// Points per calendar day.
    pub steps_per_day: usize,
}

impl DayLayout {
    pub fn new(
        days_per_group: usize,
        previous_days: usize,
        next_days: usize,
        steps_per_hour: usize,
    ) -> Self {
        Self {
            days_per_group,
            previous_days,
            next_days,
            steps_per_day: steps_per_hour * HOURS_PER_DAY,
        }
    }

    /// Number of candidate groups, `floor(363 / N)`.
    pub fn num_groups(&self) -> usize {
        MAX_GROUP_DAYS.checked_div(self.days_per_group).unwrap_or(0)
    }

    /// First counted day of group `g`.
    pub fn first_day(&self, group: usize) -> usize {
        group * self.days_per_group + 1
    }

    /// Days in one simulation window.
    pub fn window_days(&self) -> usize {
        self.previous_days + self.days_per_group + self.next_days
    }

    /// Points in one simulation window.
    pub fn window_len(&self) -> usize {
        self.window_days() * self.steps_per_day
    }

    /// Points in the counted part of one group.
    pub fn counted_len(&self) -> usize {
        self.days_per_group * self.steps_per_day
    }

    /// Points in a whole year.
    pub fn year_len(&self) -> usize {
        DAYS_PER_YEAR * self.steps_per_day
    }

    /// First day after the last group.
    pub fn trailing_start(&self) -> usize {
        self.num_groups() * self.days_per_group + 1
    }

    /// Days after the last group up to and including day 364.
    pub fn trailing_days(&self) -> usize {
        DAYS_PER_YEAR - self.trailing_start()
    }

    /// Point range of `days` calendar days starting at `day`.
    pub fn day_range(&self, day: usize, days: usize) -> Range<usize> {
        day * self.steps_per_day..(day + days) * self.steps_per_day
    }

    /// Calendar days touched by the simulation windows of the given exemplars.
    pub fn simulated_days(&self, exemplar_start_days: &[usize]) -> Vec<bool> {
        let mut mask = vec![false; DAYS_PER_YEAR];
        for start in exemplar_start_days {
            let first = start.saturating_sub(self.previous_days);
            let end = (start + self.days_per_group + self.next_days).min(DAYS_PER_YEAR);
            for day in mask.iter_mut().take(end).skip(first) {
                *day = true;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_day_groups() {
        let layout = DayLayout::new(2, 1, 1, 1);
        assert_eq!(layout.num_groups(), 181);
        assert_eq!(layout.first_day(0), 1);
        assert_eq!(layout.first_day(180), 361);
        assert_eq!(layout.trailing_start(), 363);
        assert_eq!(layout.trailing_days(), 2);
        assert_eq!(layout.window_len(), 96);
        assert_eq!(layout.counted_len(), 48);
    }

    #[test]
    fn one_day_groups_leave_one_trailing_day() {
        let layout = DayLayout::new(1, 0, 0, 2);
        assert_eq!(layout.num_groups(), 363);
        assert_eq!(layout.trailing_start(), 364);
        assert_eq!(layout.trailing_days(), 1);
        assert_eq!(layout.year_len(), 17_520);
    }

    #[test]
    fn five_day_groups() {
        let layout = DayLayout::new(5, 1, 1, 1);
        assert_eq!(layout.num_groups(), 72);
        assert_eq!(layout.trailing_start(), 361);
        assert_eq!(layout.trailing_days(), 4);
    }

    #[test]
    fn simulated_days_cover_windows() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let mask = layout.simulated_days(&[1, 363]);
        assert_eq!(mask.iter().filter(|d| **d).count(), 4 + 3);
        assert!(mask[0] && mask[3] && !mask[4]);
        assert!(mask[362] && mask[364]);
    }
}
