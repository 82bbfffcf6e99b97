//! Cluster-average input profiles over simulation windows.

use crate::cluster::ClusterAssignment;
use crate::error::ClusterError;
use crate::series::DAYS_PER_YEAR;
use crate::sim::boundary::BoundaryCorrection;
use crate::sim::layout::{DayLayout, MAX_GROUP_DAYS};

/// Averages an annual series over the windows of every cluster's members.
#[derive(Debug, Clone, Copy)]
pub struct PeriodAverager<'a> {
    layout: DayLayout,
    assignment: &'a ClusterAssignment,
    boundary: Option<&'a BoundaryCorrection>,
}

impl<'a> PeriodAverager<'a> {
    pub fn new(
        layout: DayLayout,
        assignment: &'a ClusterAssignment,
        boundary: Option<&'a BoundaryCorrection>,
    ) -> Self {
        Self {
            layout,
            assignment,
            boundary,
        }
    }

    /// Membership-weighted average window of `annual` for every cluster.
    ///
    /// Each returned array spans `previous_days + days_per_group + next_days`
    /// days. Days before day 0 repeat day 0 and days past day 364 repeat
    /// day 364. With a boundary correction on 2-day groups, day 0 is blended
    /// into the first counted day of its cluster and the final
    /// `previous_days + 2` days into the window of theirs.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::LengthMismatch`] if `annual` is not one year
    /// at the layout's step.
    pub fn average(&self, annual: &[f64]) -> Result<Vec<Vec<f64>>, ClusterError> {
        let layout = &self.layout;
        if annual.len() != layout.year_len() {
            return Err(ClusterError::LengthMismatch {
                what: "averaged series".to_string(),
                expected: layout.year_len(),
                actual: annual.len(),
            });
        }

        let ppd = layout.steps_per_day;
        let partition = self.assignment.partition();
        let clusters = self.assignment.num_clusters();
        let mut averages = vec![vec![0.0; layout.window_len()]; clusters];

        for group in 0..partition.nrows() {
            let start = layout.first_day(group) as isize - layout.previous_days as isize;
            for slot in 0..layout.window_days() {
                let day = (start + slot as isize).clamp(0, DAYS_PER_YEAR as isize - 1) as usize;
                let source = &annual[layout.day_range(day, 1)];
                for (k, average) in averages.iter_mut().enumerate() {
                    let share = partition[(group, k)];
                    if share == 0.0 {
                        continue;
                    }
                    let target = &mut average[slot * ppd..(slot + 1) * ppd];
                    for (t, s) in target.iter_mut().zip(source) {
                        *t += share * s;
                    }
                }
            }
        }

        let counts = partition.column_sums();
        for (average, count) in averages.iter_mut().zip(&counts) {
            if *count > 0.0 {
                average.iter_mut().for_each(|v| *v /= count);
            }
        }

        let boundary = self.boundary.and_then(BoundaryCorrection::clusters);
        if let (2, Some((first, last))) = (layout.days_per_group, boundary) {
            let first_counted = layout.previous_days * ppd;
            blend(
                &mut averages[first][first_counted..first_counted + ppd],
                &annual[..ppd],
                counts[first],
            );
            let tail = (layout.previous_days + 2) * ppd;
            let source_start = MAX_GROUP_DAYS.saturating_sub(layout.previous_days) * ppd;
            blend(&mut averages[last][..tail], &annual[source_start..], counts[last]);
        }

        Ok(averages)
    }

    /// Writes cluster-average profiles into a copy of `annual` at each
    /// exemplar's window.
    ///
    /// Counted days always take the cluster average. With
    /// `overwrite_surrounding`, previous/next days that no exemplar counts are
    /// overwritten too.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::LengthMismatch`] if `annual` or a profile has
    /// the wrong length.
    pub fn overwrite_with_cluster_average(
        &self,
        annual: &[f64],
        averages: &[Vec<f64>],
        overwrite_surrounding: bool,
    ) -> Result<Vec<f64>, ClusterError> {
        let layout = &self.layout;
        if annual.len() != layout.year_len() {
            return Err(ClusterError::LengthMismatch {
                what: "annual series".to_string(),
                expected: layout.year_len(),
                actual: annual.len(),
            });
        }
        if let Some(bad) = averages.iter().find(|a| a.len() != layout.window_len()) {
            return Err(ClusterError::LengthMismatch {
                what: "cluster average profile".to_string(),
                expected: layout.window_len(),
                actual: bad.len(),
            });
        }

        let starts = self.assignment.exemplar_start_days(layout.days_per_group);
        let mut counted = vec![false; DAYS_PER_YEAR];
        for start in &starts {
            for day in *start..(*start + layout.days_per_group).min(DAYS_PER_YEAR) {
                counted[day] = true;
            }
        }

        let ppd = layout.steps_per_day;
        let mut result = annual.to_vec();
        for (start, average) in starts.iter().zip(averages) {
            let window_start = *start as isize - layout.previous_days as isize;
            for slot in 0..layout.window_days() {
                let Ok(day) = usize::try_from(window_start + slot as isize) else {
                    continue;
                };
                if day >= DAYS_PER_YEAR {
                    continue;
                }
                let in_counted_slot = (layout.previous_days
                    ..layout.previous_days + layout.days_per_group)
                    .contains(&slot);
                if in_counted_slot || (overwrite_surrounding && !counted[day]) {
                    result[layout.day_range(day, 1)]
                        .copy_from_slice(&average[slot * ppd..(slot + 1) * ppd]);
                }
            }
        }
        Ok(result)
    }
}

/// Adds one day's worth of `extra` to an average over `count` members.
fn blend(average: &mut [f64], extra: &[f64], count: f64) {
    for (a, e) in average.iter_mut().zip(extra) {
        *a = (*a * count + e) / (count + 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Partitioning;
    use crate::series::TimeSeries;

    fn day_index_series() -> Vec<f64> {
        TimeSeries::from_fn(1, |day, _| day as f64).into_values()
    }

    fn rows(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|g| vec![if g < n / 2 { 0.0 } else { 10.0 }]).collect()
    }

    #[test]
    fn identity_windows_follow_calendar() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::identity(&rows(181));
        let avg = PeriodAverager::new(layout, &a, None)
            .average(&day_index_series())
            .unwrap();
        assert_eq!(avg.len(), 181);
        // Group 0 counts days 1-2: window is days 0..=3.
        assert_eq!(avg[0][0], 0.0);
        assert_eq!(avg[0][24], 1.0);
        assert_eq!(avg[0][95], 3.0);
        // Last group counts days 361-362.
        assert_eq!(avg[180][0], 360.0);
        assert_eq!(avg[180][95], 363.0);
    }

    #[test]
    fn windows_are_clamped_to_the_year() {
        let layout = DayLayout::new(1, 3, 3, 1);
        let a = ClusterAssignment::identity(&rows(363));
        let avg = PeriodAverager::new(layout, &a, None)
            .average(&day_index_series())
            .unwrap();
        // Group 0 counts day 1; days -2 and -1 repeat day 0.
        assert_eq!(avg[0][0], 0.0);
        assert_eq!(avg[0][24], 0.0);
        assert_eq!(avg[0][48], 0.0);
        assert_eq!(avg[0][72], 1.0);
        // Group 362 counts day 363; days 365 and 366 repeat day 364.
        assert_eq!(avg[362][6 * 24], 364.0);
    }

    #[test]
    fn averages_members() {
        let layout = DayLayout::new(2, 0, 0, 1);
        let r = rows(181);
        let a = ClusterAssignment::from_exemplars(&r, vec![0, 180], Partitioning::Hard);
        let avg = PeriodAverager::new(layout, &a, None)
            .average(&day_index_series())
            .unwrap();
        // Cluster 0 holds groups 0..90: first days 1, 3, ..., 179.
        assert_eq!(avg[0][0], 90.0);
        assert_eq!(avg[0][24], 91.0);
    }

    #[test]
    fn all_ones_stay_ones_with_boundary_blend() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let r = rows(181);
        let a = ClusterAssignment::from_exemplars(&r, vec![0, 180], Partitioning::Hard);
        let boundary = BoundaryCorrection {
            first_cluster: Some(1),
            last_cluster: Some(0),
            weights: vec![0.5, 0.5],
        };
        let ones = vec![1.0; 8760];
        let avg = PeriodAverager::new(layout, &a, Some(&boundary))
            .average(&ones)
            .unwrap();
        assert!(avg.iter().flatten().all(|v| (*v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn boundary_blend_mixes_first_and_last_days() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::from_exemplars(&rows(181), vec![0, 180], Partitioning::Hard);
        let boundary = BoundaryCorrection {
            first_cluster: Some(1),
            last_cluster: Some(0),
            weights: vec![0.5, 0.5],
        };
        let series = day_index_series();
        let plain = PeriodAverager::new(layout, &a, None).average(&series).unwrap();
        let blended = PeriodAverager::new(layout, &a, Some(&boundary))
            .average(&series)
            .unwrap();
        // Day 0 is folded into the first counted day of cluster 1 (91 groups).
        let expected = (plain[1][24] * 91.0 + 0.0) / 92.0;
        assert!((blended[1][24] - expected).abs() < 1e-9);
        assert_eq!(blended[1][0], plain[1][0]);
        // Days 362-364 are folded into the first three window days of cluster 0.
        let expected = (plain[0][0] * 90.0 + 362.0) / 91.0;
        assert!((blended[0][0] - expected).abs() < 1e-9);
        let expected = (plain[0][48] * 90.0 + 364.0) / 91.0;
        assert!((blended[0][48] - expected).abs() < 1e-9);
        assert_eq!(blended[0][72], plain[0][72]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::identity(&rows(181));
        let err = PeriodAverager::new(layout, &a, None).average(&[0.0; 10]).unwrap_err();
        assert!(matches!(err, ClusterError::LengthMismatch { expected: 8760, actual: 10, .. }));
    }

    #[test]
    fn overwrite_counted_days_only() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::from_exemplars(&rows(181), vec![0, 180], Partitioning::Hard);
        let averager = PeriodAverager::new(layout, &a, None);
        let averages = vec![vec![-1.0; 96], vec![-2.0; 96]];
        let annual = day_index_series();
        let out = averager
            .overwrite_with_cluster_average(&annual, &averages, false)
            .unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[24], -1.0);
        assert_eq!(out[2 * 24 + 5], -1.0);
        assert_eq!(out[3 * 24], 3.0);
        assert_eq!(out[361 * 24], -2.0);
        assert_eq!(out[360 * 24], 360.0);

        let out = averager
            .overwrite_with_cluster_average(&annual, &averages, true)
            .unwrap();
        assert_eq!(out[0], -1.0);
        assert_eq!(out[3 * 24], -1.0);
        assert_eq!(out[360 * 24], -2.0);
        assert_eq!(out[363 * 24], -2.0);
    }
}
