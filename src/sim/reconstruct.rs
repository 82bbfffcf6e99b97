//! Expanding per-cluster results back into a full year.

use tracing::debug;

use crate::cluster::ClusterAssignment;
use crate::error::{ClusterError, Diagnostic};
use crate::series::DAYS_PER_YEAR;
use crate::sim::boundary::BoundaryCorrection;
use crate::sim::layout::DayLayout;

/// Days averaged to fill an uncovered boundary day.
const FILL_DAYS: usize = 5;

/// Broadcasts exemplar results to every calendar day through the partition.
#[derive(Debug, Clone, Copy)]
pub struct AnnualReconstructor<'a> {
    layout: DayLayout,
    assignment: &'a ClusterAssignment,
    boundary: Option<&'a BoundaryCorrection>,
}

impl<'a> AnnualReconstructor<'a> {
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

    fn boundary_clusters(&self) -> Option<(usize, usize)> {
        if self.layout.days_per_group != 2 {
            return None;
        }
        self.boundary.and_then(BoundaryCorrection::clusters)
    }

    /// Rebuilds a full year from each cluster's counted-day results.
    ///
    /// `exemplar_data[k]` holds `days_per_group` days of results for cluster
    /// `k`. Every group's days receive the membership-weighted sum of the
    /// cluster results. Day 0 and the trailing days come from the boundary
    /// clusters when a correction applies; otherwise, if still all zero,
    /// they are filled from nearby days and a `CoverageGap` is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::LengthMismatch`] if the number of arrays or
    /// any array length does not match the assignment and layout.
    pub fn reconstruct(
        &self,
        exemplar_data: &[Vec<f64>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<f64>, ClusterError> {
        let (annual, gaps) = self.rebuild(exemplar_data)?;
        for gap in gaps {
            gap.report(diagnostics);
        }
        Ok(annual)
    }

    /// [`AnnualReconstructor::reconstruct`] returning the coverage gaps
    /// unreported.
    pub(crate) fn rebuild(&self, exemplar_data: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<Diagnostic>), ClusterError> {
        let layout = &self.layout;
        let mut gaps = Vec::new();
        let counted = layout.counted_len();
        if exemplar_data.len() != self.assignment.num_clusters() {
            return Err(ClusterError::LengthMismatch {
                what: "exemplar result set".to_string(),
                expected: self.assignment.num_clusters(),
                actual: exemplar_data.len(),
            });
        }
        if let Some(bad) = exemplar_data.iter().find(|d| d.len() != counted) {
            return Err(ClusterError::LengthMismatch {
                what: "exemplar result".to_string(),
                expected: counted,
                actual: bad.len(),
            });
        }

        let ppd = layout.steps_per_day;
        let partition = self.assignment.partition();
        let mut annual = vec![0.0; layout.year_len()];
        for group in 0..partition.nrows() {
            let span = layout.day_range(layout.first_day(group), layout.days_per_group);
            let target = &mut annual[span];
            for (k, data) in exemplar_data.iter().enumerate() {
                let share = partition[(group, k)];
                if share == 0.0 {
                    continue;
                }
                for (t, d) in target.iter_mut().zip(data) {
                    *t += share * d;
                }
            }
        }

        let trailing_start = layout.trailing_start();
        let trailing_days = layout.trailing_days();
        match self.boundary_clusters() {
            Some((first, last)) => {
                annual[..ppd].copy_from_slice(&exemplar_data[first][..ppd]);
                let tail = layout.day_range(trailing_start, trailing_days);
                let len = tail.len();
                annual[tail].copy_from_slice(&exemplar_data[last][..len]);
            }
            None => {
                if annual[..ppd].iter().all(|v| *v == 0.0) {
                    let profile = day_average(&annual, ppd, 1);
                    annual[..ppd].copy_from_slice(&profile);
                    gaps.push(Diagnostic::CoverageGap {
                        first_day: 0,
                        end_day: 1,
                        source_days: FILL_DAYS,
                        direction: "following",
                    });
                }
                let tail = layout.day_range(trailing_start, trailing_days);
                if trailing_days > 0 && annual[tail.clone()].iter().all(|v| *v == 0.0) {
                    let source = trailing_start.saturating_sub(FILL_DAYS);
                    let profile = day_average(&annual, ppd, source);
                    for chunk in annual[tail].chunks_mut(ppd) {
                        chunk.copy_from_slice(&profile);
                    }
                    gaps.push(Diagnostic::CoverageGap {
                        first_day: trailing_start,
                        end_day: DAYS_PER_YEAR,
                        source_days: FILL_DAYS,
                        direction: "preceding",
                    });
                }
            }
        }

        debug!(points = annual.len(), "annual array reconstructed");
        Ok((annual, gaps))
    }

    /// Each exemplar's counted days taken from a full-year result array.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::LengthMismatch`] if `annual` is not one year.
    pub fn exemplar_windows(&self, annual: &[f64]) -> Result<Vec<Vec<f64>>, ClusterError> {
        if annual.len() != self.layout.year_len() {
            return Err(ClusterError::LengthMismatch {
                what: "exemplar year".to_string(),
                expected: self.layout.year_len(),
                actual: annual.len(),
            });
        }
        Ok(self
            .assignment
            .exemplar_start_days(self.layout.days_per_group)
            .into_iter()
            .map(|day| annual[self.layout.day_range(day, self.layout.days_per_group)].to_vec())
            .collect())
    }

    /// Per-day ratio of actual daily irradiation to the irradiation of the
    /// exemplars standing in for that day.
    ///
    /// `daily` holds one value per calendar day. Days whose stand-in
    /// irradiation is zero get factor 1.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::LengthMismatch`] unless `daily` has 365 entries.
    pub fn irradiance_scaling_factors(&self, daily: &[f64]) -> Result<Vec<f64>, ClusterError> {
        if daily.len() != DAYS_PER_YEAR {
            return Err(ClusterError::LengthMismatch {
                what: "daily irradiance".to_string(),
                expected: DAYS_PER_YEAR,
                actual: daily.len(),
            });
        }
        let n = self.layout.days_per_group;
        let mean = |first: usize, days: usize| -> f64 {
            if days == 0 {
                return 0.0;
            }
            daily[first..first + days].iter().sum::<f64>() / days as f64
        };
        let ratio = |actual: f64, represented: f64| {
            if represented > 0.0 { actual / represented } else { 1.0 }
        };

        let group_means: Vec<f64> = (0..self.layout.num_groups())
            .map(|g| mean(self.layout.first_day(g), n))
            .collect();
        let exemplar_means: Vec<f64> = self
            .assignment
            .exemplars()
            .iter()
            .map(|e| group_means.get(*e).copied().unwrap_or(0.0))
            .collect();

        let mut factors = vec![1.0; DAYS_PER_YEAR];
        let partition = self.assignment.partition();
        for (g, actual) in group_means.iter().enumerate() {
            let represented: f64 = exemplar_means
                .iter()
                .enumerate()
                .map(|(k, e)| partition[(g, k)] * e)
                .sum();
            let first = self.layout.first_day(g);
            factors[first..first + n].fill(ratio(*actual, represented));
        }
        if let Some((first, last)) = self.boundary_clusters() {
            factors[0] = ratio(daily[0], exemplar_means[first]);
            let start = self.layout.trailing_start();
            let days = self.layout.trailing_days();
            let factor = ratio(mean(start, days), exemplar_means[last]);
            factors[start..start + days].fill(factor);
        }
        Ok(factors)
    }
}

/// Average profile of `FILL_DAYS` consecutive days starting at `first`.
fn day_average(annual: &[f64], ppd: usize, first: usize) -> Vec<f64> {
    let mut profile = vec![0.0; ppd];
    for day in first..(first + FILL_DAYS).min(DAYS_PER_YEAR) {
        for (p, v) in profile.iter_mut().zip(&annual[day * ppd..(day + 1) * ppd]) {
            *p += v;
        }
    }
    profile.iter_mut().for_each(|p| *p /= FILL_DAYS as f64);
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Partitioning;

    fn rows(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|g| vec![g as f64]).collect()
    }

    #[test]
    fn identity_round_trip() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::identity(&rows(181));
        let data: Vec<Vec<f64>> = (0..181)
            .map(|k| (0..48).map(|h| (k * 100 + h) as f64).collect())
            .collect();
        let boundary = BoundaryCorrection {
            first_cluster: Some(0),
            last_cluster: Some(180),
            weights: vec![1.0 / 181.0; 181],
        };
        let mut diags = Vec::new();
        let annual = AnnualReconstructor::new(layout, &a, Some(&boundary))
            .reconstruct(&data, &mut diags)
            .unwrap();
        assert_eq!(annual.len(), 8760);
        for (g, d) in data.iter().enumerate() {
            let start = (2 * g + 1) * 24;
            assert_eq!(&annual[start..start + 48], d.as_slice());
        }
        assert_eq!(&annual[..24], &data[0][..24]);
        assert_eq!(&annual[363 * 24..], &data[180][..48]);
        assert!(diags.is_empty());
    }

    #[test]
    fn fills_uncovered_days_without_boundary() {
        let layout = DayLayout::new(1, 0, 0, 1);
        let a = ClusterAssignment::from_exemplars(&rows(363), vec![0], Partitioning::Hard);
        let data = vec![vec![0.75; 24]];
        let mut diags = Vec::new();
        let annual = AnnualReconstructor::new(layout, &a, None)
            .reconstruct(&data, &mut diags)
            .unwrap();
        assert!(annual.iter().all(|v| *v == 0.75));
        assert_eq!(diags.len(), 2);
        assert!(matches!(
            diags[1],
            Diagnostic::CoverageGap {
                first_day: 364,
                end_day: 365,
                direction: "preceding",
                ..
            }
        ));
    }

    #[test]
    fn trailing_days_each_get_the_preceding_profile() {
        let layout = DayLayout::new(5, 0, 0, 1);
        let r = rows(72);
        let a = ClusterAssignment::identity(&r);
        let data: Vec<Vec<f64>> = (0..72).map(|k| vec![k as f64; 120]).collect();
        let mut diags = Vec::new();
        let annual = AnnualReconstructor::new(layout, &a, None)
            .reconstruct(&data, &mut diags)
            .unwrap();
        // Days 356..361 belong to group 71; days 361..365 are trailing.
        for day in 361..365 {
            assert_eq!(annual[day * 24], 71.0);
        }
        // Day 0 averages days 1..=5, all group 0.
        assert_eq!(annual[0], 0.0);
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::identity(&rows(181));
        let r = AnnualReconstructor::new(layout, &a, None);
        let mut diags = Vec::new();
        assert!(r.reconstruct(&[vec![0.0; 48]], &mut diags).is_err());
        let data = vec![vec![0.0; 47]; 181];
        assert!(matches!(
            r.reconstruct(&data, &mut diags),
            Err(ClusterError::LengthMismatch { expected: 48, actual: 47, .. })
        ));
    }

    #[test]
    fn exemplar_windows_read_counted_days() {
        let layout = DayLayout::new(2, 1, 1, 1);
        let a = ClusterAssignment::from_exemplars(&rows(181), vec![0, 10], Partitioning::Hard);
        let annual: Vec<f64> = (0..8760).map(|i| (i / 24) as f64).collect();
        let windows = AnnualReconstructor::new(layout, &a, None)
            .exemplar_windows(&annual)
            .unwrap();
        assert_eq!(windows[0][0], 1.0);
        assert_eq!(windows[0][47], 2.0);
        assert_eq!(windows[1][0], 21.0);
    }

    #[test]
    fn scaling_factors_compare_group_and_exemplar() {
        let layout = DayLayout::new(2, 1, 1, 1);
        // Groups 0..90 look alike, as do 90..181.
        let r: Vec<Vec<f64>> = (0..181).map(|g| vec![if g < 90 { 0.0 } else { 1.0 }]).collect();
        let a = ClusterAssignment::from_exemplars(&r, vec![0, 90], Partitioning::Hard);
        let boundary = BoundaryCorrection {
            first_cluster: Some(0),
            last_cluster: Some(1),
            weights: vec![0.5, 0.5],
        };
        let daily: Vec<f64> = (0..365).map(|d| if d < 100 { 2.0 } else { 4.0 }).collect();
        let f = AnnualReconstructor::new(layout, &a, Some(&boundary))
            .irradiance_scaling_factors(&daily)
            .unwrap();
        // Exemplar 0 (days 1-2) has 2.0; exemplar 90 (days 181-182) has 4.0.
        assert_eq!(f[0], 1.0);
        assert_eq!(f[1], 1.0);
        assert_eq!(f[101], 2.0);
        assert_eq!(f[200], 1.0);
        assert_eq!(f[364], 1.0);
    }
}
