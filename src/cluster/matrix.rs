//! Dense row-major matrix and the distance helpers used by clustering.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Dense row-major `f64` matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.ncols..(r + 1) * self.ncols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.data[r * self.ncols..(r + 1) * self.ncols]
    }

    pub fn column(&self, c: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.nrows).map(move |r| self.data[r * self.ncols + c])
    }

    /// Sum of each column.
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.ncols];
        for r in 0..self.nrows {
            for (s, v) in sums.iter_mut().zip(self.row(r)) {
                *s += v;
            }
        }
        sums
    }

    /// All entries in row-major order.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        debug_assert!(r < self.nrows && c < self.ncols, "({r}, {c}) out of {}x{}", self.nrows, self.ncols);
        &self.data[r * self.ncols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        debug_assert!(r < self.nrows && c < self.ncols, "({r}, {c}) out of {}x{}", self.nrows, self.ncols);
        &mut self.data[r * self.ncols + c]
    }
}

/// Squared Euclidean distance over the common length of `a` and `b`.
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Squared distance that skips undefined entries of `partial`.
pub fn partial_squared_distance(partial: &[Option<f64>], b: &[f64]) -> f64 {
    partial
        .iter()
        .zip(b)
        .filter_map(|(x, y)| x.map(|x| (x - y) * (x - y)))
        .sum()
}

/// Symmetric matrix of squared distances between all pairs of rows.
pub fn pairwise_squared_distances(rows: &[Vec<f64>]) -> Matrix {
    let n = rows.len();
    let mut d = Matrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let v = squared_distance(&rows[i], &rows[j]);
            d[(i, j)] = v;
            d[(j, i)] = v;
        }
    }
    d
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax_first(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Index of the smallest value; the first one wins on ties.
pub fn argmin_first(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v < best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Median of `values`, averaging the two middle entries for even lengths.
///
/// Returns 0.0 for an empty slice. The slice is sorted in place.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}
