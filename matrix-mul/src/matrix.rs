//! Dense row-major matrix.

use std::fmt;

use rand::Rng;

use crate::Error;

/// A dense, rectangular matrix of `f64` values.
///
/// Values are stored row-major in one contiguous buffer, so a run of
/// consecutive rows is a contiguous slice. Every `Matrix` has at least one
/// row and one column; constructors that take caller data enforce this.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Builds a matrix from nested rows, checking that it is non-empty and
    /// rectangular.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, Error> {
        let cols = rows.first().map_or(0, |row| row.len());
        if rows.is_empty() || cols == 0 {
            return Err(Error::EmptyMatrix);
        }

        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::RaggedRow {
                    row: i,
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Builds a `rows`×`cols` matrix whose element `(i, j)` is `f(i, j)`.
    pub fn from_fn(
        rows: usize,
        cols: usize,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> Result<Self, Error> {
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyMatrix);
        }
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Ok(Self { rows, cols, data })
    }

    /// The `n`×`n` identity matrix.
    pub fn identity(n: usize) -> Result<Self, Error> {
        Self::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
    }

    /// A matrix of values drawn uniformly from `[0, 1)`.
    pub fn random(rows: usize, cols: usize, rng: &mut impl Rng) -> Result<Self, Error> {
        Self::from_fn(rows, cols, |_, _| rng.gen_range(0.0..1.0))
    }

    pub(crate) fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Assembles a matrix from a row-major buffer produced by the
    /// multipliers. The caller guarantees `data.len() == rows * cols`.
    pub(crate) fn from_parts(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    pub(crate) fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Element at row `i`, column `j`, or `None` when out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.cols + j])
        } else {
            None
        }
    }

    /// Row `i` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.rows()`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub(crate) fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.cols)
    }

    /// Copies the matrix out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.iter_rows().map(<[f64]>::to_vec).collect()
    }

    /// Position of the first element (in row-major order) where `self` and
    /// `other` differ, or `None` when they are equal. Matrices of different
    /// shape differ at `(0, 0)`.
    pub fn first_difference(&self, other: &Matrix) -> Option<(usize, usize)> {
        if self.dims() != other.dims() {
            return Some((0, 0));
        }
        self.data
            .iter()
            .zip(&other.data)
            .position(|(a, b)| a != b)
            .map(|idx| (idx / self.cols, idx % self.cols))
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({}x{}) ", self.rows, self.cols)?;
        f.debug_list().entries(self.iter_rows()).finish()
    }
}
