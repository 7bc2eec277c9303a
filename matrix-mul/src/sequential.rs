//! Sequential triple-loop matrix product.

use std::ops::Range;

use crate::{Error, Matrix};

/// Computes `C = A × B` on the calling thread.
///
/// Each element is accumulated as `sum over k of A[i][k] * B[k][j]` in
/// increasing `k`, visiting outputs in `i`, `j` order. The parallel path
/// reuses the same kernel per row-block, so both produce bit-identical
/// results.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialMultiplier;

impl SequentialMultiplier {
    pub fn new() -> Self {
        Self
    }

    pub fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
        check_dims(a, b)?;
        Ok(multiply_rows(a, 0..a.rows(), b))
    }
}

/// Fails with `DimensionMismatch` unless `cols(A) == rows(B)`.
pub(crate) fn check_dims(a: &Matrix, b: &Matrix) -> Result<(), Error> {
    if a.cols() != b.rows() {
        return Err(Error::DimensionMismatch(
            a.rows(),
            a.cols(),
            b.rows(),
            b.cols(),
        ));
    }
    Ok(())
}

/// Product of rows `rows` of `a` with all of `b`, as a
/// `rows.len()`×`cols(b)` matrix. Dimensions must already be checked.
pub(crate) fn multiply_rows(a: &Matrix, rows: Range<usize>, b: &Matrix) -> Matrix {
    let inner = a.cols();
    let mut c = Matrix::zeros(rows.len(), b.cols());

    for (out, i) in rows.enumerate() {
        let a_row = a.row(i);
        let c_row = c.row_mut(out);
        for (j, cell) in c_row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for k in 0..inner {
                sum += a_row[k] * b.row(k)[j];
            }
            *cell = sum;
        }
    }

    c
}
