//! Sequential and row-partitioned parallel matrix multiplication.
//!
//! `matrix-mul` computes `C = A × B` for dense `f64` matrices two ways:
//! a direct triple loop on the calling thread, and a parallel version that
//! bisects A's rows into blocks and multiplies each block on its own worker.
//! Both paths share one kernel, so their results are bit-identical.
//!
//! # Parallel Layout
//!
//! - **Partition**: A's rows are halved until every block holds at most a
//!   quarter of the original rows (configurable via [`PartitionPolicy`]).
//! - **Dispatch**: blocks run on a worker pool created for the call and
//!   shut down before it returns.
//! - **Merge**: block results are concatenated in ascending row order,
//!   whatever order the workers finished in.
//!
//! # Example
//!
//! ```
//! use matrix_mul::{Matrix, multiply_parallel, multiply_sequential};
//!
//! let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
//! let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]])?;
//!
//! let seq = multiply_sequential(&a, &b)?;
//! let par = multiply_parallel(&a, &b, Some(4))?;
//!
//! assert_eq!(seq.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
//! assert_eq!(seq, par);
//! # Ok::<(), matrix_mul::Error>(())
//! ```

pub mod bench;
mod error;
mod matrix;
mod parallel;
mod partition;
mod sequential;

pub use error::Error;
pub use matrix::Matrix;
pub use parallel::{LeafHook, ParallelMultiplier, hardware_concurrency};
pub use partition::{PartitionPolicy, RowBlock, partition};
pub use sequential::SequentialMultiplier;

/// Computes `A × B` on the calling thread.
pub fn multiply_sequential(a: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
    SequentialMultiplier::new().multiply(a, b)
}

/// Computes `A × B` over a pool of `workers` threads, defaulting to the
/// hardware concurrency.
///
/// Blocks until every row-block is done. Must not be called from within
/// an async runtime.
pub fn multiply_parallel(a: &Matrix, b: &Matrix, workers: Option<usize>) -> Result<Matrix, Error> {
    let mut multiplier = ParallelMultiplier::new();
    if let Some(workers) = workers {
        multiplier = multiplier.workers(workers);
    }
    multiplier.multiply(a, b)
}
