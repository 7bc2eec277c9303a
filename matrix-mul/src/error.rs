//! Error types for matrix-mul operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("matrix dimension mismatch: A is {0}x{1}, B is {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),

    #[error("matrix must have at least one row and one column")]
    EmptyMatrix,

    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("benchmark run count must be at least 1")]
    InvalidRunCount,

    #[error("partition divisor must be at least 1")]
    InvalidPartition,

    #[error("worker failed{}: {reason}", block_label(.block_start))]
    WorkerFailure {
        block_start: Option<usize>,
        reason: String,
    },

    #[error("results differ at C[{row}][{col}]: sequential {sequential}, parallel {parallel}")]
    ResultMismatch {
        row: usize,
        col: usize,
        sequential: f64,
        parallel: f64,
    },

    /// A command-line argument was not a valid value.
    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    pub(crate) fn worker(block_start: usize, reason: impl Into<String>) -> Self {
        Error::WorkerFailure {
            block_start: Some(block_start),
            reason: reason.into(),
        }
    }

    pub(crate) fn pool(reason: impl Into<String>) -> Self {
        Error::WorkerFailure {
            block_start: None,
            reason: reason.into(),
        }
    }
}

fn block_label(block_start: &Option<usize>) -> String {
    match block_start {
        Some(start) => format!(" on row-block starting at {}", start),
        None => String::new(),
    }
}
