//! Row-partitioned parallel matrix product.
//!
//! A multiplication runs in three steps:
//!
//! 1. **Plan**: the rows of A are bisected into leaf [`RowBlock`]s up front
//!    (see [`partition`]).
//! 2. **Dispatch**: each leaf is sent to a worker pool that lives only for
//!    the duration of the call. Workers share A and B read-only and compute
//!    their block with the sequential kernel.
//! 3. **Merge**: partial results arrive in completion order, are sorted by
//!    their block's starting row and concatenated.
//!
//! The first failing leaf aborts every leaf that has not started yet, and
//! the call returns that one error. A partially assembled matrix is never
//! returned.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::partition::{PartitionPolicy, RowBlock, partition};
use crate::sequential::{check_dims, multiply_rows};
use crate::{Error, Matrix};

/// Callback run by a worker immediately before it computes a leaf.
pub type LeafHook = Arc<dyn Fn(&RowBlock) + Send + Sync>;

/// Number of hardware threads, or 1 when it cannot be determined.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Computes `C = A × B` by spreading row-blocks of A over a worker pool.
///
/// Every output element is still a single dot product computed by one
/// worker in increasing `k` order, so the result is bit-identical to
/// [`SequentialMultiplier`](crate::SequentialMultiplier).
///
/// # Example
///
/// ```
/// use matrix_mul::{Matrix, ParallelMultiplier};
///
/// let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]])?;
/// let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]])?;
///
/// let c = ParallelMultiplier::new().workers(2).multiply(&a, &b)?;
/// assert_eq!(c.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
/// # Ok::<(), matrix_mul::Error>(())
/// ```
#[derive(Clone)]
pub struct ParallelMultiplier {
    workers: usize,
    policy: PartitionPolicy,
    leaf_hook: Option<LeafHook>,
}

impl ParallelMultiplier {
    /// A multiplier with one worker per hardware thread and the default
    /// quarter-of-rows partition threshold.
    pub fn new() -> Self {
        Self {
            workers: hardware_concurrency(),
            policy: PartitionPolicy::default(),
            leaf_hook: None,
        }
    }

    /// Sets the pool size. Zero is rejected when `multiply` is called.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn policy(mut self, policy: PartitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Installs a callback that each worker runs before computing its leaf.
    ///
    /// Useful for staggering completion order. A panic inside the hook is
    /// reported as [`Error::WorkerFailure`] for that block.
    pub fn leaf_hook(mut self, hook: impl Fn(&RowBlock) + Send + Sync + 'static) -> Self {
        self.leaf_hook = Some(Arc::new(hook));
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Leaf row-blocks this multiplier would dispatch for `a`.
    pub fn plan(&self, a: &Matrix) -> Vec<RowBlock> {
        partition(a.rows(), self.policy)
    }

    pub fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
        check_dims(a, b)?;
        if self.workers == 0 {
            return Err(Error::InvalidWorkerCount);
        }

        let leaves = self.plan(a);
        debug!(
            rows = a.rows(),
            threshold = self.policy.threshold(a.rows()),
            leaves = leaves.len(),
            "partitioned row range"
        );

        // Dropping the runtime joins every worker thread, on success and
        // on error alike.
        let runtime = self.build_pool()?;
        info!(workers = self.workers, leaves = leaves.len(), "dispatching row-blocks");

        let a = Arc::new(a.clone());
        let b = Arc::new(b.clone());
        let (rows, cols) = (a.rows(), b.cols());
        let partials = runtime.block_on(self.dispatch(a, b, leaves))?;

        merge(partials, rows, cols)
    }

    fn build_pool(&self) -> Result<Runtime, Error> {
        Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.workers)
            .thread_name("matrix-mul-worker")
            .build()
            .map_err(|e| Error::pool(format!("failed to start worker pool: {}", e)))
    }

    async fn dispatch(
        &self,
        a: Arc<Matrix>,
        b: Arc<Matrix>,
        leaves: Vec<RowBlock>,
    ) -> Result<Vec<PartialResult>, Error> {
        let mut tasks = JoinSet::new();
        for block in leaves {
            let item = WorkItem {
                block,
                a: Arc::clone(&a),
                b: Arc::clone(&b),
            };
            let hook = self.leaf_hook.clone();
            tasks.spawn_blocking(move || item.run(hook.as_deref()));
        }

        let mut partials = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| Error::pool(format!("worker task failed: {}", e)));
            match result.and_then(|r| r) {
                Ok(partial) => {
                    debug!(start = partial.block.start, len = partial.block.len, "row-block done");
                    partials.push(partial);
                }
                Err(err) => {
                    warn!(error = %err, pending = tasks.len(), "aborting outstanding row-blocks");
                    tasks.abort_all();
                    return Err(err);
                }
            }
        }

        Ok(partials)
    }
}

impl Default for ParallelMultiplier {
    fn default() -> Self {
        Self::new()
    }
}

/// One leaf of the partition, with shared read-only handles to A and B.
struct WorkItem {
    block: RowBlock,
    a: Arc<Matrix>,
    b: Arc<Matrix>,
}

impl WorkItem {
    fn run(self, hook: Option<&(dyn Fn(&RowBlock) + Send + Sync)>) -> Result<PartialResult, Error> {
        let block = self.block;
        let computed = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Matrix, Error> {
            if let Some(hook) = hook {
                hook(&block);
            }
            check_dims(&self.a, &self.b)?;
            Ok(multiply_rows(&self.a, block.range(), &self.b))
        }));

        match computed {
            Ok(Ok(matrix)) => Ok(PartialResult { block, matrix }),
            Ok(Err(err)) => Err(Error::worker(block.start, err.to_string())),
            Err(payload) => Err(Error::worker(block.start, panic_message(payload.as_ref()))),
        }
    }
}

/// Product of one row-block with B, tagged with the block it came from.
#[derive(Debug)]
pub(crate) struct PartialResult {
    block: RowBlock,
    matrix: Matrix,
}

/// Concatenates partial results in ascending row order.
///
/// Fails if the blocks do not tile `0..rows` exactly.
fn merge(mut partials: Vec<PartialResult>, rows: usize, cols: usize) -> Result<Matrix, Error> {
    partials.sort_by_key(|p| p.block.start);

    let mut data = Vec::with_capacity(rows * cols);
    let mut next = 0;
    for partial in partials {
        let PartialResult { block, matrix } = partial;
        if block.start != next || matrix.dims() != (block.len, cols) {
            return Err(Error::worker(
                block.start,
                format!("row-block does not continue at row {}", next),
            ));
        }
        next = block.end();
        data.extend(matrix.into_data());
    }

    if next != rows {
        return Err(Error::pool(format!("collected {} of {} rows", next, rows)));
    }

    info!(rows, cols, "merged row-blocks");
    Ok(Matrix::from_parts(rows, cols, data))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", msg)
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn partial(start: usize, rows: Vec<Vec<f64>>) -> PartialResult {
        let matrix = Matrix::from_rows(rows).unwrap();
        PartialResult {
            block: RowBlock::new(start, matrix.rows()),
            matrix,
        }
    }

    #[test]
    fn test_merge_restores_row_order() {
        let partials = vec![
            partial(3, vec![vec![3.0]]),
            partial(0, vec![vec![0.0], vec![1.0]]),
            partial(2, vec![vec![2.0]]),
        ];
        let merged = merge(partials, 4, 1).unwrap();
        assert_eq!(
            merged.to_rows(),
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]]
        );
    }

    #[test]
    fn test_merge_rejects_gap() {
        let partials = vec![partial(0, vec![vec![0.0]]), partial(2, vec![vec![2.0]])];
        let err = merge(partials, 3, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::WorkerFailure {
                block_start: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_merge_rejects_missing_tail() {
        let partials = vec![partial(0, vec![vec![0.0]])];
        assert!(matches!(
            merge(partials, 2, 1),
            Err(Error::WorkerFailure {
                block_start: None,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let a = Matrix::identity(2).unwrap();
        let err = ParallelMultiplier::new().workers(0).multiply(&a, &a).unwrap_err();
        assert!(matches!(err, Error::InvalidWorkerCount));
    }

    #[test]
    fn test_dimension_mismatch_dispatches_nothing() {
        let a = Matrix::from_fn(8, 3, |i, j| (i + j) as f64).unwrap();
        let b = Matrix::identity(2).unwrap();
        let dispatched = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&dispatched);

        let err = ParallelMultiplier::new()
            .leaf_hook(move |_| *counter.lock().unwrap() += 1)
            .multiply(&a, &b)
            .unwrap_err();

        assert!(matches!(err, Error::DimensionMismatch(8, 3, 2, 2)));
        assert_eq!(*dispatched.lock().unwrap(), 0);
    }

    #[test]
    fn test_panicking_leaf_fails_whole_call() {
        let a = Matrix::from_fn(16, 4, |i, j| (i * 4 + j) as f64).unwrap();
        let b = Matrix::identity(4).unwrap();

        let err = ParallelMultiplier::new()
            .workers(2)
            .leaf_hook(|block| {
                if block.start == 8 {
                    panic!("injected failure");
                }
            })
            .multiply(&a, &b)
            .unwrap_err();

        match err {
            Error::WorkerFailure {
                block_start: Some(8),
                reason,
            } => assert!(reason.contains("injected failure"), "{}", reason),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_skewed_completion_keeps_row_order() {
        let a = Matrix::from_fn(16, 3, |i, j| (i * 10 + j) as f64).unwrap();
        let b = Matrix::identity(3).unwrap();
        let finished = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&finished);

        let c = ParallelMultiplier::new()
            .workers(4)
            .leaf_hook(move |block| {
                // Earlier blocks sleep longer and finish last.
                std::thread::sleep(Duration::from_millis(40 * (16 - block.start as u64) / 4));
                log.lock().unwrap().push(block.start);
            })
            .multiply(&a, &b)
            .unwrap();

        assert_eq!(c, a);
        let finished = finished.lock().unwrap();
        assert_eq!(finished.len(), 4);
        assert_ne!(finished.first(), Some(&0));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked: boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked: bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "worker panicked");
    }
}
