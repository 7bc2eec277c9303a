//! Sequential vs. parallel timing harness.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::info;

use crate::parallel::hardware_concurrency;
use crate::{Error, Matrix, ParallelMultiplier, SequentialMultiplier};

const DEFAULT_SIZE: usize = 64;
const DEFAULT_RUNS: usize = 1;

/// Parameters for one benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// A and B are `size`×`size`.
    pub size: usize,
    /// Timed evaluations per path, after one warm-up.
    pub runs: usize,
    pub workers: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            runs: DEFAULT_RUNS,
            workers: hardware_concurrency(),
        }
    }
}

/// Shortest timing a report divides by; `Instant` rarely resolves finer.
const MIN_TIMING: Duration = Duration::from_nanos(1);

/// Average timings of both paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchReport {
    pub sequential: Duration,
    pub parallel: Duration,
    /// Pool size the parallel path ran with.
    pub workers: usize,
    /// Hardware threads on the host; efficiency is measured against this.
    pub hardware_threads: usize,
}

impl BenchReport {
    /// Sequential time over parallel time.
    ///
    /// Timings shorter than a nanosecond count as one nanosecond, so the
    /// ratio is always finite.
    pub fn speedup(&self) -> f64 {
        self.sequential.max(MIN_TIMING).as_secs_f64() / self.parallel.max(MIN_TIMING).as_secs_f64()
    }

    /// Speedup per hardware thread, as a percentage.
    pub fn efficiency(&self) -> f64 {
        100.0 * self.speedup() / self.hardware_threads.max(1) as f64
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Average Sequential Time: {:.2} ms",
            self.sequential.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "Average Parallel Time: {:.2} ms",
            self.parallel.as_secs_f64() * 1000.0
        )?;
        writeln!(f, "Speedup: {:.2} ({} workers)", self.speedup(), self.workers)?;
        write!(
            f,
            "Efficiency: {:.2}% of {} hardware threads",
            self.efficiency(),
            self.hardware_threads
        )
    }
}

/// Multiplies two random matrices both ways and times them.
///
/// The warm-up products are compared element by element; any difference
/// fails with [`Error::ResultMismatch`] before timing starts.
pub fn run(config: &BenchConfig, rng: &mut impl Rng) -> Result<BenchReport, Error> {
    if config.runs == 0 {
        return Err(Error::InvalidRunCount);
    }

    let a = Matrix::random(config.size, config.size, rng)?;
    let b = Matrix::random(config.size, config.size, rng)?;
    let sequential = SequentialMultiplier::new();
    let parallel = ParallelMultiplier::new().workers(config.workers);

    info!(size = config.size, "warming up sequential path");
    let expected = sequential.multiply(&a, &b)?;
    info!(workers = config.workers, "warming up parallel path");
    let actual = parallel.multiply(&a, &b)?;
    compare(&expected, &actual)?;

    let seq_time = average(config.runs, || sequential.multiply(&a, &b))?;
    let par_time = average(config.runs, || parallel.multiply(&a, &b))?;

    Ok(BenchReport {
        sequential: seq_time,
        parallel: par_time,
        workers: config.workers,
        hardware_threads: hardware_concurrency(),
    })
}

/// Fails with `ResultMismatch` at the first element where the products differ.
pub fn compare(sequential: &Matrix, parallel: &Matrix) -> Result<(), Error> {
    match sequential.first_difference(parallel) {
        None => Ok(()),
        Some((row, col)) => Err(Error::ResultMismatch {
            row,
            col,
            sequential: sequential.get(row, col).unwrap_or(f64::NAN),
            parallel: parallel.get(row, col).unwrap_or(f64::NAN),
        }),
    }
}

fn average(
    runs: usize,
    mut multiply: impl FnMut() -> Result<Matrix, Error>,
) -> Result<Duration, Error> {
    let mut total = Duration::ZERO;
    for _ in 0..runs {
        let start = Instant::now();
        multiply()?;
        total += start.elapsed();
    }
    Ok(total.div_f64(runs as f64))
}
