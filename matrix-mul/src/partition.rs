//! Row-range bisection for the parallel multiplier.

use std::ops::Range;

use crate::Error;

const DEFAULT_DIVISOR: usize = 4;

/// A contiguous run of rows, `start..start + len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowBlock {
    pub start: usize,
    pub len: usize,
}

impl RowBlock {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Controls when bisection stops.
///
/// A block becomes a leaf once it holds at most `rows / divisor` rows of
/// the original matrix. The threshold is fixed by the top-level row count
/// and does not shrink as the tree deepens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPolicy {
    divisor: usize,
}

impl PartitionPolicy {
    pub fn new(divisor: usize) -> Result<Self, Error> {
        if divisor == 0 {
            return Err(Error::InvalidPartition);
        }
        Ok(Self { divisor })
    }

    pub fn divisor(&self) -> usize {
        self.divisor
    }

    /// Largest leaf, in rows, for a matrix with `rows` rows. Zero means the
    /// matrix is too small to split and is computed as one leaf.
    pub fn threshold(&self, rows: usize) -> usize {
        rows / self.divisor
    }
}

impl Default for PartitionPolicy {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_DIVISOR,
        }
    }
}

/// Splits `0..rows` into leaf row-blocks by repeated halving.
///
/// The left half of a block gets `len / 2` rows and the right half the
/// remainder, so no row is skipped. Leaves are returned in ascending
/// `start` order and together cover `0..rows` exactly once.
pub fn partition(rows: usize, policy: PartitionPolicy) -> Vec<RowBlock> {
    if rows == 0 {
        return Vec::new();
    }

    let threshold = policy.threshold(rows);
    if threshold == 0 {
        return vec![RowBlock::new(0, rows)];
    }

    let mut leaves = Vec::new();
    let mut pending = vec![RowBlock::new(0, rows)];

    // Right half is pushed first so leaves pop off in row order.
    while let Some(block) = pending.pop() {
        if block.len <= threshold {
            leaves.push(block);
            continue;
        }
        let half = block.len / 2;
        pending.push(RowBlock::new(block.start + half, block.len - half));
        pending.push(RowBlock::new(block.start, half));
    }

    leaves
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(leaves: &[RowBlock], rows: usize) {
        let mut next = 0;
        for leaf in leaves {
            assert_eq!(leaf.start, next, "gap or overlap before {:?}", leaf);
            assert!(leaf.len > 0);
            next = leaf.end();
        }
        assert_eq!(next, rows);
    }

    #[test]
    fn test_sixty_four_rows() {
        let leaves = partition(64, PartitionPolicy::default());
        assert_eq!(leaves.len(), 4);
        assert!(leaves.iter().all(|b| b.len == 16));
        assert_covers(&leaves, 64);
    }

    #[test]
    fn test_uneven_rows() {
        for rows in [4, 5, 7, 9, 10, 13, 31, 33, 100, 127] {
            let leaves = partition(rows, PartitionPolicy::default());
            let threshold = rows / 4;
            assert!(leaves.len() >= 4, "{} rows gave {:?}", rows, leaves);
            assert!(leaves.iter().all(|b| b.len <= threshold));
            assert_covers(&leaves, rows);
        }
    }

    #[test]
    fn test_small_matrix_is_single_leaf() {
        for rows in 1..4 {
            assert_eq!(
                partition(rows, PartitionPolicy::default()),
                vec![RowBlock::new(0, rows)]
            );
        }
    }

    #[test]
    fn test_seven_rows_bisect_without_dropping() {
        // threshold 1: 7 -> 3 + 4 -> 1 + 2, 2 + 2 -> all ones
        let leaves = partition(7, PartitionPolicy::default());
        assert_eq!(leaves.len(), 7);
        assert_covers(&leaves, 7);
    }

    #[test]
    fn test_custom_divisor() {
        let policy = PartitionPolicy::new(2).unwrap();
        assert_eq!(
            partition(10, policy),
            vec![RowBlock::new(0, 5), RowBlock::new(5, 5)]
        );

        let single = PartitionPolicy::new(1).unwrap();
        assert_eq!(partition(10, single), vec![RowBlock::new(0, 10)]);

        assert!(matches!(PartitionPolicy::new(0), Err(Error::InvalidPartition)));
    }

    #[test]
    fn test_row_block_range() {
        let block = RowBlock::new(3, 4);
        assert_eq!(block.end(), 7);
        assert_eq!(block.range(), 3..7);
    }
}
