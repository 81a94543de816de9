//! Work Assignment - row-wise partitioning of the output matrix.
//!
//! Rows are split into contiguous blocks of `ceil(N / W)` rows. When `N` is
//! not a multiple of `W` the last block is truncated, and workers whose block
//! would start at or past `N` get an empty range and do no work.

use scatterview_env::WorkerId;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One worker's share of the output rows: `[start_row, end_row)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub worker: WorkerId,
    pub start_row: usize,
    pub end_row: usize,
}

impl RowRange {
    /// Number of rows owned.
    pub fn len(&self) -> usize {
        self.end_row - self.start_row
    }

    /// True if the worker owns no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the worker has work to do.
    pub fn is_active(&self) -> bool {
        !self.is_empty()
    }

    /// The owned rows.
    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.end_row
    }
}

/// Rows per worker: `ceil(N / W)`. Zero workers own nothing.
pub fn rows_per_worker(matrix_size: usize, worker_count: usize) -> usize {
    if worker_count == 0 {
        return 0;
    }
    matrix_size.div_ceil(worker_count)
}

/// Maps `(N, W)` to one row range per worker, in worker-id order.
///
/// Excess workers (`W > N`, or trailing workers after an uneven split)
/// receive empty ranges anchored at `N`.
pub fn assign(matrix_size: usize, worker_count: usize) -> Vec<RowRange> {
    let per_worker = rows_per_worker(matrix_size, worker_count);

    WorkerId::range(worker_count)
        .map(|worker| {
            let start = (worker.index() * per_worker).min(matrix_size);
            let end = (start + per_worker).min(matrix_size);
            RowRange {
                worker,
                start_row: start,
                end_row: end,
            }
        })
        .collect()
}

/// Returns the worker owning `row`, if any.
pub fn owner_of(row: usize, matrix_size: usize, worker_count: usize) -> Option<WorkerId> {
    let per_worker = rows_per_worker(matrix_size, worker_count);
    if row >= matrix_size || per_worker == 0 {
        return None;
    }
    Some(WorkerId(row / per_worker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        let ranges = assign(8, 4);
        let spans: Vec<_> = ranges.iter().map(|r| (r.start_row, r.end_row)).collect();
        assert_eq!(spans, vec![(0, 2), (2, 4), (4, 6), (6, 8)]);
    }

    #[test]
    fn test_uneven_split_truncates_last_range() {
        let ranges = assign(3, 2);
        assert_eq!(rows_per_worker(3, 2), 2);
        assert_eq!(ranges[0].rows(), 0..2);
        assert_eq!(ranges[1].rows(), 2..3);
        assert_eq!(ranges[1].len(), 1);
    }

    #[test]
    fn test_more_workers_than_rows() {
        let ranges = assign(2, 4);
        assert_eq!(ranges.len(), 4);
        assert!(ranges[0].is_active());
        assert!(ranges[1].is_active());
        assert!(ranges[2].is_empty());
        assert!(ranges[3].is_empty());
        assert_eq!(ranges[3].start_row, 2);
    }

    #[test]
    fn test_trailing_workers_idle_after_ceil() {
        // ceil(5/4) = 2 -> rows 0-1, 2-3, 4, and nothing for worker 3
        let ranges = assign(5, 4);
        let lens: Vec<_> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(lens, vec![2, 2, 1, 0]);
    }

    #[test]
    fn test_zero_workers() {
        assert!(assign(4, 0).is_empty());
        assert_eq!(owner_of(0, 4, 0), None);
    }

    #[test]
    fn test_owner_of() {
        assert_eq!(owner_of(0, 3, 2), Some(WorkerId(0)));
        assert_eq!(owner_of(2, 3, 2), Some(WorkerId(1)));
        assert_eq!(owner_of(3, 3, 2), None);
    }

    proptest! {
        #[test]
        fn prop_ranges_partition_rows(n in 1usize..64, w in 1usize..32) {
            let ranges = assign(n, w);
            prop_assert_eq!(ranges.len(), w);

            let mut next = 0;
            for (i, r) in ranges.iter().enumerate() {
                prop_assert_eq!(r.worker, WorkerId(i));
                prop_assert!(r.start_row <= r.end_row);
                if r.is_active() {
                    prop_assert_eq!(r.start_row, next);
                    next = r.end_row;
                }
            }
            prop_assert_eq!(next, n);

            let covered: usize = ranges.iter().map(|r| r.len()).sum();
            prop_assert_eq!(covered, n);
        }

        #[test]
        fn prop_owner_matches_assignment(n in 1usize..64, w in 1usize..32) {
            for r in assign(n, w) {
                for row in r.rows() {
                    prop_assert_eq!(owner_of(row, n, w), Some(r.worker));
                }
            }
        }
    }
}
