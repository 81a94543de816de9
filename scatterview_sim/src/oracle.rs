//! Ground truth oracle for simulation.
//!
//! The Oracle computes `A x B` independently of the engine, with nalgebra's
//! matrix product, and checks a finished store against it.

use nalgebra::DMatrix;
use scatterview_core::{MatrixName, MatrixStore};
use thiserror::Error;

/// A cell of `C` that disagrees with the ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("C[{row}][{col}] = {actual}, expected {expected}")]
pub struct Mismatch {
    pub row: usize,
    pub col: usize,
    pub expected: i64,
    pub actual: i64,
}

/// The Oracle - holds the expected product for one pair of inputs.
pub struct Oracle {
    expected: DMatrix<i64>,
}

impl Oracle {
    /// Computes the ground truth for the store's current inputs.
    pub fn new(store: &MatrixStore) -> Self {
        let expected = store.matrix(MatrixName::A) * store.matrix(MatrixName::B);
        Self { expected }
    }

    /// Ground truth from explicit row-major inputs.
    pub fn from_rows(a: &[Vec<i64>], b: &[Vec<i64>]) -> Self {
        let n = a.len();
        let to_matrix = |rows: &[Vec<i64>]| DMatrix::from_fn(n, n, |i, j| rows[i][j]);
        Self {
            expected: to_matrix(a) * to_matrix(b),
        }
    }

    /// Expected value of `C[row][col]`.
    pub fn expected(&self, row: usize, col: usize) -> Option<i64> {
        self.expected.get((row, col)).copied()
    }

    /// Expected `C` in row-major form.
    pub fn expected_rows(&self) -> Vec<Vec<i64>> {
        (0..self.expected.nrows())
            .map(|i| (0..self.expected.ncols()).map(|j| self.expected[(i, j)]).collect())
            .collect()
    }

    /// Returns the first cell of `C` that differs from the ground truth.
    pub fn verify(&self, store: &MatrixStore) -> Result<(), Mismatch> {
        let actual = store.matrix(MatrixName::C);
        for row in 0..self.expected.nrows() {
            for col in 0..self.expected.ncols() {
                let expected = self.expected[(row, col)];
                let got = actual.get((row, col)).copied().unwrap_or(i64::MIN);
                if got != expected {
                    return Err(Mismatch {
                        row,
                        col,
                        expected,
                        actual: got,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textbook() -> (Vec<Vec<i64>>, Vec<Vec<i64>>) {
        (vec![vec![1, 2], vec![3, 4]], vec![vec![5, 6], vec![7, 8]])
    }

    #[test]
    fn test_textbook_product() {
        let (a, b) = textbook();
        let oracle = Oracle::from_rows(&a, &b);
        assert_eq!(oracle.expected_rows(), vec![vec![19, 22], vec![43, 50]]);
    }

    #[test]
    fn test_store_and_rows_agree() {
        let (a, b) = textbook();
        let store = MatrixStore::from_rows(&a, &b).unwrap();
        assert_eq!(
            Oracle::new(&store).expected_rows(),
            Oracle::from_rows(&a, &b).expected_rows()
        );
    }

    #[test]
    fn test_verify_reports_first_mismatch() {
        let (a, b) = textbook();
        let mut store = MatrixStore::from_rows(&a, &b).unwrap();
        let oracle = Oracle::new(&store);

        store.write_row(0, &[19, 22]);
        store.write_row(1, &[43, 51]);
        assert_eq!(
            oracle.verify(&store),
            Err(Mismatch {
                row: 1,
                col: 1,
                expected: 50,
                actual: 51
            })
        );

        store.write_cell(1, 1, 50);
        assert!(oracle.verify(&store).is_ok());
    }
}
