//! Matrix Store
//!
//! Owns the two input matrices `A`, `B` and the output matrix `C`.
//! All three are always `N x N`. `C` is write-only from the point of view of
//! the computation: it is zeroed at the start of every run and filled cell by
//! cell (stepwise) or row by row (continuous write-back).

use crate::error::SimError;
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Smallest value a cell of `A` or `B` may hold.
pub const CELL_MIN: i64 = 0;

/// Largest value a cell of `A` or `B` may hold.
pub const CELL_MAX: i64 = 9;

/// Names the three matrices of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixName {
    A,
    B,
    C,
}

impl std::fmt::Display for MatrixName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatrixName::A => "A",
            MatrixName::B => "B",
            MatrixName::C => "C",
        };
        write!(f, "{}", name)
    }
}

/// Read-only copy of the inputs handed to worker tasks.
#[derive(Debug, Clone)]
pub struct Operands {
    pub a: Arc<DMatrix<i64>>,
    pub b: Arc<DMatrix<i64>>,
}

impl Operands {
    /// Returns `A[row][k] * B[k][col]`.
    pub fn term(&self, row: usize, col: usize, k: usize) -> i64 {
        self.a[(row, k)] * self.b[(k, col)]
    }

    /// Side length of the operands.
    pub fn size(&self) -> usize {
        self.a.nrows()
    }
}

/// The shared matrix store.
#[derive(Debug, Clone)]
pub struct MatrixStore {
    a: DMatrix<i64>,
    b: DMatrix<i64>,
    c: DMatrix<i64>,
}

impl MatrixStore {
    /// Creates a store with all three matrices zeroed.
    pub fn zeros(size: usize) -> Self {
        Self {
            a: DMatrix::zeros(size, size),
            b: DMatrix::zeros(size, size),
            c: DMatrix::zeros(size, size),
        }
    }

    /// Creates a store from explicit row-major inputs.
    ///
    /// Values are clamped into `[CELL_MIN, CELL_MAX]` like manual entry.
    pub fn from_rows(a: &[Vec<i64>], b: &[Vec<i64>]) -> Result<Self, SimError> {
        let size = a.len();
        if b.len() != size {
            return Err(SimError::InvalidShape(format!(
                "A has {} rows but B has {}",
                size,
                b.len()
            )));
        }
        for (name, rows) in [(MatrixName::A, a), (MatrixName::B, b)] {
            if let Some(bad) = rows.iter().position(|r| r.len() != size) {
                return Err(SimError::InvalidShape(format!(
                    "row {} of {} has {} columns, expected {}",
                    bad,
                    name,
                    rows[bad].len(),
                    size
                )));
            }
        }

        let build = |rows: &[Vec<i64>]| {
            DMatrix::from_fn(size, size, |i, j| rows[i][j].clamp(CELL_MIN, CELL_MAX))
        };

        Ok(Self {
            a: build(a),
            b: build(b),
            c: DMatrix::zeros(size, size),
        })
    }

    /// Fills `A` and `B` with independent uniform integers in `[0, 9]`
    /// and resets `C` to the `size x size` zero matrix.
    pub fn generate_random<R: Rng + ?Sized>(&mut self, size: usize, rng: &mut R) {
        self.a = DMatrix::from_fn(size, size, |_, _| rng.gen_range(CELL_MIN..=CELL_MAX));
        self.b = DMatrix::from_fn(size, size, |_, _| rng.gen_range(CELL_MIN..=CELL_MAX));
        self.c = DMatrix::zeros(size, size);
    }

    /// Sets one input cell, clamping the value into `[0, 9]`.
    ///
    /// Out-of-range indices and writes to `C` are ignored.
    pub fn set_cell(&mut self, matrix: MatrixName, row: usize, col: usize, value: i64) {
        let size = self.size();
        if row >= size || col >= size {
            return;
        }
        let target = match matrix {
            MatrixName::A => &mut self.a,
            MatrixName::B => &mut self.b,
            MatrixName::C => return,
        };
        target[(row, col)] = value.clamp(CELL_MIN, CELL_MAX);
    }

    /// Returns `sum_k A[row][k] * B[k][col]` without touching `C`.
    ///
    /// # Panics
    /// Panics if `row` or `col` is outside `[0, N)`.
    pub fn compute_cell(&self, row: usize, col: usize) -> i64 {
        (0..self.size())
            .map(|k| self.a[(row, k)] * self.b[(k, col)])
            .sum()
    }

    /// Writes a computed value into `C`.
    pub fn write_cell(&mut self, row: usize, col: usize, value: i64) {
        if row < self.size() && col < self.size() {
            self.c[(row, col)] = value;
        }
    }

    /// Writes a full computed row into `C`.
    pub fn write_row(&mut self, row: usize, values: &[i64]) {
        if row >= self.size() {
            return;
        }
        for (col, value) in values.iter().take(self.size()).enumerate() {
            self.c[(row, col)] = *value;
        }
    }

    /// Zeroes `C`.
    pub fn reset_output(&mut self) {
        self.c.fill(0);
    }

    /// Side length `N`.
    pub fn size(&self) -> usize {
        self.a.nrows()
    }

    /// Returns one of the three matrices.
    pub fn matrix(&self, name: MatrixName) -> &DMatrix<i64> {
        match name {
            MatrixName::A => &self.a,
            MatrixName::B => &self.b,
            MatrixName::C => &self.c,
        }
    }

    /// Returns a cell value, or `None` when out of bounds.
    pub fn get(&self, name: MatrixName, row: usize, col: usize) -> Option<i64> {
        self.matrix(name).get((row, col)).copied()
    }

    /// Row-major copy of a matrix, for display and export.
    pub fn rows(&self, name: MatrixName) -> Vec<Vec<i64>> {
        let m = self.matrix(name);
        (0..m.nrows())
            .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
            .collect()
    }

    /// Snapshot of the inputs for worker tasks.
    pub fn operands(&self) -> Operands {
        Operands {
            a: Arc::new(self.a.clone()),
            b: Arc::new(self.b.clone()),
        }
    }
}
