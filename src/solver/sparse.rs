//! Sparse matrix storage and Cholesky solver.
//!
//! [`CsrMatrix`] is a lightweight compressed-sparse-row matrix used to
//! assemble the mesh Laplacian. [`CholeskySolver`] wraps faer's supernodal
//! LLᵀ factorization so that one factorization can serve many right-hand
//! sides.
//!
//! ## Workflow
//! 1. `factorize(matrix)`: CSR → CSC, symbolic + numeric LLᵀ
//! 2. `solve(rhs)`: forward/backward substitution on the cached factor
//! 3. Repeat `solve()` with new right-hand sides until the matrix changes

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::{SparseColMat, Triplet};
use faer::{Mat, Side};
use nalgebra::{Point3, Vector3};

use crate::error::{DeformError, Result};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Number of rows.
    rows: usize,
    /// Number of columns.
    cols: usize,
    /// Row pointers: row_ptr[i] is the index in col_idx/values where row i starts.
    /// Length is rows + 1, with row_ptr[rows] = nnz.
    row_ptr: Vec<usize>,
    /// Column indices for each non-zero value, ascending within a row.
    col_idx: Vec<usize>,
    /// Non-zero values.
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_counts = vec![0usize; rows];
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut prev: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols, "triplet ({}, {}) out of bounds", row, col);
            if prev == Some((row, col)) {
                // Same position: accumulate value
                if let Some(last) = values.last_mut() {
                    *last += val;
                }
            } else {
                col_idx.push(col);
                values.push(val);
                row_counts[row] += 1;
                prev = Some((row, col));
            }
        }

        let mut row_ptr = Vec::with_capacity(rows + 1);
        row_ptr.push(0);
        for count in row_counts {
            let last = row_ptr[row_ptr.len() - 1];
            row_ptr.push(last + count);
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Get the number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get the number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the stored `(col, value)` pairs of a row.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Look up an entry; absent entries are zero.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[range.clone()].binary_search(&j) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// Diagonal entry of a row.
    #[inline]
    pub fn diagonal(&self, i: usize) -> f64 {
        self.get(i, i)
    }

    /// Sum of the stored entries of a row.
    pub fn row_sum(&self, i: usize) -> f64 {
        self.row(i).map(|(_, v)| v).sum()
    }

    /// Whether the matrix equals its transpose up to `tolerance`.
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        if self.rows != self.cols {
            return false;
        }
        (0..self.rows).all(|i| self.row(i).all(|(j, v)| (v - self.get(j, i)).abs() <= tolerance))
    }

    /// Multiply matrix by a block of 3-vectors: `y = A * x`.
    pub fn mul_points(&self, x: &[Point3<f64>]) -> Vec<Vector3<f64>> {
        assert_eq!(x.len(), self.cols, "Vector dimension mismatch");

        (0..self.rows)
            .map(|i| {
                self.row(i)
                    .fold(Vector3::zeros(), |acc, (j, v)| acc + v * x[j].coords)
            })
            .collect()
    }

    /// Convert to faer's column-major sparse format.
    fn to_faer(&self) -> Result<SparseColMat<usize, f64>> {
        let mut triplets: Vec<Triplet<usize, usize, f64>> = Vec::with_capacity(self.nnz());
        for row in 0..self.rows {
            for (col, val) in self.row(row) {
                triplets.push(Triplet { row, col, val });
            }
        }

        SparseColMat::try_new_from_triplets(self.rows, self.cols, &triplets)
            .map_err(|e| DeformError::Factorization(format!("invalid sparse matrix: {e:?}")))
    }
}

/// Sparse Cholesky (LLᵀ) solver.
///
/// Holds a factorization for reuse across any number of solves.
#[derive(Default)]
pub struct CholeskySolver {
    factorization: Option<Llt<usize, f64>>,
    dimension: usize,
}

impl CholeskySolver {
    /// Create an unfactorized solver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factorize a symmetric positive definite matrix, replacing any previous factor.
    ///
    /// On failure the previous factor is discarded.
    pub fn factorize(&mut self, matrix: &CsrMatrix) -> Result<()> {
        self.factorization = None;

        if matrix.nrows() != matrix.ncols() {
            return Err(DeformError::Factorization(format!(
                "matrix must be square, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        if matrix.nrows() == 0 {
            return Err(DeformError::Factorization("cannot factorize an empty matrix".into()));
        }

        let csc = matrix.to_faer()?;

        let symbolic = SymbolicLlt::try_new(csc.symbolic().as_ref(), Side::Upper)
            .map_err(|e| DeformError::Factorization(format!("symbolic analysis failed: {e:?}")))?;
        let llt = Llt::try_new_with_symbolic(symbolic, csc.as_ref(), Side::Upper)
            .map_err(|e| DeformError::Factorization(format!("matrix is not positive definite: {e:?}")))?;

        self.factorization = Some(llt);
        self.dimension = matrix.nrows();
        Ok(())
    }

    /// Whether a valid factorization is cached.
    #[inline]
    pub fn is_factorized(&self) -> bool {
        self.factorization.is_some()
    }

    /// Drop the cached factorization.
    pub fn reset(&mut self) {
        self.factorization = None;
        self.dimension = 0;
    }

    /// Solve `A X = B` for the three coordinate columns of `rhs` at once.
    pub fn solve_points(&self, rhs: &[Vector3<f64>]) -> Result<Vec<Point3<f64>>> {
        let llt = self
            .factorization
            .as_ref()
            .ok_or_else(|| DeformError::Factorization("solver is not factorized".into()))?;

        if rhs.len() != self.dimension {
            return Err(DeformError::Factorization(format!(
                "right-hand side has {} rows, matrix has {}",
                rhs.len(),
                self.dimension
            )));
        }

        let b: Mat<f64> = Mat::from_fn(self.dimension, 3, |i, j| rhs[i][j]);
        let x = llt.solve(&b);

        Ok((0..self.dimension)
            .map(|i| Point3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
            .collect())
    }
}

impl std::fmt::Debug for CholeskySolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CholeskySolver")
            .field("dimension", &self.dimension)
            .field("factorized", &self.is_factorized())
            .finish()
    }
}
