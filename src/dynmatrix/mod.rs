mod ops;
mod vector;

pub use vector::DynVector;

use alloc::vec;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use crate::traits::{MatrixMut, MatrixRef, Scalar};

/// Dynamically-sized heap-allocated matrix.
///
/// Column-major `Vec<T>` storage with runtime dimensions. Implements
/// [`MatrixRef`] and [`MatrixMut`], so the generic factorization routines
/// in [`crate::linalg`] work on it directly.
///
/// Problem dimension is a runtime quantity everywhere in this crate (the
/// equations being integrated or solved decide it), which is why the
/// solvers are built on `DynMatrix`/[`DynVector`] rather than const-generic
/// storage.
///
/// # Examples
///
/// ```
/// use stiffode::DynMatrix;
///
/// let a = DynMatrix::from_rows(2, 2, &[1.0_f64, 2.0, 3.0, 4.0]);
/// assert_eq!(a[(0, 1)], 2.0);
/// assert_eq!(a.nrows(), 2);
///
/// let id = DynMatrix::eye(3, 0.0_f64);
/// assert_eq!(id[(1, 1)], 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DynMatrix<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

impl<T: Scalar> DynMatrix<T> {
    /// Create an `nrows x ncols` matrix of zeros.
    ///
    /// The `_zero` parameter is only used for type inference.
    pub fn zeros(nrows: usize, ncols: usize, _zero: T) -> Self {
        Self {
            data: vec![T::zero(); nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Create a matrix filled with a given value.
    pub fn fill(nrows: usize, ncols: usize, value: T) -> Self {
        Self {
            data: vec![value; nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Create an `n x n` identity matrix.
    pub fn eye(n: usize, _zero: T) -> Self {
        let mut m = Self::zeros(n, n, T::zero());
        for i in 0..n {
            m[(i, i)] = T::one();
        }
        m
    }

    /// Create a matrix from a flat slice in row-major order.
    ///
    /// Transposes the data to column-major internal storage.
    /// Panics if `row_major.len() != nrows * ncols`.
    pub fn from_rows(nrows: usize, ncols: usize, row_major: &[T]) -> Self {
        assert_eq!(
            row_major.len(),
            nrows * ncols,
            "slice length {} does not match {}x{} matrix",
            row_major.len(),
            nrows,
            ncols,
        );
        let mut data = vec![T::zero(); nrows * ncols];
        for i in 0..nrows {
            for j in 0..ncols {
                data[j * nrows + i] = row_major[i * ncols + j];
            }
        }
        Self { data, nrows, ncols }
    }

    /// Create a matrix by calling `f(row, col)` for each element.
    pub fn from_fn(nrows: usize, ncols: usize, f: impl Fn(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data.push(f(i, j));
            }
        }
        Self { data, nrows, ncols }
    }

    /// Overwrite every element with `value`.
    pub fn set_all(&mut self, value: T) {
        for x in self.data.iter_mut() {
            *x = value;
        }
    }

    /// Copy `v` into column `col`.
    ///
    /// Panics if `v.len() != nrows` or `col` is out of range.
    pub fn set_col(&mut self, col: usize, v: &DynVector<T>) {
        assert!(col < self.ncols, "column {} out of range ({})", col, self.ncols);
        assert_eq!(
            v.len(),
            self.nrows,
            "column length mismatch: {} vs {} rows",
            v.len(),
            self.nrows,
        );
        for i in 0..self.nrows {
            self.data[col * self.nrows + i] = v[i];
        }
    }

    /// Extract column `col` as a vector.
    pub fn col(&self, col: usize) -> DynVector<T> {
        assert!(col < self.ncols, "column {} out of range ({})", col, self.ncols);
        DynVector::from_slice(&self.data[col * self.nrows..(col + 1) * self.nrows])
    }

    /// Matrix-vector product `A * v`.
    ///
    /// Panics if `v.len() != ncols`.
    pub fn matvec(&self, v: &DynVector<T>) -> DynVector<T> {
        assert_eq!(
            v.len(),
            self.ncols,
            "dimension mismatch: {}x{} * vector of length {}",
            self.nrows,
            self.ncols,
            v.len(),
        );
        let mut out = DynVector::zeros(self.nrows, T::zero());
        for j in 0..self.ncols {
            let vj = v[j];
            for i in 0..self.nrows {
                out[i] = out[i] + self.data[j * self.nrows + i] * vj;
            }
        }
        out
    }
}

impl<T> DynMatrix<T> {
    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Whether the matrix is square.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }
}

// ── MatrixRef / MatrixMut ───────────────────────────────────────────

impl<T> MatrixRef<T> for DynMatrix<T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> &T {
        &self.data[col * self.nrows + row]
    }
}

impl<T> MatrixMut<T> for DynMatrix<T> {
    #[inline]
    fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.data[col * self.nrows + row]
    }
}

// ── Index ───────────────────────────────────────────────────────────

impl<T> Index<(usize, usize)> for DynMatrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[col * self.nrows + row]
    }
}

impl<T> IndexMut<(usize, usize)> for DynMatrix<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        &mut self.data[col * self.nrows + row]
    }
}
