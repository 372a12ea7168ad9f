use alloc::vec;
use alloc::vec::Vec;

use crate::dynmatrix::{DynMatrix, DynVector};
use crate::traits::{FloatScalar, MatrixMut};

/// Column-pivoted QR decomposition in place using Householder reflections.
///
/// On return, `a` contains the packed factorization of `A * P`:
/// - Upper triangle (including diagonal): R
/// - Lower triangle (excluding diagonal): Householder vectors (scaled)
///
/// `tau` receives the Householder scalar factors and `jpvt` the column
/// permutation (`jpvt[j]` is the original index of pivoted column `j`).
/// Returns the numerical rank: the column loop stops once the largest
/// remaining column norm falls below `eps * (first pivot norm)`, so a
/// singular input never fails — it just yields a short R.
///
/// Works on rectangular matrices with `M >= N`.
pub fn col_piv_qr_in_place<T: FloatScalar>(
    a: &mut impl MatrixMut<T>,
    tau: &mut [T],
    jpvt: &mut [usize],
) -> usize {
    let m = a.nrows();
    let n = a.ncols();
    let k = m.min(n);
    assert!(m >= n, "QR decomposition requires M >= N");
    assert_eq!(tau.len(), k, "tau length must equal min(M, N)");
    assert_eq!(jpvt.len(), n, "jpvt length must equal N");

    for (j, p) in jpvt.iter_mut().enumerate() {
        *p = j;
    }
    for t in tau.iter_mut() {
        *t = T::zero();
    }

    // Running squared norms of the trailing sub-columns, used for pivoting.
    let mut col_norms = vec![T::zero(); n];
    for j in 0..n {
        let mut s = T::zero();
        for i in 0..m {
            let v = *a.get(i, j);
            s = s + v * v;
        }
        col_norms[j] = s;
    }

    let mut pivot_threshold = T::zero();
    let mut rank = k;

    for col in 0..k {
        // Pivot: bring the column with the largest remaining norm forward
        let mut max_col = col;
        let mut max_norm = col_norms[col];
        for j in (col + 1)..n {
            if col_norms[j] > max_norm {
                max_norm = col_norms[j];
                max_col = j;
            }
        }
        if max_col != col {
            jpvt.swap(col, max_col);
            col_norms.swap(col, max_col);
            for i in 0..m {
                let tmp = *a.get(i, col);
                *a.get_mut(i, col) = *a.get(i, max_col);
                *a.get_mut(i, max_col) = tmp;
            }
        }

        // Recompute the sub-column norm directly (the running update drifts)
        let mut norm_sq = T::zero();
        for i in col..m {
            let v = *a.get(i, col);
            norm_sq = norm_sq + v * v;
        }
        let norm = norm_sq.sqrt();

        if col == 0 {
            pivot_threshold = norm * T::epsilon() * T::from(m.max(n)).unwrap();
        }
        if norm <= pivot_threshold || norm == T::zero() {
            rank = col;
            break;
        }

        // sigma = sign(a[col,col]) * ||x|| so v0 = a + sigma avoids cancellation
        let a_col_col = *a.get(col, col);
        let sigma = if a_col_col < T::zero() { -norm } else { norm };

        let v0 = a_col_col + sigma;
        *a.get_mut(col, col) = v0;
        let tau_val = v0 / sigma;
        tau[col] = tau_val;

        // Scale the sub-diagonal entries by 1/v0 for storage
        for i in (col + 1)..m {
            let val = *a.get(i, col) / v0;
            *a.get_mut(i, col) = val;
        }

        // Apply H to trailing columns: A[col:m, j] -= tau * v * (v^T * A[col:m, j])
        // where v = [1, a[col+1,col], ..., a[m-1,col]]
        for j in (col + 1)..n {
            let mut dot = *a.get(col, j);
            for i in (col + 1)..m {
                dot = dot + *a.get(i, col) * *a.get(i, j);
            }
            dot = dot * tau_val;

            *a.get_mut(col, j) = *a.get(col, j) - dot;
            for i in (col + 1)..m {
                let vi = *a.get(i, col);
                let old = *a.get(i, j);
                *a.get_mut(i, j) = old - dot * vi;
            }

            // Downdate the running norm for the pivot search
            let head = *a.get(col, j);
            col_norms[j] = col_norms[j] - head * head;
            if col_norms[j] < T::zero() {
                col_norms[j] = T::zero();
            }
        }
        col_norms[col] = T::zero();

        // Store -sigma (the R diagonal entry) in a[col, col]
        *a.get_mut(col, col) = -sigma;
    }

    rank
}

/// Column-pivoted QR decomposition of a dynamically-sized matrix.
///
/// The one dense solver in the crate. Rank deficiency is not an error:
/// `solve` returns the basic least-squares solution with the free
/// variables zeroed, so callers (the semi-implicit ODE sub-stepper and
/// Newton-Raphson) degrade gracefully instead of aborting when the
/// iteration matrix goes singular.
///
/// # Example
///
/// ```
/// use stiffode::{DynColPivQr, DynMatrix, DynVector};
///
/// let a = DynMatrix::from_rows(2, 2, &[2.0_f64, 1.0, 5.0, 3.0]);
/// let qr = DynColPivQr::new(&a);
/// let x = qr.solve(&DynVector::from_slice(&[4.0, 11.0]));
/// assert!((x[0] - 1.0).abs() < 1e-12);
/// assert!((x[1] - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct DynColPivQr<T> {
    qr: DynMatrix<T>,
    tau: Vec<T>,
    jpvt: Vec<usize>,
    rank: usize,
}

impl<T: FloatScalar> DynColPivQr<T> {
    /// Decompose a matrix (`M >= N`). Never fails; inspect [`rank`](Self::rank).
    pub fn new(a: &DynMatrix<T>) -> Self {
        let k = a.nrows().min(a.ncols());
        let mut qr = a.clone();
        let mut tau = vec![T::zero(); k];
        let mut jpvt = vec![0usize; a.ncols()];
        let rank = col_piv_qr_in_place(&mut qr, &mut tau, &mut jpvt);
        Self { qr, tau, jpvt, rank }
    }

    /// Numerical rank detected during pivoting.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether the matrix was numerically full rank.
    #[inline]
    pub fn is_full_rank(&self) -> bool {
        self.rank == self.qr.ncols()
    }

    /// Solve `min ||Ax - b||` for `x`.
    ///
    /// Applies the stored Householder reflections to `b`, back-substitutes
    /// through the leading `rank x rank` block of R, zeroes the free
    /// variables, and undoes the column permutation. For a full-rank
    /// square matrix this is the exact solution of `Ax = b`.
    ///
    /// Panics if `b.len() != nrows`.
    pub fn solve(&self, b: &DynVector<T>) -> DynVector<T> {
        let m = self.qr.nrows();
        let n = self.qr.ncols();
        assert_eq!(b.len(), m, "rhs length mismatch: {} vs {} rows", b.len(), m);

        // qtb = Q^T b, one reflection at a time
        let mut qtb = vec![T::zero(); m];
        for i in 0..m {
            qtb[i] = b[i];
        }
        for col in 0..self.rank {
            let tau_val = self.tau[col];
            let mut dot = qtb[col];
            for i in (col + 1)..m {
                dot = dot + self.qr[(i, col)] * qtb[i];
            }
            dot = dot * tau_val;

            qtb[col] = qtb[col] - dot;
            for i in (col + 1)..m {
                qtb[i] = qtb[i] - dot * self.qr[(i, col)];
            }
        }

        // Back substitution through R[0..rank, 0..rank]
        let mut z = vec![T::zero(); n];
        for i in (0..self.rank).rev() {
            let mut sum = qtb[i];
            for j in (i + 1)..self.rank {
                sum = sum - self.qr[(i, j)] * z[j];
            }
            z[i] = sum / self.qr[(i, i)];
        }

        // Undo the column permutation
        let mut x = DynVector::zeros(n, T::zero());
        for j in 0..n {
            x[self.jpvt[j]] = z[j];
        }
        x
    }
}
