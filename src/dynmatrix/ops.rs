use core::ops::{Add, Mul, Neg, Sub};

use crate::traits::Scalar;

use super::DynMatrix;

impl<T: Scalar> Add<&DynMatrix<T>> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn add(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        assert_eq!(
            (self.nrows(), self.ncols()),
            (rhs.nrows(), rhs.ncols()),
            "dimension mismatch: {}x{} + {}x{}",
            self.nrows(),
            self.ncols(),
            rhs.nrows(),
            rhs.ncols(),
        );
        let mut out = self.clone();
        for j in 0..out.ncols() {
            for i in 0..out.nrows() {
                out[(i, j)] = out[(i, j)] + rhs[(i, j)];
            }
        }
        out
    }
}

impl<T: Scalar> Sub<&DynMatrix<T>> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn sub(self, rhs: &DynMatrix<T>) -> DynMatrix<T> {
        assert_eq!(
            (self.nrows(), self.ncols()),
            (rhs.nrows(), rhs.ncols()),
            "dimension mismatch: {}x{} - {}x{}",
            self.nrows(),
            self.ncols(),
            rhs.nrows(),
            rhs.ncols(),
        );
        let mut out = self.clone();
        for j in 0..out.ncols() {
            for i in 0..out.nrows() {
                out[(i, j)] = out[(i, j)] - rhs[(i, j)];
            }
        }
        out
    }
}

impl<T: Scalar> Mul<T> for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn mul(self, rhs: T) -> DynMatrix<T> {
        let mut out = self.clone();
        for j in 0..out.ncols() {
            for i in 0..out.nrows() {
                out[(i, j)] = out[(i, j)] * rhs;
            }
        }
        out
    }
}

impl<T: Scalar + Neg<Output = T>> Neg for &DynMatrix<T> {
    type Output = DynMatrix<T>;

    fn neg(self) -> DynMatrix<T> {
        let mut out = self.clone();
        for j in 0..out.ncols() {
            for i in 0..out.nrows() {
                out[(i, j)] = -out[(i, j)];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_scale_neg() {
        let a = DynMatrix::from_rows(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DynMatrix::from_rows(2, 2, &[4.0, 3.0, 2.0, 1.0]);

        let sum = &a + &b;
        assert_eq!(sum[(0, 0)], 5.0);
        assert_eq!(sum[(1, 1)], 5.0);

        let diff = &a - &b;
        assert_eq!(diff[(0, 0)], -3.0);
        assert_eq!(diff[(1, 1)], 3.0);

        let scaled = &a * 2.0;
        assert_eq!(scaled[(1, 0)], 6.0);

        let negated = -&a;
        assert_eq!(negated[(0, 1)], -2.0);
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn add_dimension_mismatch() {
        let a = DynMatrix::zeros(2, 2, 0.0_f64);
        let b = DynMatrix::zeros(2, 3, 0.0_f64);
        let _ = &a + &b;
    }
}
