use alloc::vec;
use alloc::vec::Vec;
use core::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Neg, Sub, SubAssign};

use crate::traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};

/// Dynamically-sized vector.
///
/// Flat `Vec<T>` storage with single-index access `v[i]`. This is the state
/// vector type used by every solver in the crate.
///
/// # Examples
///
/// ```
/// use stiffode::DynVector;
///
/// let v = DynVector::from_slice(&[3.0_f64, 4.0]);
/// assert_eq!(v.len(), 2);
/// assert!((v.norm() - 5.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DynVector<T> {
    data: Vec<T>,
}

impl<T: Scalar> DynVector<T> {
    /// Create a vector from a flat slice.
    pub fn from_slice(data: &[T]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    /// Create a vector from an owned `Vec`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Create a zero vector of length `n`.
    ///
    /// The `_zero` parameter is only used for type inference.
    pub fn zeros(n: usize, _zero: T) -> Self {
        Self {
            data: vec![T::zero(); n],
        }
    }

    /// Create a vector of length `n` filled with `value`.
    pub fn fill(n: usize, value: T) -> Self {
        Self {
            data: vec![value; n],
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the vector is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Overwrite every element with `value`.
    pub fn set_all(&mut self, value: T) {
        for x in self.data.iter_mut() {
            *x = value;
        }
    }

    /// Copy the elements of `other` into `self`.
    ///
    /// Panics on length mismatch.
    pub fn copy_from(&mut self, other: &Self) {
        assert_eq!(
            self.len(),
            other.len(),
            "vector length mismatch: {} vs {}",
            self.len(),
            other.len(),
        );
        self.data.copy_from_slice(&other.data);
    }

    /// Dot product.
    pub fn dot(&self, rhs: &Self) -> T {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} vs {}",
            self.len(),
            rhs.len(),
        );
        let mut sum = T::zero();
        for i in 0..self.len() {
            sum = sum + self.data[i] * rhs.data[i];
        }
        sum
    }

    /// View the vector data as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T: FloatScalar> DynVector<T> {
    /// Element-wise absolute value.
    pub fn abs(&self) -> Self {
        Self {
            data: self.data.iter().map(|x| x.abs()).collect(),
        }
    }

    /// Element-wise division.
    ///
    /// Panics on length mismatch.
    pub fn element_div(&self, rhs: &Self) -> Self {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} vs {}",
            self.len(),
            rhs.len(),
        );
        Self {
            data: self
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(&a, &b)| a / b)
                .collect(),
        }
    }

    /// Element-wise maximum.
    ///
    /// Panics on length mismatch.
    pub fn element_max(&self, rhs: &Self) -> Self {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} vs {}",
            self.len(),
            rhs.len(),
        );
        Self {
            data: self
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(&a, &b)| if a > b { a } else { b })
                .collect(),
        }
    }

    /// Largest absolute element (infinity norm).
    pub fn max_abs(&self) -> T {
        let mut m = T::zero();
        for x in self.data.iter() {
            let a = x.abs();
            if a > m {
                m = a;
            }
        }
        m
    }

    /// Euclidean norm.
    pub fn norm(&self) -> T {
        self.dot(self).sqrt()
    }
}

// ── Index ───────────────────────────────────────────────────────────

impl<T> Index<usize> for DynVector<T> {
    type Output = T;

    #[inline]
    fn index(&self, i: usize) -> &T {
        &self.data[i]
    }
}

impl<T> IndexMut<usize> for DynVector<T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        &mut self.data[i]
    }
}

// ── MatrixRef / MatrixMut (column-vector view) ──────────────────────

impl<T> MatrixRef<T> for DynVector<T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn ncols(&self) -> usize {
        1
    }

    #[inline]
    fn get(&self, row: usize, _col: usize) -> &T {
        &self.data[row]
    }
}

impl<T> MatrixMut<T> for DynVector<T> {
    #[inline]
    fn get_mut(&mut self, row: usize, _col: usize) -> &mut T {
        &mut self.data[row]
    }
}

// ── Arithmetic ──────────────────────────────────────────────────────

impl<T: Scalar> Add<&DynVector<T>> for &DynVector<T> {
    type Output = DynVector<T>;

    fn add(self, rhs: &DynVector<T>) -> DynVector<T> {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} + {}",
            self.len(),
            rhs.len(),
        );
        DynVector {
            data: self
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(&a, &b)| a + b)
                .collect(),
        }
    }
}

impl<T: Scalar> Add for DynVector<T> {
    type Output = DynVector<T>;
    fn add(self, rhs: DynVector<T>) -> DynVector<T> {
        &self + &rhs
    }
}

impl<T: Scalar> AddAssign<&DynVector<T>> for DynVector<T> {
    fn add_assign(&mut self, rhs: &DynVector<T>) {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} += {}",
            self.len(),
            rhs.len(),
        );
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a = *a + b;
        }
    }
}

impl<T: Scalar> Sub<&DynVector<T>> for &DynVector<T> {
    type Output = DynVector<T>;

    fn sub(self, rhs: &DynVector<T>) -> DynVector<T> {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} - {}",
            self.len(),
            rhs.len(),
        );
        DynVector {
            data: self
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(&a, &b)| a - b)
                .collect(),
        }
    }
}

impl<T: Scalar> Sub for DynVector<T> {
    type Output = DynVector<T>;
    fn sub(self, rhs: DynVector<T>) -> DynVector<T> {
        &self - &rhs
    }
}

impl<T: Scalar> SubAssign<&DynVector<T>> for DynVector<T> {
    fn sub_assign(&mut self, rhs: &DynVector<T>) {
        assert_eq!(
            self.len(),
            rhs.len(),
            "vector length mismatch: {} -= {}",
            self.len(),
            rhs.len(),
        );
        for (a, &b) in self.data.iter_mut().zip(rhs.data.iter()) {
            *a = *a - b;
        }
    }
}

impl<T: Scalar + Neg<Output = T>> Neg for &DynVector<T> {
    type Output = DynVector<T>;

    fn neg(self) -> DynVector<T> {
        DynVector {
            data: self.data.iter().map(|&a| -a).collect(),
        }
    }
}

impl<T: Scalar + Neg<Output = T>> Neg for DynVector<T> {
    type Output = DynVector<T>;
    fn neg(self) -> DynVector<T> {
        -&self
    }
}

impl<T: Scalar> Mul<T> for &DynVector<T> {
    type Output = DynVector<T>;

    fn mul(self, rhs: T) -> DynVector<T> {
        DynVector {
            data: self.data.iter().map(|&a| a * rhs).collect(),
        }
    }
}

impl<T: Scalar> Mul<T> for DynVector<T> {
    type Output = DynVector<T>;
    fn mul(self, rhs: T) -> DynVector<T> {
        &self * rhs
    }
}

impl<T: Scalar> Div<T> for &DynVector<T> {
    type Output = DynVector<T>;

    fn div(self, rhs: T) -> DynVector<T> {
        DynVector {
            data: self.data.iter().map(|&a| a / rhs).collect(),
        }
    }
}

impl<T: Scalar> Div<T> for DynVector<T> {
    type Output = DynVector<T>;
    fn div(self, rhs: T) -> DynVector<T> {
        &self / rhs
    }
}
