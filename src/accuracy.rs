use crate::dynmatrix::DynVector;
use crate::traits::FloatScalar;

/// Default absolute-error floor. Keeps the per-component denominator
/// nonzero when a reference value crosses zero.
const DEFAULT_ABS_ERROR: f64 = 1.0e-10;

/// Per-component accuracy specification.
///
/// Reduces a raw error vector to a single dimensionless number:
///
/// ```text
/// normalized = max_i |e_i| / (abs_i + rel_i * |y_i|) / tolerance
/// ```
///
/// A result of 1.0 or less means "within tolerance". Both the
/// extrapolation routines and the Newton-Raphson solver use this as their
/// convergence test, each with its own spec instance.
///
/// # Example
///
/// ```
/// use stiffode::{AccuracySpec, DynVector};
///
/// let mut spec = AccuracySpec::new(2, 1e-9);
/// spec.set_relative_error(1.0);
/// let err = DynVector::from_slice(&[1e-8_f64, 2e-8]);
/// let y = DynVector::from_slice(&[1.0, 1.0]);
/// assert!(spec.normalized_error(&err, &y) > 1.0);
/// assert!(spec.normalized_error(&(&err * 1e-3), &y) <= 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct AccuracySpec<T> {
    tolerance: T,
    absolute_error: DynVector<T>,
    relative_error: DynVector<T>,
}

impl<T: FloatScalar> AccuracySpec<T> {
    /// Create a spec for `size` components with overall tolerance `eps`.
    ///
    /// Components default to absolute error 1e-10 and relative error 1.0.
    pub fn new(size: usize, eps: T) -> Self {
        Self {
            tolerance: eps.abs(),
            absolute_error: DynVector::fill(size, T::from(DEFAULT_ABS_ERROR).unwrap()),
            relative_error: DynVector::fill(size, T::one()),
        }
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.absolute_error.len()
    }

    /// Whether the spec has zero components.
    pub fn is_empty(&self) -> bool {
        self.absolute_error.is_empty()
    }

    /// Overall tolerance.
    pub fn tolerance(&self) -> T {
        self.tolerance
    }

    /// Set the overall tolerance. Stored as an absolute value.
    pub fn set_tolerance(&mut self, eps: T) {
        self.tolerance = eps.abs();
    }

    /// Broadcast a single absolute-error value to all components.
    ///
    /// Stored as an absolute value; a zero is replaced by the 1e-10 floor
    /// so the normalization denominator can never vanish.
    pub fn set_absolute_error(&mut self, value: T) {
        let floor = T::from(DEFAULT_ABS_ERROR).unwrap();
        let v = value.abs();
        self.absolute_error.set_all(if v > T::zero() { v } else { floor });
    }

    /// Set per-component absolute errors. Values are stored as absolute
    /// values with zeros replaced by the 1e-10 floor.
    ///
    /// Panics if `values.len() != self.len()`.
    pub fn set_absolute_error_vec(&mut self, values: &DynVector<T>) {
        assert_eq!(
            values.len(),
            self.len(),
            "absolute error length mismatch: {} vs {}",
            values.len(),
            self.len(),
        );
        let floor = T::from(DEFAULT_ABS_ERROR).unwrap();
        for i in 0..values.len() {
            let v = values[i].abs();
            self.absolute_error[i] = if v > T::zero() { v } else { floor };
        }
    }

    /// Broadcast a single relative-error value to all components.
    pub fn set_relative_error(&mut self, value: T) {
        self.relative_error.set_all(value.abs());
    }

    /// Set per-component relative errors, stored as absolute values.
    ///
    /// Panics if `values.len() != self.len()`.
    pub fn set_relative_error_vec(&mut self, values: &DynVector<T>) {
        assert_eq!(
            values.len(),
            self.len(),
            "relative error length mismatch: {} vs {}",
            values.len(),
            self.len(),
        );
        for i in 0..values.len() {
            self.relative_error[i] = values[i].abs();
        }
    }

    /// Normalized error of `error` against the reference values `y`.
    ///
    /// Panics if either vector's length differs from the spec's.
    pub fn normalized_error(&self, error: &DynVector<T>, y: &DynVector<T>) -> T {
        assert_eq!(
            error.len(),
            self.len(),
            "error vector length mismatch: {} vs {}",
            error.len(),
            self.len(),
        );
        assert_eq!(
            y.len(),
            self.len(),
            "reference vector length mismatch: {} vs {}",
            y.len(),
            self.len(),
        );

        let mut max_err = T::zero();
        for i in 0..self.len() {
            let denom = self.absolute_error[i] + self.relative_error[i] * y[i].abs();
            let e = (error[i] / denom).abs();
            if e > max_err {
                max_err = e;
            }
        }
        max_err / self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_tolerance_is_at_most_one() {
        let spec = AccuracySpec::new(3, 1e-6_f64);
        let y = DynVector::from_slice(&[1.0, -2.0, 3.0]);
        // errors exactly at rel_tol * |y| * eps
        let err = DynVector::from_slice(&[1e-6, 2e-6, 3e-6]);
        let e = spec.normalized_error(&err, &y);
        assert!(e <= 1.0 + 1e-9, "normalized error {}", e);
    }

    #[test]
    fn scaling_error_is_monotonic() {
        let spec = AccuracySpec::new(3, 1e-4_f64);
        let y = DynVector::from_slice(&[1.0, 0.5, -2.0]);
        let err = DynVector::from_slice(&[1e-5, -2e-5, 3e-5]);
        let base = spec.normalized_error(&err, &y);
        for lambda in [1.5, 2.0, 10.0, 1e3] {
            let scaled = spec.normalized_error(&(&err * lambda), &y);
            assert!(
                scaled >= base,
                "lambda = {}: {} < {}",
                lambda,
                scaled,
                base
            );
        }
    }

    #[test]
    fn zero_reference_uses_absolute_floor() {
        let mut spec = AccuracySpec::new(1, 1.0_f64);
        spec.set_absolute_error(0.0); // replaced by the floor, not zero
        let err = DynVector::from_slice(&[1.0]);
        let y = DynVector::from_slice(&[0.0]);
        let e = spec.normalized_error(&err, &y);
        assert!(e.is_finite());
        assert!(e > 1.0);
    }

    #[test]
    fn setters_broadcast_and_store_magnitudes() {
        let mut spec = AccuracySpec::new(2, 1e-3_f64);
        spec.set_relative_error(-2.0);
        spec.set_absolute_error(-0.5);
        let err = DynVector::from_slice(&[1.0, 1.0]);
        let y = DynVector::from_slice(&[1.0, 1.0]);
        // denom = 0.5 + 2.0*1.0 = 2.5; normalized = (1/2.5)/1e-3 = 400
        let e = spec.normalized_error(&err, &y);
        assert!((e - 400.0).abs() < 1e-9, "normalized error {}", e);
    }

    #[test]
    fn per_component_vectors() {
        let mut spec = AccuracySpec::new(2, 1.0_f64);
        spec.set_absolute_error_vec(&DynVector::from_slice(&[1.0, 0.0]));
        spec.set_relative_error_vec(&DynVector::from_slice(&[0.0, 0.0]));
        let err = DynVector::from_slice(&[2.0, 1e-12]);
        let y = DynVector::from_slice(&[5.0, 5.0]);
        // First component: 2/1 = 2. Second: abs error floored to 1e-10 → 10.
        let e = spec.normalized_error(&err, &y);
        assert!((e - 10.0).abs() < 1e-6, "normalized error {}", e);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn length_mismatch_panics() {
        let spec = AccuracySpec::new(2, 1.0_f64);
        let err = DynVector::from_slice(&[1.0]);
        let y = DynVector::from_slice(&[1.0, 1.0]);
        let _ = spec.normalized_error(&err, &y);
    }
}
