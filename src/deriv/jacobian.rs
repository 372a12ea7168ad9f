use crate::accuracy::AccuracySpec;
use crate::dynmatrix::{DynMatrix, DynVector};
use crate::traits::FloatScalar;

use super::{DerivativeEstimator, RiddersExtrapolation};

/// Builds a full Jacobian matrix column by column.
///
/// Each column d(f)/d(y_j) is produced by a scalar-input
/// [`DerivativeEstimator`] that perturbs one coordinate of the base point
/// while the rest stay fixed. The builder follows the same pull-driven
/// protocol as the estimators: the caller evaluates f at
/// [`next_input`](JacobianBuilder::next_input) points until
/// [`is_finished`](JacobianBuilder::is_finished) reports completion.
///
/// When an [`AccuracySpec`] is passed to `is_finished`, it is applied per
/// column; its length must equal the number of function outputs.
///
/// ```
/// use stiffode::{DynVector, JacobianBuilder};
///
/// // f(y) = [y0 * y1, y0 + 2 y1]
/// let f = |y: &DynVector<f64>| DynVector::from_slice(&[y[0] * y[1], y[0] + 2.0 * y[1]]);
/// let mut builder = JacobianBuilder::new();
/// builder.start(
///     &DynVector::from_slice(&[3.0, 5.0]),
///     &DynVector::from_slice(&[0.1, 0.1]),
/// );
/// while !builder.is_finished(None) {
///     let y = builder.next_input();
///     builder.set_function_values(&f(&y));
/// }
/// let j = builder.jacobian();
/// assert!((j[(0, 0)] - 5.0).abs() < 1e-8);
/// assert!((j[(0, 1)] - 3.0).abs() < 1e-8);
/// ```
#[derive(Debug, Clone)]
pub struct JacobianBuilder<T, D = RiddersExtrapolation<T>> {
    estimator: D,
    y: DynVector<T>,
    steps: DynVector<T>,
    column: usize,
    jacobian: DynMatrix<T>,
    errors: DynMatrix<T>,
    sized: bool,
}

impl<T: FloatScalar> JacobianBuilder<T, RiddersExtrapolation<T>> {
    /// A builder backed by [`RiddersExtrapolation`] columns.
    pub fn new() -> Self {
        Self::with_estimator(RiddersExtrapolation::new())
    }
}

impl<T: FloatScalar> Default for JacobianBuilder<T, RiddersExtrapolation<T>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar, D: DerivativeEstimator<T>> JacobianBuilder<T, D> {
    pub fn with_estimator(estimator: D) -> Self {
        Self {
            estimator,
            y: DynVector::zeros(0, T::zero()),
            steps: DynVector::zeros(0, T::zero()),
            column: 0,
            jacobian: DynMatrix::zeros(0, 0, T::zero()),
            errors: DynMatrix::zeros(0, 0, T::zero()),
            sized: false,
        }
    }

    /// Begin a Jacobian estimation around `target` with per-coordinate
    /// initial perturbation `steps`.
    ///
    /// Panics if `target` is empty or the lengths differ.
    pub fn start(&mut self, target: &DynVector<T>, steps: &DynVector<T>) {
        assert!(!target.is_empty(), "target point must be non-empty");
        assert_eq!(
            target.len(),
            steps.len(),
            "step count mismatch: {} coordinates, {} steps",
            target.len(),
            steps.len(),
        );
        if self.y.len() != target.len() {
            self.y = target.clone();
            self.steps = steps.clone();
        } else {
            self.y.copy_from(target);
            self.steps.copy_from(steps);
        }
        self.column = 0;
        self.sized = false;
        self.estimator.start(self.y[0], self.steps[0]);
    }

    /// The next full input point to evaluate f at.
    pub fn next_input(&self) -> DynVector<T> {
        let mut input = self.y.clone();
        input[self.column] = self.estimator.next_input();
        input
    }

    /// Feed back f evaluated at the last `next_input` point.
    pub fn set_function_values(&mut self, values: &DynVector<T>) {
        self.estimator.set_function_values(values);
    }

    /// Whether every column has converged. Harvests the active column and
    /// moves to the next one as estimators finish.
    pub fn is_finished(&mut self, spec: Option<&AccuracySpec<T>>) -> bool {
        let n = self.y.len();
        if self.column >= n {
            return true;
        }
        if !self.estimator.is_finished(spec) {
            return false;
        }

        let n_out = self.estimator.len();
        if !self.sized {
            if self.jacobian.nrows() != n_out || self.jacobian.ncols() != n {
                self.jacobian = DynMatrix::zeros(n_out, n, T::zero());
                self.errors = DynMatrix::zeros(n_out, n, T::zero());
            }
            self.sized = true;
        }
        self.jacobian.set_col(self.column, self.estimator.derivatives());
        self.errors.set_col(self.column, self.estimator.error());

        self.column += 1;
        if self.column < n {
            self.estimator.start(self.y[self.column], self.steps[self.column]);
            false
        } else {
            true
        }
    }

    /// The assembled Jacobian, `f` outputs by input coordinates.
    pub fn jacobian(&self) -> &DynMatrix<T> {
        &self.jacobian
    }

    /// Per-entry error estimates matching [`jacobian`](Self::jacobian).
    pub fn errors(&self) -> &DynMatrix<T> {
        &self.errors
    }
}
