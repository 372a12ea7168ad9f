use crate::accuracy::AccuracySpec;
use crate::deriv::JacobianBuilder;
use crate::dynmatrix::DynVector;
use crate::linalg::DynColPivQr;
use crate::traits::FloatScalar;

/// Default iteration cap for [`NewtonRaphson::solve`].
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// A system of equations `f(y) = 0` to be solved for `y`.
///
/// `evaluate` takes `&mut self` so implementations can count calls or
/// reuse scratch storage.
pub trait RootEquations<T: FloatScalar> {
    /// Dimension of the state (and of `f`).
    fn state_len(&self) -> usize;

    /// Evaluate `f(y)`.
    fn evaluate(&mut self, y: &DynVector<T>) -> DynVector<T>;
}

/// Outcome of a root search.
///
/// Non-convergence is not an error: the caller gets the best iterate found
/// along with its residual and the `converged` flag, and decides whether a
/// partial answer is usable.
#[derive(Debug, Clone)]
pub struct RootResult<T> {
    /// Final iterate.
    pub y: DynVector<T>,
    /// `f` evaluated at the final iterate.
    pub residual: DynVector<T>,
    /// Newton iterations performed.
    pub iterations: usize,
    /// Total function evaluations, Jacobian columns included.
    pub evaluations: usize,
    /// Whether either convergence test passed before the iteration cap.
    pub converged: bool,
}

/// Multidimensional Newton-Raphson with a numerically extrapolated Jacobian.
///
/// Each iteration builds the Jacobian by Ridders extrapolation (see
/// [`JacobianBuilder`]), solves `J dy = -f` by column-pivoted QR and takes
/// the full step. Two separate [`AccuracySpec`]s control termination: the
/// residual spec passes when `f` itself is small enough, the step spec when
/// the correction `dy` is negligible against the current iterate.
///
/// ```
/// use stiffode::{DynVector, NewtonRaphson, RootEquations};
///
/// struct Sqrt2;
/// impl RootEquations<f64> for Sqrt2 {
///     fn state_len(&self) -> usize {
///         1
///     }
///     fn evaluate(&mut self, y: &DynVector<f64>) -> DynVector<f64> {
///         DynVector::from_slice(&[y[0] * y[0] - 2.0])
///     }
/// }
///
/// let mut solver = NewtonRaphson::new(1);
/// let result = solver.solve(&mut Sqrt2, &DynVector::from_slice(&[1.0]));
/// assert!(result.converged);
/// assert!((result.y[0] - 2.0_f64.sqrt()).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct NewtonRaphson<T> {
    residual_spec: AccuracySpec<T>,
    step_spec: AccuracySpec<T>,
    jacobian_steps: DynVector<T>,
    jacobian_spec: Option<AccuracySpec<T>>,
    builder: JacobianBuilder<T>,
    max_iterations: usize,
}

impl<T: FloatScalar> NewtonRaphson<T> {
    /// A solver for `n` equations in `n` unknowns.
    ///
    /// Defaults: residual converged when `max |f_i| <= 1e-9`, step
    /// converged when `|dy_i|` is below 1e-9 relative to the iterate,
    /// Jacobian perturbations of 1e-3 per coordinate, iteration cap of
    /// [`DEFAULT_MAX_ITERATIONS`].
    pub fn new(n: usize) -> Self {
        let mut residual_spec = AccuracySpec::new(n, T::one());
        residual_spec.set_relative_error(T::zero());
        residual_spec.set_absolute_error(T::from(1.0e-9).unwrap());
        let step_spec = AccuracySpec::new(n, T::from(1.0e-9).unwrap());
        Self {
            residual_spec,
            step_spec,
            jacobian_steps: DynVector::fill(n, T::from(1.0e-3).unwrap()),
            jacobian_spec: None,
            builder: JacobianBuilder::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Residual convergence spec (reference values are `f` itself, so an
    /// absolute-error setting is what matters here).
    pub fn residual_spec_mut(&mut self) -> &mut AccuracySpec<T> {
        &mut self.residual_spec
    }

    /// Step-size convergence spec, applied to `dy` against the iterate.
    pub fn step_spec_mut(&mut self) -> &mut AccuracySpec<T> {
        &mut self.step_spec
    }

    /// Per-coordinate initial perturbations for the Jacobian columns.
    ///
    /// Panics on length mismatch.
    pub fn set_jacobian_steps(&mut self, steps: &DynVector<T>) {
        assert_eq!(
            steps.len(),
            self.jacobian_steps.len(),
            "step count mismatch: {} vs {}",
            steps.len(),
            self.jacobian_steps.len(),
        );
        self.jacobian_steps.copy_from(steps);
    }

    /// Accuracy spec forwarded to the Jacobian column estimators. `None`
    /// (the default) lets each column run to its own convergence.
    pub fn set_jacobian_spec(&mut self, spec: Option<AccuracySpec<T>>) {
        self.jacobian_spec = spec;
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        assert!(max_iterations > 0, "iteration cap must be positive");
        self.max_iterations = max_iterations;
    }

    /// Iterate from `initial` until a convergence test passes or the
    /// iteration cap is reached.
    ///
    /// Panics if `initial` or the equations disagree with the solver's
    /// dimension.
    pub fn solve<E: RootEquations<T>>(
        &mut self,
        equations: &mut E,
        initial: &DynVector<T>,
    ) -> RootResult<T> {
        let n = self.jacobian_steps.len();
        assert_eq!(
            equations.state_len(),
            n,
            "equation dimension mismatch: {} vs {}",
            equations.state_len(),
            n,
        );
        assert_eq!(
            initial.len(),
            n,
            "initial guess length mismatch: {} vs {}",
            initial.len(),
            n,
        );

        let mut y = initial.clone();
        let mut f = equations.evaluate(&y);
        let mut evaluations = 1;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            if self.residual_spec.normalized_error(&f.abs(), &f) <= T::one() {
                converged = true;
                break;
            }

            self.builder.start(&y, &self.jacobian_steps);
            while !self.builder.is_finished(self.jacobian_spec.as_ref()) {
                let probe = self.builder.next_input();
                let values = equations.evaluate(&probe);
                evaluations += 1;
                self.builder.set_function_values(&values);
            }

            let qr = DynColPivQr::new(self.builder.jacobian());
            let dy = qr.solve(&-&f);
            y += &dy;
            f = equations.evaluate(&y);
            evaluations += 1;

            if self.step_spec.normalized_error(&dy.abs(), &y) <= T::one() {
                converged = true;
                break;
            }
        }

        RootResult {
            y,
            residual: f,
            iterations,
            evaluations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynmatrix::DynMatrix;

    struct Linear {
        a: DynMatrix<f64>,
        b: DynVector<f64>,
    }

    impl RootEquations<f64> for Linear {
        fn state_len(&self) -> usize {
            self.b.len()
        }
        fn evaluate(&mut self, y: &DynVector<f64>) -> DynVector<f64> {
            &self.a.matvec(y) - &self.b
        }
    }

    struct CircleLine;

    impl RootEquations<f64> for CircleLine {
        fn state_len(&self) -> usize {
            2
        }
        fn evaluate(&mut self, y: &DynVector<f64>) -> DynVector<f64> {
            DynVector::from_slice(&[y[0] * y[0] + y[1] * y[1] - 4.0, y[0] - y[1]])
        }
    }

    struct NoRoot;

    impl RootEquations<f64> for NoRoot {
        fn state_len(&self) -> usize {
            1
        }
        fn evaluate(&mut self, y: &DynVector<f64>) -> DynVector<f64> {
            DynVector::from_slice(&[y[0] * y[0] + 1.0])
        }
    }

    #[test]
    fn linear_system_round_trip() {
        let a = DynMatrix::from_rows(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, -1.0, 0.0, -1.0, 2.0]);
        let b = DynVector::from_slice(&[1.0, -2.0, 3.0]);
        let mut eq = Linear {
            a: a.clone(),
            b: b.clone(),
        };

        let mut solver = NewtonRaphson::new(3);
        let result = solver.solve(&mut eq, &DynVector::zeros(3, 0.0));
        assert!(result.converged);

        let ay = a.matvec(&result.y);
        for i in 0..3 {
            assert!(
                (ay[i] - b[i]).abs() < 1e-8,
                "Ay[{}] = {} vs {}",
                i,
                ay[i],
                b[i]
            );
        }
    }

    #[test]
    fn circle_line_intersection() {
        let mut solver = NewtonRaphson::new(2);
        let result = solver.solve(&mut CircleLine, &DynVector::from_slice(&[1.0, 1.5]));
        assert!(result.converged);
        let r = 2.0_f64.sqrt();
        assert!((result.y[0] - r).abs() < 1e-8, "y0 = {}", result.y[0]);
        assert!((result.y[1] - r).abs() < 1e-8, "y1 = {}", result.y[1]);
        assert!(result.residual.max_abs() < 1e-7);
    }

    #[test]
    fn no_root_reports_non_convergence() {
        let mut solver = NewtonRaphson::new(1);
        solver.set_max_iterations(20);
        let result = solver.solve(&mut NoRoot, &DynVector::from_slice(&[0.5]));
        assert!(!result.converged);
        assert_eq!(result.iterations, 20);
        assert!(result.residual[0] >= 1.0);
    }

    #[test]
    fn counts_evaluations() {
        let mut solver = NewtonRaphson::new(2);
        let result = solver.solve(&mut CircleLine, &DynVector::from_slice(&[2.0, 0.5]));
        assert!(result.converged);
        // Every iteration costs at least the Jacobian evaluations.
        assert!(result.evaluations > result.iterations);
    }

    #[test]
    fn already_at_root() {
        let a = DynMatrix::eye(2, 0.0_f64);
        let b = DynVector::from_slice(&[1.0, 2.0]);
        let mut eq = Linear { a, b: b.clone() };
        let mut solver = NewtonRaphson::new(2);
        let result = solver.solve(&mut eq, &b);
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.evaluations, 1);
        assert_eq!(result.y, b);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn dimension_mismatch_panics() {
        let mut solver = NewtonRaphson::new(2);
        let _ = solver.solve(&mut CircleLine, &DynVector::from_slice(&[1.0]));
    }
}
