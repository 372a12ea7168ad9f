use crate::accuracy::AccuracySpec;
use crate::deriv::{DerivativeEstimator, JacobianBuilder, RiddersExtrapolation};
use crate::dynmatrix::{DynMatrix, DynVector};
use crate::traits::FloatScalar;

use super::{OdeDifferentiator, OdeEquations};

/// Numerical [`OdeDifferentiator`] for systems without closed-form
/// derivatives.
///
/// `df/dt` comes from a [`RiddersExtrapolation`] in the time variable and
/// `df/dy` from a [`JacobianBuilder`] over the state, both cut short by a
/// shared [`AccuracySpec`]. The default unit initial steps are shrunk
/// automatically by the extrapolation, so they only need adjusting when
/// the system's scales are far from unity.
#[derive(Debug, Clone)]
pub struct NumericalOdeDerivatives<T> {
    time_estimator: RiddersExtrapolation<T>,
    jacobian: JacobianBuilder<T>,
    time_step: T,
    state_steps: DynVector<T>,
    spec: AccuracySpec<T>,
}

impl<T: FloatScalar> NumericalOdeDerivatives<T> {
    /// A differentiator for a `size`-state system with derivative
    /// tolerance `tol`.
    pub fn new(size: usize, tol: T) -> Self {
        assert!(size > 0, "state size must be positive");
        Self {
            time_estimator: RiddersExtrapolation::new(),
            jacobian: JacobianBuilder::new(),
            time_step: T::one(),
            state_steps: DynVector::fill(size, T::one()),
            spec: AccuracySpec::new(size, tol),
        }
    }

    /// Initial perturbation of the time variable.
    pub fn set_time_step(&mut self, step: T) {
        assert!(step != T::zero(), "time step must be nonzero");
        self.time_step = step;
    }

    /// Initial per-state perturbations for the Jacobian columns.
    ///
    /// Panics on length mismatch.
    pub fn set_state_steps(&mut self, steps: &DynVector<T>) {
        assert_eq!(
            steps.len(),
            self.state_steps.len(),
            "step count mismatch: {} vs {}",
            steps.len(),
            self.state_steps.len(),
        );
        self.state_steps.copy_from(steps);
    }

    /// Convergence spec shared by the time and state estimations.
    pub fn spec_mut(&mut self) -> &mut AccuracySpec<T> {
        &mut self.spec
    }
}

impl<T: FloatScalar> OdeDifferentiator<T> for NumericalOdeDerivatives<T> {
    fn differentiate<E: OdeEquations<T>>(
        &mut self,
        equations: &mut E,
        t: T,
        y: &DynVector<T>,
    ) -> (DynVector<T>, DynMatrix<T>, usize) {
        let mut evals = 0;

        self.time_estimator.start(t, self.time_step);
        while !self.time_estimator.is_finished(Some(&self.spec)) {
            let probe = self.time_estimator.next_input();
            let values = equations.derivatives(probe, y);
            evals += 1;
            self.time_estimator.set_function_values(&values);
        }
        let dfdt = self.time_estimator.derivatives().clone();

        self.jacobian.start(y, &self.state_steps);
        while !self.jacobian.is_finished(Some(&self.spec)) {
            let probe = self.jacobian.next_input();
            let values = equations.derivatives(t, &probe);
            evals += 1;
            self.jacobian.set_function_values(&values);
        }

        (dfdt, self.jacobian.jacobian().clone(), evals)
    }
}
