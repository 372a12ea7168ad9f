//! Stiff ODE integration by the semi-implicit extrapolation method of
//! Bader and Deuflhard.
//!
//! The solver treats the right-hand side, its differentiation and the
//! integration session as three separate pieces:
//!
//! - [`OdeEquations`] is the system `dy/dt = f(t, y)` itself,
//! - [`OdeDifferentiator`] supplies `df/dt` and the Jacobian `df/dy` each
//!   step, either analytically or through [`NumericalOdeDerivatives`],
//! - [`OdeSession`] carries the integration span, the current state and
//!   optional sample storage, so one system can be integrated repeatedly
//!   or continued past its original end time.
//!
//! ```
//! use stiffode::{
//!     BaderDeuflhard, DynVector, NumericalOdeDerivatives, OdeEquations, OdeSession,
//! };
//!
//! struct Decay;
//! impl OdeEquations<f64> for Decay {
//!     fn state_len(&self) -> usize {
//!         1
//!     }
//!     fn derivatives(&mut self, _t: f64, y: &DynVector<f64>) -> DynVector<f64> {
//!         DynVector::from_slice(&[-y[0]])
//!     }
//! }
//!
//! let mut solver = BaderDeuflhard::default();
//! let mut diff = NumericalOdeDerivatives::new(1, 1e-8);
//! let mut session = OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0]));
//! let solution = solver.solve(&mut Decay, &mut diff, &mut session, true).unwrap();
//! assert!((solution.y[0] - (-solution.t).exp()).abs() < 1e-5);
//! ```

mod bader;
mod data;
mod derivs;
#[cfg(test)]
mod tests;

pub use bader::{BaderDeuflhard, OdeSettings};
pub use data::{DataCollector, OdeSession};
pub use derivs::NumericalOdeDerivatives;

use crate::dynmatrix::{DynMatrix, DynVector};
use crate::traits::FloatScalar;

/// A system of ordinary differential equations `dy/dt = f(t, y)`.
///
/// Systems may expose auxiliary quantities (forces, energies) alongside the
/// state through [`internal_values`](Self::internal_values); the solver
/// samples them at the same points as the state, and only there, so trial
/// evaluations during stepping and differentiation never pollute the
/// record.
pub trait OdeEquations<T: FloatScalar> {
    /// Number of state variables.
    fn state_len(&self) -> usize;

    /// Evaluate `f(t, y)`.
    fn derivatives(&mut self, t: T, y: &DynVector<T>) -> DynVector<T>;

    /// Number of auxiliary values reported per sample. Zero by default.
    fn internal_len(&self) -> usize {
        0
    }

    /// Hook called once at the start of each solve, before any evaluation.
    fn initialize(&mut self, _t: T, _y: &DynVector<T>) {}

    /// Auxiliary values at `(t, y)`, length [`internal_len`](Self::internal_len).
    ///
    /// Only called at recorded sample points, never for trial states.
    fn internal_values(&mut self, _t: T, _y: &DynVector<T>) -> DynVector<T> {
        DynVector::zeros(0, T::zero())
    }
}

/// Supplies the time derivative `df/dt` and Jacobian `df/dy` of a system's
/// right-hand side, evaluated at `(t, y)`.
///
/// Implement this directly when the derivatives are known in closed form;
/// otherwise use [`NumericalOdeDerivatives`]. The returned count is the
/// number of `f` evaluations spent, zero for analytic implementations.
pub trait OdeDifferentiator<T: FloatScalar> {
    fn differentiate<E: OdeEquations<T>>(
        &mut self,
        equations: &mut E,
        t: T,
        y: &DynVector<T>,
    ) -> (DynVector<T>, DynMatrix<T>, usize);
}

/// Fatal integration failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OdeError<T> {
    /// The step was reduced until it no longer advanced the time variable.
    StepSizeUnderflow { step: T, time: T },
    /// The step budget ran out before the end time was reached.
    TooManySteps { max_steps: usize, time: T },
}

impl<T: core::fmt::Display> core::fmt::Display for OdeError<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OdeError::StepSizeUnderflow { step, time } => {
                write!(f, "step size underflow: step {} at time {}", step, time)
            }
            OdeError::TooManySteps { max_steps, time } => {
                write!(
                    f,
                    "exceeded {} steps without reaching the end time (stopped at {})",
                    max_steps, time
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl<T: core::fmt::Display + core::fmt::Debug> std::error::Error for OdeError<T> {}

/// Result of a successful integration.
///
/// `t` is where the integration actually stopped. The outer loop never
/// clamps the step to land on the requested end time, so `t` can overshoot
/// it by up to one step.
#[derive(Debug, Clone)]
pub struct Solution<T> {
    /// Final time.
    pub t: T,
    /// State at `t`.
    pub y: DynVector<T>,
    /// Accepted steps.
    pub accepted_steps: usize,
    /// Step attempts rejected by the error test.
    pub rejected_steps: usize,
    /// Right-hand side evaluations, differentiation included.
    pub function_evals: usize,
    /// Differentiator invocations (one per accepted or retried step chain).
    pub jacobian_evals: usize,
}
