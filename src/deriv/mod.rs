//! Numerical differentiation by Richardson extrapolation.
//!
//! The estimators here are driven inside-out: rather than taking a closure,
//! an estimator hands out the next input to evaluate and is fed the function
//! values back. That lets a caller that already owns an expensive evaluation
//! loop (an ODE right-hand side, a measurement pipeline) interleave
//! derivative estimation with its own bookkeeping.
//!
//! ```
//! use stiffode::{AccuracySpec, DerivativeEstimator, DynVector, RiddersExtrapolation};
//!
//! let f = |x: f64| x.sin();
//! let mut ridders = RiddersExtrapolation::new();
//! let spec = AccuracySpec::new(1, 1e-9);
//! ridders.start(1.0, 0.1);
//! while !ridders.is_finished(Some(&spec)) {
//!     let x = ridders.next_input();
//!     ridders.set_function_values(&DynVector::from_slice(&[f(x)]));
//! }
//! assert!((ridders.derivatives()[0] - 1.0_f64.cos()).abs() < 1e-8);
//! ```

mod jacobian;
mod ridders;

pub use jacobian::JacobianBuilder;
pub use ridders::RiddersExtrapolation;

use crate::accuracy::AccuracySpec;
use crate::dynmatrix::DynVector;
use crate::traits::FloatScalar;

/// A pull-driven estimator of d(f)/dx for a vector-valued f of one scalar.
///
/// The driving loop is always:
///
/// 1. [`start`](DerivativeEstimator::start) with the expansion point and
///    initial step,
/// 2. while not [`is_finished`](DerivativeEstimator::is_finished):
///    evaluate f at [`next_input`](DerivativeEstimator::next_input) and
///    feed the result to
///    [`set_function_values`](DerivativeEstimator::set_function_values),
/// 3. read [`derivatives`](DerivativeEstimator::derivatives) and
///    [`error`](DerivativeEstimator::error).
pub trait DerivativeEstimator<T: FloatScalar> {
    /// Begin a new estimation around `target` with initial step `step`.
    ///
    /// Panics if `step` is zero.
    fn start(&mut self, target: T, step: T);

    /// The next input value the caller should evaluate f at.
    fn next_input(&self) -> T;

    /// Feed back f evaluated at the value from the last `next_input` call.
    fn set_function_values(&mut self, values: &DynVector<T>);

    /// Whether the estimate is final.
    ///
    /// With a spec, the estimator may stop early once the accumulated error
    /// estimate is within tolerance; without one it runs until its own
    /// convergence criteria (or its table) are exhausted.
    fn is_finished(&self, spec: Option<&AccuracySpec<T>>) -> bool;

    /// Best derivative estimates, one per output dimension.
    fn derivatives(&self) -> &DynVector<T>;

    /// Estimated error of each derivative.
    fn error(&self) -> &DynVector<T>;

    /// Number of output dimensions (zero before the first values arrive).
    fn len(&self) -> usize;
}
