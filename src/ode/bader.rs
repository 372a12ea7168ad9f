use alloc::vec;
use alloc::vec::Vec;

use crate::dynmatrix::{DynMatrix, DynVector};
use crate::linalg::DynColPivQr;
use crate::traits::FloatScalar;

use super::{OdeDifferentiator, OdeEquations, OdeError, OdeSession, Solution};

/// Extrapolation columns used per step attempt.
const KMAXX: usize = 7;
const IMAXX: usize = KMAXX + 1;

/// Sub-step counts for successive extrapolation columns. Bader and
/// Deuflhard's sequence for the semi-implicit midpoint rule; the
/// Bulirsch-Stoer even sequence is unstable here.
const STEP_SEQUENCE: [usize; IMAXX] = [2, 6, 10, 14, 22, 34, 50, 70];

const SAFE1: f64 = 0.25;
const SAFE2: f64 = 0.7;
/// Bounds on the step reduction factor after a rejected attempt.
const REDMAX: f64 = 1.0e-5;
const REDMIN: f64 = 0.7;
const TINY: f64 = 1.0e-30;
/// Floor on the step scaling, capping growth at 1/SCALMX per step.
const SCALMX: f64 = 0.1;

/// Tuning knobs for [`BaderDeuflhard`].
#[derive(Debug, Clone, Copy)]
pub struct OdeSettings<T> {
    /// Per-step error tolerance.
    pub eps: T,
    /// Magnitude of the first step attempted after a reset.
    pub initial_step: T,
    /// Smallest step magnitude the controller may select.
    pub min_step: T,
    /// Largest step magnitude the controller may select.
    pub max_step: T,
    /// Cap on accepted steps per solve.
    pub max_steps: usize,
}

impl Default for OdeSettings<f64> {
    fn default() -> Self {
        Self {
            eps: 1.0e-8,
            initial_step: 1.0e-3,
            min_step: 0.0,
            max_step: 1.0e32,
            max_steps: 100_000,
        }
    }
}

impl Default for OdeSettings<f32> {
    fn default() -> Self {
        Self {
            eps: 1.0e-4,
            initial_step: 1.0e-3,
            min_step: 0.0,
            max_step: 1.0e32,
            max_steps: 100_000,
        }
    }
}

/// Counters accumulated over one solve.
struct Counters {
    accepted: usize,
    rejected: usize,
    function_evals: usize,
    jacobian_evals: usize,
}

/// Semi-implicit extrapolation integrator for stiff systems, after Bader
/// and Deuflhard (1983).
///
/// Each macro step crosses the interval with 2, 6, 10, ... semi-implicit
/// midpoint sub-steps, polynomial-extrapolates the results to a zero
/// sub-step size, and accepts the step once the extrapolation error
/// estimate drops inside tolerance. The column where that happens, and
/// the measured convergence rate of earlier columns, drive a combined
/// order and step-size controller that minimizes work per unit time.
///
/// The solver is reusable across systems; its workspace resizes to the
/// session it is handed. See the [module docs](super) for an example.
pub struct BaderDeuflhard<T> {
    /// Settings applied at the next solve.
    pub settings: OdeSettings<T>,
    // Work-per-column table and convergence coefficients, cached per
    // (eps, state length) pair.
    a: Vec<T>,
    alf: DynMatrix<T>,
    err: Vec<T>,
    eps_old: T,
    nv_old: usize,
    kmax: usize,
    kopt: usize,
    first: bool,
    // Extrapolation tableau.
    x_table: Vec<T>,
    interp_table: DynMatrix<T>,
    extrap_c: DynVector<T>,
    y_scale: DynVector<T>,
    // Step-size state.
    xnew: T,
    step: T,
    next_step: T,
    last_step: T,
}

impl<T: FloatScalar> BaderDeuflhard<T> {
    pub fn new(settings: OdeSettings<T>) -> Self {
        assert!(settings.eps > T::zero(), "tolerance must be positive");
        assert!(
            settings.initial_step != T::zero(),
            "initial step must be nonzero"
        );
        assert!(settings.max_steps > 0, "step cap must be positive");
        let far = T::from(-1.0e29).unwrap();
        Self {
            settings,
            a: vec![T::zero(); IMAXX],
            alf: DynMatrix::zeros(KMAXX, KMAXX, T::zero()),
            err: vec![T::zero(); KMAXX],
            eps_old: T::zero(),
            nv_old: 0,
            kmax: KMAXX - 1,
            kopt: KMAXX - 1,
            first: true,
            x_table: vec![T::zero(); KMAXX],
            interp_table: DynMatrix::zeros(0, 0, T::zero()),
            extrap_c: DynVector::zeros(0, T::zero()),
            y_scale: DynVector::zeros(0, T::zero()),
            xnew: far,
            step: settings.initial_step,
            next_step: far,
            last_step: T::zero(),
        }
    }

    /// Integrate the session to its end time.
    ///
    /// With `reset = true` the session returns to its start time and
    /// initial conditions and stored samples are dropped; with
    /// `reset = false` integration continues from the session's current
    /// time and state, typically after the end time was moved.
    ///
    /// The final time overshoots the end time by up to one step; the step
    /// is never clamped to land exactly, since doing so would perturb the
    /// step-size history the order controller feeds on.
    pub fn solve<E, D>(
        &mut self,
        equations: &mut E,
        differentiator: &mut D,
        session: &mut OdeSession<T>,
        reset: bool,
    ) -> Result<Solution<T>, OdeError<T>>
    where
        E: OdeEquations<T>,
        D: OdeDifferentiator<T>,
    {
        let nv = session.state_len();
        assert_eq!(
            equations.state_len(),
            nv,
            "state length mismatch: equations have {}, session has {}",
            equations.state_len(),
            nv,
        );
        self.resize_state(nv);

        if reset {
            session.reset();
        }
        session.begin_span();

        let mut x = session.time();
        let end = session.end_time();
        let direction = if end >= x { T::one() } else { -T::one() };
        if reset {
            self.step = direction * self.settings.initial_step.abs();
        } else {
            self.step = direction * self.step.abs();
        }

        let mut y = session.state().clone();
        let mut counters = Counters {
            accepted: 0,
            rejected: 0,
            function_evals: 0,
            jacobian_evals: 0,
        };
        equations.initialize(x, &y);
        let report_internal = equations.internal_len() > 0;

        loop {
            if counters.accepted >= self.settings.max_steps {
                return Err(OdeError::TooManySteps {
                    max_steps: self.settings.max_steps,
                    time: x,
                });
            }

            let dydx = equations.derivatives(x, &y);
            counters.function_evals += 1;
            assert_eq!(
                dydx.len(),
                nv,
                "derivative length mismatch: {} vs {} states",
                dydx.len(),
                nv,
            );
            let internal = if report_internal && session.storing() {
                Some(equations.internal_values(x, &y))
            } else {
                None
            };
            session.record(x, &y, &dydx, internal.as_ref());

            let (dfdt, dfdy, evals) = differentiator.differentiate(equations, x, &y);
            counters.function_evals += evals;
            counters.jacobian_evals += 1;

            self.solve_step(equations, x, &mut y, &dydx, &dfdt, &dfdy, &mut counters)?;

            x = x + self.last_step;
            self.step = self.clamp_step(self.next_step, direction);
            counters.accepted += 1;

            if (x - end) * direction > T::zero() {
                break;
            }
        }

        session.set_current(x, &y);
        Ok(Solution {
            t: x,
            y,
            accepted_steps: counters.accepted,
            rejected_steps: counters.rejected,
            function_evals: counters.function_evals,
            jacobian_evals: counters.jacobian_evals,
        })
    }

    fn resize_state(&mut self, nv: usize) {
        if self.interp_table.nrows() != nv {
            self.interp_table = DynMatrix::zeros(nv, KMAXX, T::zero());
            self.extrap_c = DynVector::zeros(nv, T::zero());
            self.y_scale = DynVector::fill(nv, T::one());
        }
    }

    /// Keep the controller's step choice inside the configured bounds.
    fn clamp_step(&self, step: T, direction: T) -> T {
        let magnitude = step
            .abs()
            .max(self.settings.min_step.abs())
            .min(self.settings.max_step.abs());
        direction * magnitude
    }

    /// Rebuild the work table and convergence coefficients when the
    /// tolerance or the state size changes.
    fn prepare(&mut self, eps: T, nv: usize) {
        if eps == self.eps_old && nv == self.nv_old {
            return;
        }
        let far = T::from(-1.0e29).unwrap();
        self.next_step = far;
        self.xnew = far;

        let eps1 = T::from(SAFE1).unwrap() * eps;
        self.a[0] = T::from(STEP_SEQUENCE[0] + 1).unwrap();
        for k in 0..KMAXX {
            self.a[k + 1] = self.a[k] + T::from(STEP_SEQUENCE[k + 1]).unwrap();
        }
        for iq in 1..KMAXX {
            for k in 0..iq {
                let exponent = (self.a[k + 1] - self.a[iq + 1])
                    / ((self.a[iq + 1] - self.a[0] + T::one())
                        * T::from(2 * k + 3).unwrap());
                self.alf[(k, iq)] = eps1.powf(exponent);
            }
        }
        self.eps_old = eps;
        self.nv_old = nv;

        // Account for the Jacobian solves in the work-per-column model.
        self.a[0] = self.a[0] + T::from(nv).unwrap();
        for k in 0..KMAXX {
            self.a[k + 1] = self.a[k] + T::from(STEP_SEQUENCE[k + 1]).unwrap();
        }
        let mut kopt = 1;
        while kopt < KMAXX - 1 {
            if self.a[kopt + 1] > self.a[kopt] * self.alf[(kopt - 1, kopt)] {
                break;
            }
            kopt += 1;
        }
        self.kopt = kopt;
        self.kmax = kopt;
    }

    /// One adaptive macro step from `x`. On success `y` holds the
    /// extrapolated state, `last_step` the step taken and `next_step` the
    /// controller's suggestion.
    #[allow(clippy::too_many_arguments)]
    fn solve_step<E: OdeEquations<T>>(
        &mut self,
        equations: &mut E,
        x: T,
        y: &mut DynVector<T>,
        dydx: &DynVector<T>,
        dfdt: &DynVector<T>,
        dfdy: &DynMatrix<T>,
        counters: &mut Counters,
    ) -> Result<(), OdeError<T>> {
        let nv = y.len();
        let eps = self.settings.eps;
        self.prepare(eps, nv);

        let one = T::one();
        let safe1 = T::from(SAFE1).unwrap();
        let safe2 = T::from(SAFE2).unwrap();
        let scalmx = T::from(SCALMX).unwrap();

        let y_sav = y.clone();
        if x != self.xnew || self.step != self.next_step {
            self.first = true;
            self.kopt = self.kmax;
        }

        let mut y_err = DynVector::zeros(nv, T::zero());
        let mut reduct = false;
        let mut red = T::zero();
        let mut errmax = T::zero();
        let mut km = 0usize;
        let mut k_final = 0usize;

        'attempts: loop {
            let mut accepted = false;
            for k in 0..=self.kmax {
                k_final = k;
                self.xnew = x + self.step;
                if self.xnew == x {
                    return Err(OdeError::StepSizeUnderflow {
                        step: self.step,
                        time: x,
                    });
                }

                let (y_seq, evals) = semi_implicit_crossing(
                    equations,
                    STEP_SEQUENCE[k],
                    x,
                    self.step,
                    &y_sav,
                    dydx,
                    dfdt,
                    dfdy,
                );
                counters.function_evals += evals;

                let ratio = self.step / T::from(STEP_SEQUENCE[k]).unwrap();
                self.extrapolate(k, ratio * ratio, &y_seq, y, &mut y_err);

                if k != 0 {
                    errmax = T::from(TINY).unwrap();
                    for i in 0..nv {
                        errmax = errmax.max((y_err[i] / self.y_scale[i]).abs());
                    }
                    errmax = errmax / eps;
                    km = k - 1;
                    self.err[km] =
                        (errmax / safe1).powf(one / T::from(2 * km + 3).unwrap());
                }
                if k != 0 && (k >= self.kopt - 1 || self.first) {
                    if errmax < one {
                        accepted = true;
                        break;
                    }
                    // In the window where convergence should have happened:
                    // decide how far to cut the step before retrying.
                    if k == self.kmax || k == self.kopt + 1 {
                        red = safe2 / self.err[km];
                        break;
                    } else if k == self.kopt
                        && self.alf[(self.kopt - 1, self.kopt)] < self.err[km]
                    {
                        red = one / self.err[km];
                        break;
                    } else if self.kopt == self.kmax
                        && self.alf[(km, self.kmax - 1)] < self.err[km]
                    {
                        red = self.alf[(km, self.kmax - 1)] * safe2 / self.err[km];
                        break;
                    } else if self.alf[(km, self.kopt)] < self.err[km] {
                        red = self.alf[(km, self.kopt - 1)] / self.err[km];
                        break;
                    }
                }
            }
            if accepted {
                break 'attempts;
            }
            red = red.min(T::from(REDMIN).unwrap()).max(T::from(REDMAX).unwrap());
            self.step = self.step * red;
            reduct = true;
            counters.rejected += 1;
        }

        self.last_step = self.step;
        self.first = false;

        // Pick the order whose measured convergence cost the least work
        // per unit step, then scale the next step to it.
        let mut wrkmin = T::from(1.0e35).unwrap();
        let mut scale = one;
        for kk in 0..=km {
            let fact = self.err[kk].max(scalmx);
            let work = fact * self.a[kk + 1];
            if work < wrkmin {
                scale = fact;
                wrkmin = work;
                self.kopt = kk + 1;
            }
        }
        self.next_step = self.step / scale;

        // Consider stepping up an order when the step was not cut and the
        // extra column would pay for itself.
        if self.kopt >= k_final && self.kopt != self.kmax && !reduct {
            let fact = (scale / self.alf[(self.kopt - 1, self.kopt)]).max(scalmx);
            if self.a[self.kopt + 1] * fact <= wrkmin {
                self.next_step = self.step / fact;
                self.kopt += 1;
            }
        }
        Ok(())
    }

    /// Polynomial extrapolation of the sub-step results toward zero
    /// sub-step size. Column `k` of the tableau corresponds to crossing
    /// the step with `STEP_SEQUENCE[k]` sub-steps; `xest` is the squared
    /// sub-step ratio. `y` receives the extrapolated state, `y_err` the
    /// change contributed by the newest column.
    fn extrapolate(
        &mut self,
        k: usize,
        xest: T,
        y_seq: &DynVector<T>,
        y: &mut DynVector<T>,
        y_err: &mut DynVector<T>,
    ) {
        let nv = y_seq.len();
        self.x_table[k] = xest;
        for j in 0..nv {
            y[j] = y_seq[j];
            y_err[j] = y_seq[j];
        }
        if k == 0 {
            for j in 0..nv {
                self.interp_table[(j, 0)] = y_seq[j];
            }
            return;
        }
        for j in 0..nv {
            self.extrap_c[j] = y_seq[j];
        }
        for k1 in 0..k {
            let delta_inv = T::one() / (self.x_table[k - k1 - 1] - xest);
            let f1 = xest * delta_inv;
            let f2 = self.x_table[k - k1 - 1] * delta_inv;
            for j in 0..nv {
                let q = self.interp_table[(j, k1)];
                self.interp_table[(j, k1)] = y_err[j];
                let delta = self.extrap_c[j] - q;
                y_err[j] = f1 * delta;
                self.extrap_c[j] = f2 * delta;
                y[j] = y[j] + y_err[j];
            }
        }
        for j in 0..nv {
            self.interp_table[(j, k)] = y_err[j];
        }
    }
}

impl<T: FloatScalar> Default for BaderDeuflhard<T>
where
    OdeSettings<T>: Default,
{
    fn default() -> Self {
        Self::new(OdeSettings::default())
    }
}

/// Cross `[x, x + total_step]` with `nstep` semi-implicit midpoint
/// sub-steps. The iteration matrix `I - h df/dy` is factored once and its
/// decomposition reused for every sub-step.
///
/// Returns the state at the far end and the number of right-hand side
/// evaluations spent.
#[allow(clippy::too_many_arguments)]
fn semi_implicit_crossing<T, E>(
    equations: &mut E,
    nstep: usize,
    x_start: T,
    total_step: T,
    y_in: &DynVector<T>,
    dydx: &DynVector<T>,
    dfdt: &DynVector<T>,
    dfdy: &DynMatrix<T>,
) -> (DynVector<T>, usize)
where
    T: FloatScalar,
    E: OdeEquations<T>,
{
    let nv = y_in.len();
    let h = total_step / T::from(nstep).unwrap();
    let two = T::from(2.0).unwrap();

    let mut iteration_matrix = dfdy * (-h);
    for i in 0..nv {
        iteration_matrix[(i, i)] = iteration_matrix[(i, i)] + T::one();
    }
    let decomposition = DynColPivQr::new(&iteration_matrix);

    let mut rhs = DynVector::zeros(nv, T::zero());
    for i in 0..nv {
        rhs[i] = h * (dydx[i] + h * dfdt[i]);
    }
    let mut delta = decomposition.solve(&rhs);
    let mut y_sum = y_in + &delta;

    let mut x = x_start + h;
    let mut f = equations.derivatives(x, &y_sum);
    let mut evals = 1;

    for _ in 1..nstep {
        for i in 0..nv {
            rhs[i] = h * f[i] - delta[i];
        }
        let correction = decomposition.solve(&rhs);
        delta += &(&correction * two);
        y_sum += &delta;
        x = x + h;
        f = equations.derivatives(x, &y_sum);
        evals += 1;
    }

    for i in 0..nv {
        rhs[i] = h * f[i] - delta[i];
    }
    let y_out = &decomposition.solve(&rhs) + &y_sum;
    (y_out, evals)
}
