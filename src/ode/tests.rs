use crate::dynmatrix::{DynMatrix, DynVector};
use crate::ode::{
    BaderDeuflhard, NumericalOdeDerivatives, OdeDifferentiator, OdeEquations, OdeError,
    OdeSession, OdeSettings,
};

/// dy/dt = -y, solution e^{-t}.
struct Decay;

impl OdeEquations<f64> for Decay {
    fn state_len(&self) -> usize {
        1
    }
    fn derivatives(&mut self, _t: f64, y: &DynVector<f64>) -> DynVector<f64> {
        DynVector::from_slice(&[-y[0]])
    }
}

/// Analytic derivatives for `Decay`.
struct DecayDerivs;

impl OdeDifferentiator<f64> for DecayDerivs {
    fn differentiate<E: OdeEquations<f64>>(
        &mut self,
        _equations: &mut E,
        _t: f64,
        _y: &DynVector<f64>,
    ) -> (DynVector<f64>, DynMatrix<f64>, usize) {
        (
            DynVector::from_slice(&[0.0]),
            DynMatrix::from_rows(1, 1, &[-1.0]),
            0,
        )
    }
}

/// dy/dt = -1000 (y - cos t) - sin t, solution cos t for y(0) = 1.
///
/// The forcing keeps the solution gentle while the system itself has a
/// time constant of a millisecond, the classic stiffness setup.
struct StiffCos;

impl OdeEquations<f64> for StiffCos {
    fn state_len(&self) -> usize {
        1
    }
    fn derivatives(&mut self, t: f64, y: &DynVector<f64>) -> DynVector<f64> {
        DynVector::from_slice(&[-1000.0 * (y[0] - t.cos()) - t.sin()])
    }
}

struct StiffCosDerivs;

impl OdeDifferentiator<f64> for StiffCosDerivs {
    fn differentiate<E: OdeEquations<f64>>(
        &mut self,
        _equations: &mut E,
        t: f64,
        _y: &DynVector<f64>,
    ) -> (DynVector<f64>, DynMatrix<f64>, usize) {
        (
            DynVector::from_slice(&[-1000.0 * t.sin() - t.cos()]),
            DynMatrix::from_rows(1, 1, &[-1000.0]),
            0,
        )
    }
}

#[test]
fn exponential_decay() {
    let mut solver = BaderDeuflhard::default();
    let mut diff = NumericalOdeDerivatives::new(1, 1e-8);
    let mut session = OdeSession::new(0.0, 5.0, DynVector::from_slice(&[1.0]));

    let solution = solver.solve(&mut Decay, &mut diff, &mut session, true).unwrap();
    assert!(solution.t >= 5.0);
    let exact = (-solution.t).exp();
    assert!(
        (solution.y[0] - exact).abs() < 1e-5,
        "y = {} vs {}",
        solution.y[0],
        exact
    );
    assert!(solution.accepted_steps > 0);
    assert!(solution.function_evals > solution.accepted_steps);
}

#[test]
fn stiff_system_takes_large_steps() {
    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 2.0, DynVector::from_slice(&[1.0])).with_storage();

    let solution = solver
        .solve(&mut StiffCos, &mut StiffCosDerivs, &mut session, true)
        .unwrap();

    let exact = solution.t.cos();
    assert!(
        (solution.y[0] - exact).abs() < 1e-5,
        "y = {} vs {}",
        solution.y[0],
        exact
    );
    // An explicit method limited by the 1e-3 time constant would need on
    // the order of thousands of steps across this span.
    assert!(
        solution.accepted_steps < 500,
        "took {} steps",
        solution.accepted_steps
    );
}

#[test]
fn step_sizes_adapt_nonuniformly() {
    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 2.0, DynVector::from_slice(&[1.0])).with_storage();
    solver
        .solve(&mut StiffCos, &mut StiffCosDerivs, &mut session, true)
        .unwrap();

    let states = session.states().unwrap();
    assert!(states.len() > 3);
    let mut min_dt = f64::MAX;
    let mut max_dt = 0.0_f64;
    for i in 1..states.len() {
        let dt = states.time(i).unwrap() - states.time(i - 1).unwrap();
        min_dt = min_dt.min(dt);
        max_dt = max_dt.max(dt);
    }
    assert!(
        max_dt > 5.0 * min_dt,
        "steps were uniform: min {} max {}",
        min_dt,
        max_dt
    );
}

#[test]
fn overshoot_is_bounded_by_one_step() {
    let mut solver = BaderDeuflhard::default();
    let mut diff = NumericalOdeDerivatives::new(1, 1e-8);
    let mut session = OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0]));

    let solution = solver.solve(&mut Decay, &mut diff, &mut session, true).unwrap();
    assert!(solution.t >= 1.0);
    assert!(solution.t < 2.0, "overshot to {}", solution.t);
    assert_eq!(session.time(), solution.t);
    assert!((solution.y[0] - (-solution.t).exp()).abs() < 1e-5);
}

#[test]
fn continuation_extends_a_session() {
    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();

    let first = solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, true)
        .unwrap();
    assert!(first.t >= 1.0);

    session.set_end_time(2.0);
    let second = solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, false)
        .unwrap();
    assert!(second.t >= 2.0);
    assert!(
        (second.y[0] - (-second.t).exp()).abs() < 1e-5,
        "y = {} vs {}",
        second.y[0],
        (-second.t).exp()
    );

    // Storage accumulates across the two solves.
    let states = session.states().unwrap();
    assert_eq!(states.first_time(), Some(0.0));
    assert!(states.last_time().unwrap() >= 1.0);
}

#[test]
fn reset_clears_previous_samples() {
    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();

    solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, true)
        .unwrap();
    let first_len = session.states().unwrap().len();

    solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, true)
        .unwrap();
    let second_len = session.states().unwrap().len();

    assert_eq!(session.states().unwrap().first_time(), Some(0.0));
    // Same problem solved twice from scratch, not appended.
    assert!(second_len <= first_len + 1);
}

#[test]
fn storing_flag_suppresses_samples() {
    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();
    session.set_storing(false);

    solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, true)
        .unwrap();
    assert_eq!(session.states().unwrap().len(), 0);
}

#[test]
fn stored_samples_interpolate_the_trajectory() {
    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();
    solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, true)
        .unwrap();

    let states = session.states().unwrap();
    // Query inside the recorded span (pre-step samples stop short of the
    // end time).
    let query = 0.5 * states.last_time().unwrap();
    let y = states.value_at(query).unwrap();
    assert!(
        (y[0] - (-query).exp()).abs() < 1e-2,
        "interpolated {} vs {}",
        y[0],
        (-query).exp()
    );

    // Derivative samples run parallel to the states.
    let derivs = session.derivative_samples().unwrap();
    assert_eq!(derivs.len(), states.len());
    let dy = derivs.sample(0).unwrap();
    assert_eq!(dy[0], -1.0);
}

#[test]
fn internal_values_are_sampled_with_the_states() {
    /// Decay that also reports y^2 as an auxiliary quantity.
    struct DecayWithEnergy;

    impl OdeEquations<f64> for DecayWithEnergy {
        fn state_len(&self) -> usize {
            1
        }
        fn derivatives(&mut self, _t: f64, y: &DynVector<f64>) -> DynVector<f64> {
            DynVector::from_slice(&[-y[0]])
        }
        fn internal_len(&self) -> usize {
            1
        }
        fn internal_values(&mut self, _t: f64, y: &DynVector<f64>) -> DynVector<f64> {
            DynVector::from_slice(&[y[0] * y[0]])
        }
    }

    let mut solver = BaderDeuflhard::default();
    let mut session =
        OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();
    solver
        .solve(&mut DecayWithEnergy, &mut DecayDerivs, &mut session, true)
        .unwrap();

    let states = session.states().unwrap();
    let internals = session.internal_samples().unwrap();
    assert_eq!(internals.len(), states.len());
    for i in 0..states.len() {
        let y = states.sample(i).unwrap()[0];
        let e = internals.sample(i).unwrap()[0];
        assert!((e - y * y).abs() < 1e-12, "sample {}: {} vs {}", i, e, y * y);
    }

    // Systems without internal values produce no auxiliary series.
    let mut plain = OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();
    solver
        .solve(&mut Decay, &mut DecayDerivs, &mut plain, true)
        .unwrap();
    assert!(plain.internal_samples().is_none());
}

#[test]
fn descending_time_span() {
    let mut solver = BaderDeuflhard::default();
    let mut diff = NumericalOdeDerivatives::new(1, 1e-8);
    let y1 = (-1.0_f64).exp();
    let mut session = OdeSession::new(1.0, 0.0, DynVector::from_slice(&[y1]));

    let solution = solver.solve(&mut Decay, &mut diff, &mut session, true).unwrap();
    assert!(solution.t <= 0.0);
    let exact = (-solution.t).exp();
    assert!(
        (solution.y[0] - exact).abs() < 1e-5,
        "y = {} vs {}",
        solution.y[0],
        exact
    );
}

#[test]
fn step_size_underflow_is_fatal() {
    let mut solver = BaderDeuflhard::default();
    let mut diff = NumericalOdeDerivatives::new(1, 1e-8);
    // At t = 1e16 the default initial step is below one ulp.
    let mut session = OdeSession::new(1.0e16, 1.0e16 + 10.0, DynVector::from_slice(&[1.0]));

    let err = solver
        .solve(&mut Decay, &mut diff, &mut session, true)
        .unwrap_err();
    assert!(matches!(err, OdeError::StepSizeUnderflow { .. }));
}

#[test]
fn step_budget_is_enforced() {
    let settings = OdeSettings {
        max_steps: 2,
        ..OdeSettings::default()
    };
    let mut solver = BaderDeuflhard::new(settings);
    let mut diff = NumericalOdeDerivatives::new(1, 1e-8);
    let mut session = OdeSession::new(0.0, 100.0, DynVector::from_slice(&[1.0]));

    let err = solver
        .solve(&mut Decay, &mut diff, &mut session, true)
        .unwrap_err();
    assert!(matches!(err, OdeError::TooManySteps { max_steps: 2, .. }));
}

#[test]
fn two_state_oscillator() {
    // y'' = -y as a first-order system; solution [cos t, -sin t].
    struct Oscillator;
    impl OdeEquations<f64> for Oscillator {
        fn state_len(&self) -> usize {
            2
        }
        fn derivatives(&mut self, _t: f64, y: &DynVector<f64>) -> DynVector<f64> {
            DynVector::from_slice(&[y[1], -y[0]])
        }
    }

    let mut solver = BaderDeuflhard::default();
    let mut diff = NumericalOdeDerivatives::new(2, 1e-8);
    let mut session = OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0, 0.0]));

    let solution = solver
        .solve(&mut Oscillator, &mut diff, &mut session, true)
        .unwrap();
    assert!((solution.y[0] - solution.t.cos()).abs() < 1e-5);
    assert!((solution.y[1] + solution.t.sin()).abs() < 1e-5);
}

#[test]
fn max_step_bound_is_respected() {
    let settings = OdeSettings {
        max_step: 0.05,
        ..OdeSettings::default()
    };
    let mut solver = BaderDeuflhard::new(settings);
    let mut session =
        OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();
    solver
        .solve(&mut Decay, &mut DecayDerivs, &mut session, true)
        .unwrap();

    let states = session.states().unwrap();
    for i in 1..states.len() {
        let dt = states.time(i).unwrap() - states.time(i - 1).unwrap();
        assert!(dt <= 0.05 + 1e-12, "step {} exceeded the bound", dt);
    }
}
