use alloc::vec;
use alloc::vec::Vec;

use crate::accuracy::AccuracySpec;
use crate::dynmatrix::{DynMatrix, DynVector};
use crate::traits::FloatScalar;

use super::DerivativeEstimator;

/// Extrapolation table depth. Estimates rarely improve past this many
/// step reductions before roundoff takes over.
const TABLE_SIZE: usize = 10;

/// Step decrease factor between successive table columns.
const CON: f64 = 1.4;

/// Ridders' method of polynomial extrapolation for first derivatives.
///
/// Each iteration evaluates a centered difference `(f(x+h) - f(x-h)) / 2h`
/// and enters it as a new column of a Neville-style tableau, with `h`
/// shrunk by 1.4 every column. Higher tableau rows cancel successively
/// higher-order truncation error terms, and the spread between neighboring
/// entries gives a running error estimate per output dimension.
///
/// A dimension is frozen as soon as a new column is 2x worse than its best
/// estimate so far, the signature of roundoff error winning over
/// truncation error. The whole estimation stops when every dimension has
/// frozen, the table is full, or the caller's [`AccuracySpec`] is
/// satisfied.
#[derive(Debug, Clone)]
pub struct RiddersExtrapolation<T> {
    target: T,
    hh: T,
    iteration: usize,
    first_half: bool,
    f_plus: DynVector<T>,
    tables: Vec<DynMatrix<T>>,
    best: DynVector<T>,
    errors: DynVector<T>,
    finished: Vec<bool>,
    left_to_finish: usize,
}

impl<T: FloatScalar> RiddersExtrapolation<T> {
    pub fn new() -> Self {
        Self {
            target: T::zero(),
            hh: T::zero(),
            iteration: 0,
            first_half: true,
            f_plus: DynVector::zeros(0, T::zero()),
            tables: Vec::new(),
            best: DynVector::zeros(0, T::zero()),
            errors: DynVector::zeros(0, T::zero()),
            finished: Vec::new(),
            left_to_finish: 0,
        }
    }

    /// Reallocate per-dimension state when the output size changes.
    fn size_to(&mut self, dims: usize) {
        if self.tables.len() != dims {
            self.tables =
                vec![DynMatrix::zeros(TABLE_SIZE, TABLE_SIZE, T::zero()); dims];
            self.best = DynVector::zeros(dims, T::zero());
            self.errors = DynVector::zeros(dims, T::zero());
            self.finished = vec![false; dims];
        }
        self.errors.set_all(T::max_value());
        for f in self.finished.iter_mut() {
            *f = false;
        }
        self.left_to_finish = dims;
    }

    /// Fold the centered difference for the current step into the tableau.
    fn accept_column(&mut self, diff: &DynVector<T>) {
        let col = self.iteration;
        let con2 = T::from(CON * CON).unwrap();
        let two = T::from(2.0).unwrap();

        if col == 0 {
            self.size_to(diff.len());
            for d in 0..diff.len() {
                self.tables[d][(0, 0)] = diff[d];
                self.best[d] = diff[d];
            }
            return;
        }

        for d in 0..diff.len() {
            if self.finished[d] {
                continue;
            }
            let table = &mut self.tables[d];
            table[(0, col)] = diff[d];
            let mut fac = con2;
            for j in 1..=col {
                table[(j, col)] =
                    (table[(j - 1, col)] * fac - table[(j - 1, col - 1)]) / (fac - T::one());
                fac = fac * con2;
                let errt = (table[(j, col)] - table[(j - 1, col)])
                    .abs()
                    .max((table[(j, col)] - table[(j - 1, col - 1)]).abs());
                if errt <= self.errors[d] {
                    self.errors[d] = errt;
                    self.best[d] = table[(j, col)];
                }
            }
            // Once the highest-order entry moves by more than twice the best
            // error, roundoff has taken over for this dimension.
            if (table[(col, col)] - table[(col - 1, col - 1)]).abs()
                >= two * self.errors[d]
            {
                self.finished[d] = true;
                self.left_to_finish -= 1;
            }
        }
    }
}

impl<T: FloatScalar> Default for RiddersExtrapolation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> DerivativeEstimator<T> for RiddersExtrapolation<T> {
    fn start(&mut self, target: T, step: T) {
        assert!(step != T::zero(), "initial step must be nonzero");
        self.target = target;
        self.hh = step;
        self.iteration = 0;
        self.first_half = true;
        let dims = self.best.len();
        if dims > 0 {
            self.size_to(dims);
        }
    }

    fn next_input(&self) -> T {
        if self.first_half {
            self.target + self.hh
        } else {
            self.target - self.hh
        }
    }

    fn set_function_values(&mut self, values: &DynVector<T>) {
        // Feeding values after the table is exhausted is a caller error;
        // ignore it rather than index past the tableau.
        if self.iteration >= TABLE_SIZE {
            return;
        }
        if self.first_half {
            if self.f_plus.len() != values.len() {
                self.f_plus = values.clone();
            } else {
                self.f_plus.copy_from(values);
            }
            self.first_half = false;
            return;
        }
        assert_eq!(
            values.len(),
            self.f_plus.len(),
            "function value length changed mid-estimate: {} vs {}",
            values.len(),
            self.f_plus.len(),
        );

        let two_h = self.hh + self.hh;
        let mut diff = DynVector::zeros(values.len(), T::zero());
        for d in 0..values.len() {
            diff[d] = (self.f_plus[d] - values[d]) / two_h;
        }
        self.accept_column(&diff);

        self.iteration += 1;
        self.hh = self.hh / T::from(CON).unwrap();
        self.first_half = true;
    }

    fn is_finished(&self, spec: Option<&AccuracySpec<T>>) -> bool {
        if self.iteration == 0 {
            return false;
        }
        if self.left_to_finish == 0 || self.iteration >= TABLE_SIZE {
            return true;
        }
        // The error estimate is meaningless until the second column has
        // been compared against the first.
        if self.iteration > 1 {
            if let Some(spec) = spec {
                return spec.normalized_error(&self.errors, &self.best) <= T::one();
            }
        }
        false
    }

    fn derivatives(&self) -> &DynVector<T> {
        &self.best
    }

    fn error(&self) -> &DynVector<T> {
        &self.errors
    }

    fn len(&self) -> usize {
        self.best.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<F>(ridders: &mut RiddersExtrapolation<f64>, f: F, spec: Option<&AccuracySpec<f64>>)
    where
        F: Fn(f64) -> DynVector<f64>,
    {
        let mut guard = 0;
        while !ridders.is_finished(spec) {
            let x = ridders.next_input();
            ridders.set_function_values(&f(x));
            guard += 1;
            assert!(guard < 100, "estimator failed to terminate");
        }
    }

    #[test]
    fn sin_derivative_across_step_sizes() {
        let x0 = 1.0_f64;
        for step in [0.5, 0.1, 1e-2, 1e-3] {
            let mut ridders = RiddersExtrapolation::new();
            ridders.start(x0, step);
            run(
                &mut ridders,
                |x| DynVector::from_slice(&[x.sin()]),
                None,
            );
            let d = ridders.derivatives()[0];
            assert!(
                (d - x0.cos()).abs() < 1e-8,
                "step {}: derivative {} vs {}",
                step,
                d,
                x0.cos()
            );
        }
    }

    #[test]
    fn vector_valued_function() {
        let x0 = 0.5_f64;
        let mut ridders = RiddersExtrapolation::new();
        ridders.start(x0, 0.1);
        run(
            &mut ridders,
            |x| DynVector::from_slice(&[x * x, x.exp()]),
            None,
        );
        assert_eq!(ridders.len(), 2);
        assert!((ridders.derivatives()[0] - 2.0 * x0).abs() < 1e-9);
        assert!((ridders.derivatives()[1] - x0.exp()).abs() < 1e-9);
    }

    #[test]
    fn spec_stops_early() {
        let mut spec = AccuracySpec::new(1, 1e-4_f64);
        spec.set_absolute_error(1e-4);
        let mut loose = RiddersExtrapolation::new();
        loose.start(1.0, 0.1);
        let mut loose_evals = 0;
        while !loose.is_finished(Some(&spec)) {
            let x = loose.next_input();
            loose.set_function_values(&DynVector::from_slice(&[x.sin()]));
            loose_evals += 1;
        }

        let mut full = RiddersExtrapolation::new();
        full.start(1.0, 0.1);
        let mut full_evals = 0;
        while !full.is_finished(None) {
            let x: f64 = full.next_input();
            full.set_function_values(&DynVector::from_slice(&[x.sin()]));
            full_evals += 1;
        }

        assert!(
            loose_evals <= full_evals,
            "loose tolerance took {} evals, unconstrained took {}",
            loose_evals,
            full_evals
        );
        assert!((loose.derivatives()[0] - 1.0_f64.cos()).abs() < 1e-4);
    }

    #[test]
    fn reported_error_bounds_true_error() {
        let mut ridders = RiddersExtrapolation::new();
        ridders.start(2.0, 0.25);
        run(
            &mut ridders,
            |x| DynVector::from_slice(&[1.0 / x]),
            None,
        );
        let true_err = (ridders.derivatives()[0] + 0.25).abs();
        // The estimate and its reported error should agree in magnitude.
        assert!(true_err < 10.0 * ridders.error()[0] + 1e-12);
    }

    #[test]
    fn restart_reuses_estimator() {
        let mut ridders = RiddersExtrapolation::new();
        ridders.start(0.0, 0.1);
        run(
            &mut ridders,
            |x| DynVector::from_slice(&[x.exp()]),
            None,
        );
        assert!((ridders.derivatives()[0] - 1.0).abs() < 1e-9);

        ridders.start(1.0, 0.1);
        assert!(!ridders.is_finished(None));
        run(
            &mut ridders,
            |x| DynVector::from_slice(&[x.exp()]),
            None,
        );
        assert!((ridders.derivatives()[0] - 1.0_f64.exp()).abs() < 1e-8);
    }

    #[test]
    #[should_panic(expected = "step must be nonzero")]
    fn zero_step_panics() {
        let mut ridders = RiddersExtrapolation::<f64>::new();
        ridders.start(1.0, 0.0);
    }
}
