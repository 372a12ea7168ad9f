
use crate::dynmatrix::DynVector;
use crate::series::SampledSeries;
use crate::traits::FloatScalar;

/// Samples a fresh collector allocates for.
const INITIAL_CAPACITY: usize = 2000;

/// Headroom factor applied when projecting the final sample count during
/// an overflow reallocation.
const GROWTH_MARGIN: f64 = 1.3;

/// Stores integration samples, growing its storage when the solver
/// produces more steps than projected.
///
/// Parallel series are kept for the state vectors, their time derivatives
/// and (when the system reports them) auxiliary internal values, all
/// sampled at the pre-step points the solver visits.
/// On overflow the new capacity is projected from the fraction of the
/// integration span covered so far, padded by 30%, so a solver that has
/// stored 2000 samples in the first tenth of the span reallocates once
/// for roughly 26000 rather than doubling repeatedly.
#[derive(Debug, Clone)]
pub struct DataCollector<T> {
    states: SampledSeries<T>,
    derivatives: SampledSeries<T>,
    internals: Option<SampledSeries<T>>,
    span_start: T,
    span_end: T,
}

impl<T: FloatScalar> DataCollector<T> {
    /// A collector for `dims`-state samples with the default capacity.
    pub fn new(dims: usize) -> Self {
        Self::with_capacity(dims, INITIAL_CAPACITY)
    }

    /// A collector with an explicit initial capacity.
    pub fn with_capacity(dims: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            states: SampledSeries::new(dims, capacity),
            derivatives: SampledSeries::new(dims, capacity),
            internals: None,
            span_start: T::zero(),
            span_end: T::one(),
        }
    }

    /// Stored state samples.
    pub fn states(&self) -> &SampledSeries<T> {
        &self.states
    }

    /// Stored derivative samples, parallel to [`states`](Self::states).
    pub fn derivatives(&self) -> &SampledSeries<T> {
        &self.derivatives
    }

    /// Stored auxiliary samples, present once a system that reports
    /// internal values has been integrated.
    pub fn internal_values(&self) -> Option<&SampledSeries<T>> {
        self.internals.as_ref()
    }

    /// Drop all samples, keeping the current capacity.
    pub fn clear(&mut self) {
        self.states.clear();
        self.derivatives.clear();
        if let Some(internals) = self.internals.as_mut() {
            internals.clear();
        }
    }

    /// Set the integration span used to project capacity on overflow.
    pub(crate) fn begin_span(&mut self, start: T, end: T) {
        self.span_start = start;
        self.span_end = end;
    }

    /// Record one sample, growing storage if needed. A time that repeats
    /// the previous sample (a continued session re-visiting its last
    /// point) is skipped silently.
    pub(crate) fn record(
        &mut self,
        t: T,
        y: &DynVector<T>,
        dy: &DynVector<T>,
        internal: Option<&DynVector<T>>,
    ) {
        if self.states.len() >= self.states.capacity() {
            let capacity = self.projected_capacity(t);
            self.states.resize(capacity);
            self.derivatives.resize(capacity);
            if let Some(internals) = self.internals.as_mut() {
                internals.resize(capacity);
            }
        }
        // A non-monotonic rejection here is the repeated-point case; the
        // auxiliary series advance in lockstep with the states.
        if self.states.store(t, y).is_ok() {
            let _ = self.derivatives.store(t, dy);
            if let Some(v) = internal {
                let internals = self.internals.get_or_insert_with(|| {
                    SampledSeries::new(v.len(), self.states.capacity())
                });
                let _ = internals.store(t, v);
            }
        }
    }

    /// Estimate the total sample count from the span fraction covered.
    fn projected_capacity(&self, t: T) -> usize {
        let len = self.states.len();
        let fallback = len * 2;
        let span = self.span_end - self.span_start;
        if span == T::zero() {
            return fallback;
        }
        let fraction = match ((t - self.span_start) / span).to_f64() {
            Some(f) if f > 1.0e-6 && f <= 1.0 => f,
            _ => return fallback,
        };
        let projected = ((len as f64) / fraction * GROWTH_MARGIN) as usize;
        projected.max(len + 1)
    }
}

/// One integration problem: span, initial conditions, current state and
/// optional sample storage.
///
/// The session outlives individual [`solve`](super::BaderDeuflhard::solve)
/// calls. A solve with `reset = false` continues from wherever the last
/// one stopped, so extending a run is just
/// [`set_end_time`](Self::set_end_time) followed by another solve, with
/// stored samples accumulating across the calls.
#[derive(Debug, Clone)]
pub struct OdeSession<T> {
    start_time: T,
    end_time: T,
    initial: DynVector<T>,
    time: T,
    state: DynVector<T>,
    storing: bool,
    collector: Option<DataCollector<T>>,
}

impl<T: FloatScalar> OdeSession<T> {
    /// A session integrating from `start_time` to `end_time` starting at
    /// `initial`. Descending spans integrate backwards in time.
    ///
    /// Panics if the span is empty or `initial` has no components.
    pub fn new(start_time: T, end_time: T, initial: DynVector<T>) -> Self {
        assert!(!initial.is_empty(), "initial state must be non-empty");
        assert!(
            end_time != start_time,
            "integration span must be nonzero"
        );
        let state = initial.clone();
        Self {
            start_time,
            end_time,
            initial,
            time: start_time,
            state,
            storing: true,
            collector: None,
        }
    }

    /// Attach a sample collector, builder style.
    pub fn with_storage(mut self) -> Self {
        self.collector = Some(DataCollector::new(self.initial.len()));
        self
    }

    /// Whether samples are being recorded this solve.
    pub fn storing(&self) -> bool {
        self.storing
    }

    /// Suspend or resume sample recording without touching stored data.
    pub fn set_storing(&mut self, storing: bool) {
        self.storing = storing;
    }

    pub fn start_time(&self) -> T {
        self.start_time
    }

    pub fn end_time(&self) -> T {
        self.end_time
    }

    /// Move the end time, typically before continuing a finished session.
    pub fn set_end_time(&mut self, end_time: T) {
        self.end_time = end_time;
    }

    /// Current time, advanced by each solve.
    pub fn time(&self) -> T {
        self.time
    }

    /// Current state, advanced by each solve.
    pub fn state(&self) -> &DynVector<T> {
        &self.state
    }

    pub fn state_len(&self) -> usize {
        self.state.len()
    }

    /// Recorded state samples, if storage is attached.
    pub fn states(&self) -> Option<&SampledSeries<T>> {
        self.collector.as_ref().map(|c| c.states())
    }

    /// Recorded derivative samples, if storage is attached.
    pub fn derivative_samples(&self) -> Option<&SampledSeries<T>> {
        self.collector.as_ref().map(|c| c.derivatives())
    }

    /// Recorded auxiliary samples, if storage is attached and the system
    /// reports internal values.
    pub fn internal_samples(&self) -> Option<&SampledSeries<T>> {
        self.collector.as_ref().and_then(|c| c.internal_values())
    }

    /// Return to the start time and initial conditions and drop any
    /// stored samples.
    pub fn reset(&mut self) {
        self.time = self.start_time;
        self.state.copy_from(&self.initial);
        if let Some(collector) = self.collector.as_mut() {
            collector.clear();
        }
    }

    pub(crate) fn begin_span(&mut self) {
        let (start, end) = (self.time, self.end_time);
        if let Some(collector) = self.collector.as_mut() {
            collector.begin_span(start, end);
        }
    }

    pub(crate) fn record(
        &mut self,
        t: T,
        y: &DynVector<T>,
        dy: &DynVector<T>,
        internal: Option<&DynVector<T>>,
    ) {
        if !self.storing {
            return;
        }
        if let Some(collector) = self.collector.as_mut() {
            collector.record(t, y, dy, internal);
        }
    }

    pub(crate) fn set_current(&mut self, t: T, y: &DynVector<T>) {
        self.time = t;
        self.state.copy_from(y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_grows_from_span_projection() {
        let mut collector = DataCollector::with_capacity(1, 4);
        collector.begin_span(0.0, 1.0);
        for i in 0..40 {
            let t = i as f64 * 0.01;
            let y = DynVector::from_slice(&[t]);
            collector.record(t, &y, &y, None);
        }
        assert_eq!(collector.states().len(), 40);
        assert_eq!(collector.derivatives().len(), 40);
        assert!(collector.states().capacity() >= 40);
        // Projection from 4% span coverage should have jumped well past
        // the doubling fallback.
        assert!(collector.states().capacity() > 8);
        // Growth preserved every stored pair unchanged.
        for i in 0..40 {
            let t = i as f64 * 0.01;
            assert_eq!(collector.states().time(i).unwrap(), t);
            assert_eq!(collector.states().sample(i).unwrap()[0], t);
        }
    }

    #[test]
    fn collector_skips_repeated_time() {
        let mut collector = DataCollector::with_capacity(1, 8);
        collector.begin_span(0.0, 1.0);
        let y = DynVector::from_slice(&[1.0]);
        collector.record(0.0, &y, &y, None);
        collector.record(0.5, &y, &y, None);
        collector.record(0.5, &y, &y, None);
        assert_eq!(collector.states().len(), 2);
    }

    #[test]
    fn session_reset_restores_initial_state() {
        let mut session =
            OdeSession::new(0.0, 2.0, DynVector::from_slice(&[1.0, -1.0])).with_storage();
        let moved = DynVector::from_slice(&[3.0, 4.0]);
        session.record(0.5, &moved, &moved, None);
        session.set_current(0.5, &moved);
        assert_eq!(session.time(), 0.5);

        session.reset();
        assert_eq!(session.time(), 0.0);
        assert_eq!(session.state()[0], 1.0);
        assert_eq!(session.states().map(|s| s.len()), Some(0));
    }

    #[test]
    fn storing_flag_gates_recording() {
        let mut session =
            OdeSession::new(0.0, 1.0, DynVector::from_slice(&[1.0])).with_storage();
        let y = DynVector::from_slice(&[2.0]);
        session.set_storing(false);
        session.record(0.1, &y, &y, None);
        assert_eq!(session.states().map(|s| s.len()), Some(0));

        session.set_storing(true);
        session.record(0.2, &y, &y, None);
        assert_eq!(session.states().map(|s| s.len()), Some(1));
    }

    #[test]
    #[should_panic(expected = "span must be nonzero")]
    fn empty_span_panics() {
        let _ = OdeSession::new(1.0, 1.0, DynVector::from_slice(&[1.0_f64]));
    }
}
