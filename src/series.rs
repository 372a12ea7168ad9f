use alloc::vec::Vec;

use crate::dynmatrix::DynVector;
use crate::traits::FloatScalar;

/// Points used for interpolated retrieval when enough samples exist.
const INTERP_POINTS: usize = 4;

/// Errors from [`SampledSeries`] operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesError<T> {
    /// The series already holds `capacity` samples.
    Full { capacity: usize },
    /// Sample index past the stored range.
    IndexOutOfBounds { index: usize, len: usize },
    /// Component index past the sample dimension.
    DimOutOfBounds { dim: usize, dims: usize },
    /// Query time outside the stored span.
    TimeOutOfRange { time: T, first: T, last: T },
    /// Store call whose time does not continue the series' monotonic order.
    NonMonotonic { time: T, last: T },
    /// Operation requires at least one sample.
    Empty,
}

impl<T: core::fmt::Display> core::fmt::Display for SeriesError<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SeriesError::Full { capacity } => {
                write!(f, "series is full ({} samples)", capacity)
            }
            SeriesError::IndexOutOfBounds { index, len } => {
                write!(f, "sample index {} out of bounds (valid: 0..{})", index, len)
            }
            SeriesError::DimOutOfBounds { dim, dims } => {
                write!(f, "component {} out of bounds (valid: 0..{})", dim, dims)
            }
            SeriesError::TimeOutOfRange { time, first, last } => {
                write!(f, "time {} outside stored span [{}, {}]", time, first, last)
            }
            SeriesError::NonMonotonic { time, last } => {
                write!(
                    f,
                    "time {} does not advance monotonically past the last stored time {}",
                    time, last
                )
            }
            SeriesError::Empty => write!(f, "series holds no samples"),
        }
    }
}

#[cfg(feature = "std")]
impl<T: core::fmt::Display + core::fmt::Debug> std::error::Error for SeriesError<T> {}

/// A capacity-bounded time series of state vectors.
///
/// Samples must arrive in strictly monotonic time order; the direction
/// (ascending or descending) is fixed by the first two samples and
/// enforced from then on. Retrieval at an
/// arbitrary time inside the stored span interpolates through a four-point
/// Lagrange window around the query, which matches the convergence order
/// of the integrator that typically fills the series.
///
/// # Example
///
/// ```
/// use stiffode::{DynVector, SampledSeries};
///
/// let mut series = SampledSeries::new(1, 16);
/// for i in 0..5 {
///     let t = i as f64;
///     series.store(t, &DynVector::from_slice(&[t * t])).unwrap();
/// }
/// let y = series.value_at(1.5).unwrap();
/// assert!((y[0] - 2.25).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SampledSeries<T> {
    times: Vec<T>,
    values: Vec<DynVector<T>>,
    dims: usize,
    capacity: usize,
}

impl<T: FloatScalar> SampledSeries<T> {
    /// A series for `dims`-component samples holding at most `capacity`.
    pub fn new(dims: usize, capacity: usize) -> Self {
        assert!(dims > 0, "sample dimension must be positive");
        Self {
            times: Vec::new(),
            values: Vec::new(),
            dims,
            capacity,
        }
    }

    /// Number of stored samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Components per sample.
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Maximum number of samples.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Earliest stored time, if any.
    pub fn first_time(&self) -> Option<T> {
        self.times.first().copied()
    }

    /// Latest stored time, if any.
    pub fn last_time(&self) -> Option<T> {
        self.times.last().copied()
    }

    /// Whether stored times increase. Vacuously true until two samples
    /// have fixed the direction.
    pub fn is_ascending(&self) -> bool {
        match self.times.len() {
            0 | 1 => true,
            _ => self.times[1] > self.times[0],
        }
    }

    /// Append a sample.
    ///
    /// Fails if the series is full or `time` does not continue the series'
    /// monotonic order. Panics if `y` has the wrong dimension.
    pub fn store(&mut self, time: T, y: &DynVector<T>) -> Result<(), SeriesError<T>> {
        assert_eq!(
            y.len(),
            self.dims,
            "sample dimension mismatch: {} vs {}",
            y.len(),
            self.dims,
        );
        if self.times.len() >= self.capacity {
            return Err(SeriesError::Full {
                capacity: self.capacity,
            });
        }
        if let Some(&last) = self.times.last() {
            let advances = if self.times.len() < 2 {
                time != last
            } else if self.is_ascending() {
                time > last
            } else {
                time < last
            };
            if !advances {
                return Err(SeriesError::NonMonotonic { time, last });
            }
        }
        self.times.push(time);
        self.values.push(y.clone());
        Ok(())
    }

    /// Change the capacity, keeping stored samples. Shrinking below the
    /// current length drops the newest samples.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        if self.times.len() > capacity {
            self.times.truncate(capacity);
            self.values.truncate(capacity);
        }
    }

    /// Drop all samples, keeping the capacity.
    pub fn clear(&mut self) {
        self.times.clear();
        self.values.clear();
    }

    /// Time of the sample at `index`.
    pub fn time(&self, index: usize) -> Result<T, SeriesError<T>> {
        self.times
            .get(index)
            .copied()
            .ok_or(SeriesError::IndexOutOfBounds {
                index,
                len: self.times.len(),
            })
    }

    /// Sample at `index`.
    pub fn sample(&self, index: usize) -> Result<&DynVector<T>, SeriesError<T>> {
        self.values.get(index).ok_or(SeriesError::IndexOutOfBounds {
            index,
            len: self.times.len(),
        })
    }

    /// Interpolated state at `time`, which must lie within the stored span.
    ///
    /// Uses a Lagrange polynomial through the four samples nearest the
    /// query (fewer when the series is short). Exactly reproduces stored
    /// samples when queried at a stored time.
    pub fn value_at(&self, time: T) -> Result<DynVector<T>, SeriesError<T>> {
        let n = self.times.len();
        if n == 0 {
            return Err(SeriesError::Empty);
        }
        let first = self.times[0];
        let last = self.times[n - 1];
        let (lo, hi) = if first <= last { (first, last) } else { (last, first) };
        if time < lo || time > hi {
            return Err(SeriesError::TimeOutOfRange { time, first, last });
        }

        // Insertion index of the query among the stored times.
        let pos = if self.is_ascending() {
            self.times.partition_point(|&t| t < time)
        } else {
            self.times.partition_point(|&t| t > time)
        };
        if pos < n && self.times[pos] == time {
            return Ok(self.values[pos].clone());
        }

        let points = INTERP_POINTS.min(n);
        let start = pos
            .saturating_sub(points / 2)
            .min(n - points);

        let mut out = DynVector::zeros(self.dims, T::zero());
        for j in start..start + points {
            let mut basis = T::one();
            for i in start..start + points {
                if i != j {
                    basis = basis * (time - self.times[i]) / (self.times[j] - self.times[i]);
                }
            }
            for d in 0..self.dims {
                out[d] = out[d] + self.values[j][d] * basis;
            }
        }
        Ok(out)
    }

    /// Index and value of the smallest entry of component `dim`.
    pub fn min(&self, dim: usize) -> Result<(usize, T), SeriesError<T>> {
        self.extremum(dim, |candidate, best| candidate < best)
    }

    /// Index and value of the largest entry of component `dim`.
    pub fn max(&self, dim: usize) -> Result<(usize, T), SeriesError<T>> {
        self.extremum(dim, |candidate, best| candidate > best)
    }

    fn extremum<F>(&self, dim: usize, better: F) -> Result<(usize, T), SeriesError<T>>
    where
        F: Fn(T, T) -> bool,
    {
        if dim >= self.dims {
            return Err(SeriesError::DimOutOfBounds {
                dim,
                dims: self.dims,
            });
        }
        if self.values.is_empty() {
            return Err(SeriesError::Empty);
        }
        let mut best_index = 0;
        let mut best = self.values[0][dim];
        for (i, v) in self.values.iter().enumerate().skip(1) {
            if better(v[dim], best) {
                best = v[dim];
                best_index = i;
            }
        }
        Ok((best_index, best))
    }
}
