//! Stiff ODE integration and numerical-derivative tooling.
//!
//! The centerpiece is [`BaderDeuflhard`], a semi-implicit extrapolation
//! integrator for stiff systems, together with the machinery it leans on:
//!
//! - [`RiddersExtrapolation`] and [`JacobianBuilder`] for extrapolated
//!   numerical derivatives with running error estimates,
//! - [`NewtonRaphson`] for multidimensional root finding,
//! - [`AccuracySpec`] for per-component convergence tests shared by all of
//!   the above,
//! - [`SampledSeries`] and the ODE session types for storing and
//!   interpolating trajectories,
//! - [`DynMatrix`], [`DynVector`] and [`DynColPivQr`] as the dense linear
//!   algebra underneath.
//!
//! Everything is generic over [`FloatScalar`] (`f32` or `f64`).
//!
//! The crate is `no_std` compatible: disable the default `std` feature and
//! enable `libm` for the float intrinsics.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod accuracy;
pub mod deriv;
pub mod dynmatrix;
pub mod linalg;
pub mod newton;
pub mod ode;
pub mod series;
pub mod traits;

pub use accuracy::AccuracySpec;
pub use deriv::{DerivativeEstimator, JacobianBuilder, RiddersExtrapolation};
pub use dynmatrix::{DynMatrix, DynVector};
pub use linalg::DynColPivQr;
pub use newton::{NewtonRaphson, RootEquations, RootResult};
pub use ode::{
    BaderDeuflhard, DataCollector, NumericalOdeDerivatives, OdeDifferentiator, OdeEquations,
    OdeError, OdeSession, OdeSettings, Solution,
};
pub use series::{SampledSeries, SeriesError};
pub use traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};
