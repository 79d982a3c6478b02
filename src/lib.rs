//!
//! Adaptive regular-grid interpolation of expensive functions.
//!
//! `refinement::build` samples a target function on a regular mesh over a bounding
//! box and doubles the resolution one axis at a time (`n <- 2n + 1`) until the
//! interpolator predicts the finer samples within a per-channel tolerance.
//!
pub mod algorithms;
pub mod errors;
pub mod function;
pub mod interpolators;
pub mod refinement;
pub mod storage;

pub use errors::IPError;
pub use function::{ParallelPointwise, Pointwise, TargetFunction};
pub use interpolators::{Interpolator, InterpolatorFactory, InterpolatorKind};
pub use refinement::{build, BuildOptions, BuildOutput, OutputBox};
pub use storage::{bounding_box::BoundingBox, regular_grid::RegularGrid, tensor::Tensor};
