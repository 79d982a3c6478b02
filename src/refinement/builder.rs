use std::time::Instant;

use log::{debug, info, warn};

use crate::{algorithms::statistics::residual_std, errors::IPError, function::TargetFunction, interpolators::{Interpolator, InterpolatorFactory}, storage::{bounding_box::BoundingBox, regular_grid::RegularGrid, tensor::Tensor}};

use super::{options::BuildOptions, output_box::OutputBox};

///
/// Result of a converged build.
///
#[derive(Debug)]
pub struct BuildOutput<I: Interpolator>
{
    pub interpolator: I,
    /// Range of the outputs sampled while refining, if requested.
    pub output_box: Option<OutputBox>,
    /// Samples per axis of the final mesh.
    pub resolution: Vec<usize>,
    /// Number of refinement rounds, including the final one in which every axis
    /// was within tolerance.
    pub rounds: usize,
    /// Total number of points the target function was evaluated at.
    pub evaluations: usize,
}

fn mesh_size(n: &[usize]) -> usize
{
    n.iter().fold(1_usize, |acc, &count| acc.saturating_mul(count))
}

fn check_mesh_size(n: &[usize], options: &BuildOptions) -> Result<(), IPError>
{
    match options.max_mesh_size
    {
        Some(max) if mesh_size(n) > max =>
        {
            warn!("mesh {:?} ({} points) exceeds the limit of {} points", n, mesh_size(n), max);
            Err(IPError::MaxMeshSizeExceeded)
        }
        _ => Ok(()),
    }
}

fn check_duration(start: &Instant, options: &BuildOptions) -> Result<(), IPError>
{
    match options.max_duration
    {
        Some(max) if start.elapsed() > max =>
        {
            warn!("build exceeded its time budget of {:?}", max);
            Err(IPError::MaxDurationExceeded)
        }
        _ => Ok(()),
    }
}

fn check_tolerance(tolerance: &[f64]) -> Result<(), IPError>
{
    if tolerance.is_empty()
    {
        return Err(IPError::ShapeMismatch);
    }
    if tolerance.iter().any(|&tol| !tol.is_finite() || tol < 0.0)
    {
        return Err(IPError::InvalidTolerance);
    }
    Ok(())
}

/// Broadcast a single tolerance to every channel.
fn broadcast_tolerance(tolerance: &[f64], channels: usize) -> Result<Vec<f64>, IPError>
{
    match tolerance.len()
    {
        1 => Ok(vec![tolerance[0]; channels]),
        len if len == channels => Ok(tolerance.to_vec()),
        _ => Err(IPError::ShapeMismatch),
    }
}

#[inline]
fn within_tolerance(err: &[f64], tolerance: &[f64]) -> bool
{
    err.iter().zip(tolerance).all(|(e, tol)| e <= tol)
}

///
/// Evaluate the target on every point of `grid`. The output must end with the grid
/// shape, start with `output_shape` when one is already known, and be finite.
///
fn sample<F: TargetFunction + ?Sized>(function: &F, grid: &RegularGrid, points: &Tensor, output_shape: Option<&[usize]>, evaluations: &mut usize) -> Result<Tensor, IPError>
{
    let values = function.evaluate(points)?;
    *evaluations += grid.len();
    let shape = values.shape();
    let k = grid.ndim();
    if shape.len() < k || shape[shape.len() - k..] != *grid.resolution()
    {
        return Err(IPError::ShapeMismatch);
    }
    if output_shape.is_some_and(|expected| shape[..shape.len() - k] != *expected)
    {
        return Err(IPError::ShapeMismatch);
    }
    if !values.is_finite()
    {
        return Err(IPError::InvalidSample);
    }
    Ok(values)
}

///
/// Build an interpolator of `function` over `bbox` by adaptive regular-grid
/// refinement.
///
/// Starting from `initial_resolution` samples per axis, each round visits the axes
/// in order. An axis whose last recorded error is within `tolerance` for every
/// output channel is skipped. Otherwise the mesh is probed with that axis doubled
/// (`n <- 2n + 1`): the target is sampled on the finer mesh and compared with the
/// current interpolator. If the population standard deviation of the residual
/// exceeds the tolerance in any channel the probe is accepted and the interpolator
/// is rebuilt from it; otherwise the axis is satisfied and the mesh is unchanged.
/// The build ends after a round in which every axis was satisfied.
///
/// `tolerance` holds one entry per output channel, or a single entry applied to
/// all of them.
///
pub fn build<F, B>(function: &F, factory: &B, bbox: &BoundingBox, tolerance: &[f64], options: &BuildOptions) -> Result<BuildOutput<B::Interpolator>, IPError>
where
    F: TargetFunction + ?Sized,
    B: InterpolatorFactory,
{
    let start = Instant::now();
    bbox.validate()?;
    if options.initial_resolution < 2
    {
        return Err(IPError::InvalidOptions);
    }
    check_tolerance(tolerance)?;

    let mut grid = RegularGrid::uniform(bbox.clone(), options.initial_resolution)?;
    check_mesh_size(grid.resolution(), options)?;
    let mut evaluations = 0;
    let samples = sample(function, &grid, &grid.points(), None, &mut evaluations)?;
    let output_shape = samples.shape()[..samples.ndim() - grid.ndim()].to_vec();
    let channels: usize = output_shape.iter().product();
    let tolerance = broadcast_tolerance(tolerance, channels)?;
    let mut interpolator = factory.construct(bbox, samples)?;

    let mut errs = vec![vec![f64::INFINITY; channels]; grid.ndim()];
    let mut output_box = options.track_output_box.then(|| OutputBox::new(channels));
    let mut rounds = 0;
    loop
    {
        check_mesh_size(grid.resolution(), options)?;
        rounds += 1;
        let mut satisfied = 0;
        for axis in 0..grid.ndim()
        {
            if within_tolerance(&errs[axis], &tolerance)
            {
                satisfied += 1;
                continue;
            }
            check_duration(&start, options)?;
            let probe = grid.refined(axis);
            check_mesh_size(probe.resolution(), options)?;
            let points = probe.points();
            let truth = sample(function, &probe, &points, Some(&output_shape), &mut evaluations)?;
            let predicted = interpolator.evaluate(&points)?;
            let err = residual_std(truth.data(), predicted.data(), channels)?;
            if let Some(output_box) = output_box.as_mut()
            {
                output_box.widen(truth.data());
            }
            let accept = !within_tolerance(&err, &tolerance);
            debug!("round {} axis {}: probe {:?} error {:?} {}", rounds, axis, probe.resolution(), err, if accept { "accepted" } else { "rejected" });
            if accept
            {
                interpolator = factory.construct(bbox, truth)?;
                grid = probe;
            }
            else
            {
                satisfied += 1;
            }
            errs[axis] = err;
        }
        if satisfied == grid.ndim()
        {
            break;
        }
    }
    info!("converged after {} rounds at resolution {:?} with {} evaluations", rounds, grid.resolution(), evaluations);
    Ok(BuildOutput { interpolator, output_box, resolution: grid.resolution().to_vec(), rounds, evaluations })
}

#[cfg(test)]
mod tests
{
    use std::{cell::Cell, time::Duration};

    use super::*;
    use crate::{function::Pointwise, interpolators::{kernel::{BorderMode, KernelConfig, KernelMode}, GradientFactory, InterpolatorKind, MultilinearFactory}};

    fn unit_square() -> BoundingBox
    {
        BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0])
    }

    /// Resolutions reachable from `initial` by repeated `n <- 2n + 1`.
    fn reachable(initial: usize, n: usize) -> bool
    {
        let mut m = initial;
        while m < n
        {
            m = 2 * m + 1;
        }
        m == n
    }

    #[test]
    fn linear_target_converges_immediately()
    {
        let f = Pointwise::new(1, |x: &[f64]| vec![x[0] + 2.0 * x[1]]);
        let out = build(&f, &MultilinearFactory, &unit_square(), &[1e-6], &BuildOptions::default()).unwrap();
        assert_eq!(out.resolution, vec![4, 4]);
        assert_eq!(out.rounds, 1);
        assert_eq!(out.evaluations, 16 + 36 + 36);
        assert!(out.output_box.is_none());
        assert!((out.interpolator.evaluate_point(&[0.5, 0.5]).unwrap()[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn tensor_valued_target_with_scalar_output()
    {
        // evaluates whole batches and returns values shaped like the point grid
        let f = |points: &Tensor| -> Result<Tensor, IPError>
        {
            let npts = points.len() / 2;
            let data = (0..npts).map(|p| 3.0 * points.data()[p] - points.data()[npts + p]).collect();
            Tensor::new(points.shape()[1..].to_vec(), data)
        };
        let bbox = BoundingBox::new(&[-1.0, 2.0], &[1.0, 4.0]);
        let out = build(&f, &MultilinearFactory, &bbox, &[1e-9], &BuildOptions::default()).unwrap();
        assert_eq!(out.interpolator.output_shape(), &[] as &[usize]);
        assert_eq!(out.resolution, vec![4, 4]);
        assert!((out.interpolator.evaluate_point(&[0.25, 3.0]).unwrap()[0] + 2.25).abs() < 1e-12);
    }

    #[test]
    fn multilinear_target_is_reproduced()
    {
        let g = |x: &[f64]| 1.0 - x[0] + 0.5 * x[1] + 3.0 * x[0] * x[1];
        let f = Pointwise::new(1, move |x: &[f64]| vec![g(x)]);
        let bbox = BoundingBox::new(&[-2.0, 0.0], &[1.0, 5.0]);
        let out = build(&f, &MultilinearFactory, &bbox, &[1e-10], &BuildOptions::default()).unwrap();
        assert_eq!(out.resolution, vec![4, 4]);
        for q in [[-1.9, 0.1], [0.77, 4.2], [1.0, 5.0], [-0.5, 2.5]]
        {
            assert!((out.interpolator.evaluate_point(&q).unwrap()[0] - g(&q)).abs() < 1e-10);
        }
    }

    #[test]
    fn resolution_grows_by_doubling()
    {
        let f = Pointwise::new(1, |x: &[f64]| vec![(4.0 * x[0]).sin() * (3.0 * x[1]).cos()]);
        let options = BuildOptions::default().with_max_mesh_size(1 << 20);
        let out = build(&f, &MultilinearFactory, &unit_square(), &[1e-3], &options).unwrap();
        assert!(out.rounds > 1);
        assert!(out.resolution.iter().all(|&n| reachable(4, n)), "{:?}", out.resolution);
        assert!(out.resolution.iter().any(|&n| n > 4));
        for q in [[0.1_f64, 0.9], [0.45, 0.55], [0.99, 0.01]]
        {
            let exact = (4.0 * q[0]).sin() * (3.0 * q[1]).cos();
            assert!((out.interpolator.evaluate_point(&q).unwrap()[0] - exact).abs() < 1e-2);
        }
    }

    #[test]
    fn only_the_needed_axis_is_refined()
    {
        let f = Pointwise::new(2, |x: &[f64]| vec![x[0] + x[1], (5.0 * x[0]).sin()]);
        let options = BuildOptions::default().with_max_mesh_size(100_000);
        let loose = build(&f, &MultilinearFactory, &unit_square(), &[1e-9, 10.0], &options).unwrap();
        assert_eq!(loose.resolution, vec![4, 4]);
        let tight = build(&f, &MultilinearFactory, &unit_square(), &[1e-9, 1e-4], &options).unwrap();
        assert!(tight.resolution[0] > 4);
        assert_eq!(tight.resolution[1], 4);
    }

    #[test]
    fn non_finite_target_is_rejected()
    {
        let f = Pointwise::new(1, |x: &[f64]| vec![x[0].sqrt()]);
        let bbox = BoundingBox::new(&[-1.0, 0.0], &[1.0, 1.0]);
        let result = build(&f, &MultilinearFactory, &bbox, &[1e-3], &BuildOptions::default());
        assert_eq!(result.err(), Some(IPError::InvalidSample));
    }

    #[test]
    fn non_finite_value_on_a_refined_mesh()
    {
        // x = 0.125 is not on the first 4-point mesh, only on its first doubling
        let calls = Cell::new(0);
        let f = |points: &Tensor| -> Result<Tensor, IPError>
        {
            calls.set(calls.get() + 1);
            let npts = points.len() / 2;
            let data = (0..npts).map(|p|
            {
                let x = points.data()[p];
                if (x - 0.125).abs() < 1e-9 { f64::NAN } else { (5.0 * x).sin() }
            }).collect();
            Tensor::new(points.shape()[1..].to_vec(), data)
        };
        let result = build(&f, &MultilinearFactory, &unit_square(), &[1e-6], &BuildOptions::default());
        assert_eq!(result.err(), Some(IPError::InvalidSample));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn mesh_budget_stops_before_resampling()
    {
        let calls = Cell::new(0);
        let f = |points: &Tensor| -> Result<Tensor, IPError>
        {
            calls.set(calls.get() + 1);
            let npts = points.len() / 2;
            let data = (0..npts).map(|p| (5.0 * points.data()[p]).sin()).collect();
            Tensor::new(points.shape()[1..].to_vec(), data)
        };
        let options = BuildOptions::default().with_max_mesh_size(20);
        let result = build(&f, &MultilinearFactory, &unit_square(), &[1e-6], &options);
        assert_eq!(result.err(), Some(IPError::MaxMeshSizeExceeded));
        assert_eq!(calls.get(), 1);

        // the first mesh alone is too large
        calls.set(0);
        let options = BuildOptions::default().with_max_mesh_size(10);
        let result = build(&f, &MultilinearFactory, &unit_square(), &[1e-6], &options);
        assert_eq!(result.err(), Some(IPError::MaxMeshSizeExceeded));
        assert_eq!(calls.get(), 0);
        assert!(IPError::MaxMeshSizeExceeded.is_resource_exhausted());
    }

    #[test]
    fn duration_budget_stops_before_probing()
    {
        let calls = Cell::new(0);
        let f = |points: &Tensor| -> Result<Tensor, IPError>
        {
            calls.set(calls.get() + 1);
            std::thread::sleep(Duration::from_millis(5));
            let npts = points.len() / 2;
            let data = (0..npts).map(|p| (5.0 * points.data()[p]).sin()).collect();
            Tensor::new(points.shape()[1..].to_vec(), data)
        };
        let options = BuildOptions::default().with_max_duration(Duration::from_millis(1));
        let result = build(&f, &MultilinearFactory, &unit_square(), &[1e-6], &options);
        assert_eq!(result.err(), Some(IPError::MaxDurationExceeded));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn output_box_covers_the_probes()
    {
        let f = Pointwise::new(2, |x: &[f64]| vec![x[0], -2.0 * x[1]]);
        let options = BuildOptions::default().with_output_box(true);
        let out = build(&f, &MultilinearFactory, &unit_square(), &[1e-9], &options).unwrap();
        let obox = out.output_box.unwrap();
        assert_eq!(obox.lower, vec![0.0, -2.0]);
        assert_eq!(obox.upper, vec![1.0, 0.0]);
    }

    #[test]
    fn other_interpolators_build()
    {
        let f = Pointwise::new(1, |x: &[f64]| vec![2.0 * x[0] - x[1]]);
        let out = build(&f, &GradientFactory, &unit_square(), &[1e-9], &BuildOptions::default()).unwrap();
        assert_eq!(out.resolution, vec![4, 4]);
        assert!((out.interpolator.evaluate_point(&[0.3, 0.6]).unwrap()[0]).abs() < 1e-12);

        let linear = KernelConfig { mode: KernelMode::Convolution, order: 1, border: BorderMode::Nearest };
        let out = build(&f, &InterpolatorKind::Kernel(linear), &unit_square(), &[1e-9], &BuildOptions::default()).unwrap();
        assert_eq!(out.resolution, vec![4, 4]);
        assert!((out.interpolator.evaluate_point(&[1.0, 0.5]).unwrap()[0] - 1.5).abs() < 1e-12);

        let cubic = InterpolatorKind::Kernel(KernelConfig::default());
        let result = build(&f, &cubic, &unit_square(), &[1e-9], &BuildOptions::default());
        assert_eq!(result.err(), Some(IPError::UnsupportedKernel));
    }

    #[test]
    fn closure_factory()
    {
        let factory = |bbox: &BoundingBox, samples: Tensor| crate::interpolators::gradient::GradientInterpolator::new(bbox.clone(), samples);
        let f = Pointwise::new(1, |x: &[f64]| vec![x[0] - x[1]]);
        let out = build(&f, &factory, &unit_square(), &[1e-9], &BuildOptions::new(2)).unwrap();
        assert_eq!(out.resolution, vec![2, 2]);
    }

    #[test]
    fn invalid_arguments()
    {
        let f = Pointwise::new(1, |x: &[f64]| vec![x[0]]);
        let options = BuildOptions::default();
        let err = |tolerance: &[f64], options: &BuildOptions| build(&f, &MultilinearFactory, &unit_square(), tolerance, options).err();
        assert_eq!(err(&[-1.0], &options), Some(IPError::InvalidTolerance));
        assert_eq!(err(&[f64::NAN], &options), Some(IPError::InvalidTolerance));
        assert_eq!(err(&[], &options), Some(IPError::ShapeMismatch));
        assert_eq!(err(&[1e-3, 1e-3, 1e-3], &options), Some(IPError::ShapeMismatch));
        assert_eq!(err(&[1e-3], &BuildOptions::new(1)), Some(IPError::InvalidOptions));

        let flat = BoundingBox::new(&[0.0, 1.0], &[1.0, 1.0]);
        let result = build(&f, &MultilinearFactory, &flat, &[1e-3], &options);
        assert_eq!(result.err(), Some(IPError::InvalidBoundingBox));

        // two outputs declared, one returned
        let short = Pointwise::new(2, |x: &[f64]| vec![x[0]]);
        let result = build(&short, &MultilinearFactory, &unit_square(), &[1e-3], &options);
        assert_eq!(result.err(), Some(IPError::ShapeMismatch));

        // values not laid out on the grid
        let flattened = |points: &Tensor| Tensor::new(vec![points.len() / 2], vec![0.0; points.len() / 2]);
        let result = build(&flattened, &MultilinearFactory, &unit_square(), &[1e-3], &options);
        assert_eq!(result.err(), Some(IPError::ShapeMismatch));
    }
}
