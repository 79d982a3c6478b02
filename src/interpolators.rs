pub mod convolution_kernel;
pub mod gradient;
pub mod kernel;
pub mod multilinear;

use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};

use crate::{algorithms::cell_lookup::locate, errors::IPError, storage::{bounding_box::BoundingBox, tensor::Tensor}};
use self::{convolution_kernel::ConvolutionKernel, gradient::GradientInterpolator, kernel::{KernelConfig, KernelInterpolator}, multilinear::MultilinearInterpolator};

///
/// An approximation of a function over a bounding box, evaluated in batches.
///
pub trait Interpolator: Send + Sync
{
    /// Box the interpolator was built over.
    fn bounding_box(&self) -> &BoundingBox;

    /// Shape of the value produced at a single point.
    fn output_shape(&self) -> &[usize];

    ///
    /// Evaluate at `points` of shape `(ndim, *point_shape)`. Returns a tensor of
    /// shape `(*output_shape, *point_shape)`. The cell-based interpolators clamp
    /// points outside the box to the nearest boundary cell; kernel-backed ones apply
    /// their border mode.
    ///
    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>;

    /// Evaluate at a single point, returning the flattened output.
    fn evaluate_point(&self, x: &[f64]) -> Result<Vec<f64>, IPError>
    {
        let points = Tensor::new(vec![x.len()], x.to_vec())?;
        Ok(self.evaluate(&points)?.into_data())
    }
}

impl Interpolator for Box<dyn Interpolator>
{
    fn bounding_box(&self) -> &BoundingBox
    {
        (**self).bounding_box()
    }

    fn output_shape(&self) -> &[usize]
    {
        (**self).output_shape()
    }

    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>
    {
        (**self).evaluate(points)
    }
}

///
/// Builds an interpolator from a box and the samples of a function on a regular
/// grid spanning that box (layout `(*output_shape, n[0], ..., n[k-1])`).
///
pub trait InterpolatorFactory
{
    type Interpolator: Interpolator;

    fn construct(&self, bbox: &BoundingBox, samples: Tensor) -> Result<Self::Interpolator, IPError>;
}

impl<F, I> InterpolatorFactory for F
where
    F: Fn(&BoundingBox, Tensor) -> Result<I, IPError>,
    I: Interpolator,
{
    type Interpolator = I;

    fn construct(&self, bbox: &BoundingBox, samples: Tensor) -> Result<I, IPError>
    {
        self(bbox, samples)
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct MultilinearFactory;

impl InterpolatorFactory for MultilinearFactory
{
    type Interpolator = MultilinearInterpolator;

    fn construct(&self, bbox: &BoundingBox, samples: Tensor) -> Result<MultilinearInterpolator, IPError>
    {
        MultilinearInterpolator::new(bbox.clone(), samples)
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct GradientFactory;

impl InterpolatorFactory for GradientFactory
{
    type Interpolator = GradientInterpolator;

    fn construct(&self, bbox: &BoundingBox, samples: Tensor) -> Result<GradientInterpolator, IPError>
    {
        GradientInterpolator::new(bbox.clone(), samples)
    }
}

///
/// Interpolation strategy chosen at runtime, e.g. from a configuration file.
/// The kernel-backed strategy uses the built-in `ConvolutionKernel`.
///
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InterpolatorKind
{
    #[default]
    Multilinear,
    Gradient,
    Kernel(KernelConfig),
}

impl InterpolatorFactory for InterpolatorKind
{
    type Interpolator = Box<dyn Interpolator>;

    fn construct(&self, bbox: &BoundingBox, samples: Tensor) -> Result<Box<dyn Interpolator>, IPError>
    {
        Ok(match self
        {
            InterpolatorKind::Multilinear => Box::new(MultilinearInterpolator::new(bbox.clone(), samples)?),
            InterpolatorKind::Gradient => Box::new(GradientInterpolator::new(bbox.clone(), samples)?),
            InterpolatorKind::Kernel(config) => Box::new(KernelInterpolator::new(bbox.clone(), samples, ConvolutionKernel, *config)?),
        })
    }
}

///
/// Check a sample tensor against its box and return the number of leading
/// output axes. Every spatial axis needs at least two samples.
///
pub(crate) fn output_axes(bbox: &BoundingBox, samples: &Tensor) -> Result<usize, IPError>
{
    bbox.validate()?;
    if samples.ndim() < bbox.ndim()
    {
        return Err(IPError::ShapeMismatch);
    }
    let npre = samples.ndim() - bbox.ndim();
    if samples.shape()[npre..].iter().any(|&n| n < 2)
    {
        return Err(IPError::ShapeMismatch);
    }
    Ok(npre)
}

/// Number of points in a `(ndim, *point_shape)` tensor.
pub(crate) fn point_count(bbox: &BoundingBox, points: &Tensor) -> Result<usize, IPError>
{
    if points.ndim() == 0 || points.shape()[0] != bbox.ndim()
    {
        return Err(IPError::ShapeMismatch);
    }
    Ok(points.len() / bbox.ndim())
}

///
/// Shared evaluation loop for the cell-based interpolators. `eval` receives the
/// clamped cell index and the offset inside the cell, and accumulates one value
/// per output channel into `out` (zeroed beforehand). Points are processed in
/// parallel; the result is channel-major `(*output_shape, *point_shape)`.
///
pub(crate) fn evaluate_by_cell<Fun>(bbox: &BoundingBox, cells: &[usize], output_shape: &[usize], points: &Tensor, eval: Fun) -> Result<Tensor, IPError>
where
    Fun: Fn(&[usize], &[f64], &mut [f64]) + Sync,
{
    let npts = point_count(bbox, points)?;
    let ndim = bbox.ndim();
    let channels: usize = output_shape.iter().product();
    let coords = points.data();

    let mut point_major = vec![0.0; npts * channels];
    if channels > 0
    {
        point_major.par_chunks_mut(channels).enumerate().for_each_init(
            || (vec![0.0; ndim], vec![0; ndim], vec![0.0; ndim]),
            |(x, index, offset), (p, out)|
            {
                for d in 0..ndim
                {
                    x[d] = coords[d * npts + p];
                }
                locate(bbox, cells, x, index, offset);
                eval(index, offset, out);
            });
    }

    let mut data = vec![0.0; npts * channels];
    for (p, values) in point_major.chunks_exact(channels.max(1)).enumerate().take(npts)
    {
        for (c, &v) in values.iter().enumerate()
        {
            data[c * npts + p] = v;
        }
    }
    let mut shape = output_shape.to_vec();
    shape.extend(&points.shape()[1..]);
    Tensor::new(shape, data)
}

#[test]
fn closures_are_factories()
{
    let factory = |bbox: &BoundingBox, samples: Tensor| MultilinearInterpolator::new(bbox.clone(), samples);
    let bbox = BoundingBox::new(&[0.0], &[1.0]);
    let samples = Tensor::new(vec![3], vec![0.0, 1.0, 4.0]).unwrap();
    let ip = factory.construct(&bbox, samples).unwrap();
    assert!((ip.evaluate_point(&[0.75]).unwrap()[0] - 2.5).abs() < 1e-12);
}

#[test]
fn kind_selects_strategy()
{
    let bbox = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
    let samples = Tensor::new(vec![2, 2], vec![0.0, 1.0, 1.0, 2.0]).unwrap();
    let kinds = [
        InterpolatorKind::Multilinear,
        InterpolatorKind::Gradient,
        InterpolatorKind::Kernel(KernelConfig { order: 1, ..Default::default() }),
    ];
    for kind in kinds
    {
        let ip = kind.construct(&bbox, samples.clone()).unwrap();
        assert!((ip.evaluate_point(&[0.5, 0.5]).unwrap()[0] - 1.0).abs() < 1e-12);
        assert_eq!(ip.output_shape(), &[] as &[usize]);
    }
    let parsed: InterpolatorKind = serde_json::from_str(r#"{"Kernel":{"mode":"Convolution","order":0,"border":"Nearest"}}"#).unwrap();
    assert_eq!(parsed, InterpolatorKind::Kernel(KernelConfig { mode: kernel::KernelMode::Convolution, order: 0, border: kernel::BorderMode::Nearest }));
}

#[test]
fn sample_validation()
{
    let bbox = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
    assert_eq!(output_axes(&bbox, &Tensor::zeros(vec![3])), Err(IPError::ShapeMismatch));
    assert_eq!(output_axes(&bbox, &Tensor::zeros(vec![3, 1])), Err(IPError::ShapeMismatch));
    assert_eq!(output_axes(&bbox, &Tensor::zeros(vec![2, 3, 3])), Ok(1));
    let points = Tensor::zeros(vec![3, 5]);
    assert_eq!(point_count(&bbox, &points), Err(IPError::ShapeMismatch));
}
