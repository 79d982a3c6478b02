use serde::{Deserialize, Serialize};

use crate::{errors::IPError, storage::{bounding_box::BoundingBox, tensor::Tensor}};

use super::{output_axes, point_count, Interpolator, InterpolatorFactory};

/// Interpolation scheme requested from a kernel.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelMode
{
    /// Polynomial convolution, as commonly used in image processing.
    Convolution,
    /// B-spline interpolation on prefiltered samples.
    #[default]
    Spline,
    /// Convolution with a Lanczos kernel.
    Lanczos,
}

/// Handling of kernel taps that fall outside the sample grid.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderMode
{
    /// Samples outside the grid are zero.
    Zero,
    /// Repeat the edge sample.
    Nearest,
    /// Wrap around periodically.
    #[default]
    Cyclic,
    /// Reflect about the edge, repeating the edge sample.
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig
{
    pub mode: KernelMode,
    /// Interpolation order; its meaning depends on `mode`.
    pub order: usize,
    pub border: BorderMode,
}

impl Default for KernelConfig
{
    fn default() -> Self
    {
        Self { mode: KernelMode::Spline, order: 3, border: BorderMode::Cyclic }
    }
}

///
/// A numeric kernel that evaluates a sample grid at fractional index coordinates.
///
/// `samples` always has the layout `(*output_shape, n[0], ..., n[k-1])` with `npre`
/// leading output axes.
///
pub trait InterpolationKernel: Send + Sync
{
    ///
    /// Prepare samples for spline evaluation (e.g. B-spline prefiltering along every
    /// spatial axis). Called once when a spline-mode interpolator is constructed.
    ///
    fn prefilter(&self, samples: &Tensor, npre: usize, config: &KernelConfig) -> Result<Tensor, IPError>;

    ///
    /// Evaluate at `coords` of shape `(k, *point_shape)`, expressed in sample index
    /// units (`0` is the first sample, `n - 1` the last). Returns
    /// `(*output_shape, *point_shape)`.
    ///
    fn map_coordinates(&self, samples: &Tensor, npre: usize, coords: &Tensor, config: &KernelConfig) -> Result<Tensor, IPError>;
}

///
/// Interpolator delegating evaluation to an `InterpolationKernel`. Query points are
/// rescaled from box coordinates into sample index coordinates.
///
/// Points outside the box are not clamped to a boundary cell: taps beyond the grid
/// follow the configured `BorderMode`, so with the default `Cyclic` border an
/// out-of-box query wraps around to the opposite side.
///
#[derive(Debug, Clone)]
pub struct KernelInterpolator<K: InterpolationKernel>
{
    bbox: BoundingBox,
    output_shape: Vec<usize>,
    npre: usize,
    samples: Tensor,
    kernel: K,
    config: KernelConfig,
}

impl<K: InterpolationKernel> KernelInterpolator<K>
{
    pub fn new(bbox: BoundingBox, samples: Tensor, kernel: K, config: KernelConfig) -> Result<Self, IPError>
    {
        let npre = output_axes(&bbox, &samples)?;
        let samples = match config.mode
        {
            KernelMode::Spline => kernel.prefilter(&samples, npre, &config)?,
            _ => samples,
        };
        Ok(Self { bbox, output_shape: samples.shape()[..npre].to_vec(), npre, samples, kernel, config })
    }

    pub fn config(&self) -> &KernelConfig
    {
        &self.config
    }

    /// Map box coordinates to sample index coordinates, keeping the layout.
    fn index_coordinates(&self, points: &Tensor) -> Result<Tensor, IPError>
    {
        let npts = point_count(&self.bbox, points)?;
        let grid = &self.samples.shape()[self.npre..];
        let mut coords = points.clone();
        for (d, chunk) in coords.data_mut().chunks_exact_mut(npts.max(1)).enumerate().take(grid.len())
        {
            let scale = (grid[d] - 1) as f64;
            for x in chunk.iter_mut()
            {
                *x = self.bbox.unit_coordinate(*x, d) * scale;
            }
        }
        Ok(coords)
    }
}

impl<K: InterpolationKernel> Interpolator for KernelInterpolator<K>
{
    fn bounding_box(&self) -> &BoundingBox
    {
        &self.bbox
    }

    fn output_shape(&self) -> &[usize]
    {
        &self.output_shape
    }

    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>
    {
        let coords = self.index_coordinates(points)?;
        self.kernel.map_coordinates(&self.samples, self.npre, &coords, &self.config)
    }
}

///
/// Factory for `KernelInterpolator`, carrying the kernel and its configuration.
///
#[derive(Debug, Clone, Default)]
pub struct KernelFactory<K: InterpolationKernel + Clone>
{
    pub kernel: K,
    pub config: KernelConfig,
}

impl<K: InterpolationKernel + Clone> KernelFactory<K>
{
    pub fn new(kernel: K, config: KernelConfig) -> Self
    {
        Self { kernel, config }
    }
}

impl<K: InterpolationKernel + Clone> InterpolatorFactory for KernelFactory<K>
{
    type Interpolator = KernelInterpolator<K>;

    fn construct(&self, bbox: &BoundingBox, samples: Tensor) -> Result<KernelInterpolator<K>, IPError>
    {
        KernelInterpolator::new(bbox.clone(), samples, self.kernel.clone(), self.config)
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Records the coordinates it is asked for and returns their sum.
    #[derive(Default)]
    struct RecordingKernel
    {
        prefilters: AtomicUsize,
    }

    impl InterpolationKernel for RecordingKernel
    {
        fn prefilter(&self, samples: &Tensor, _npre: usize, _config: &KernelConfig) -> Result<Tensor, IPError>
        {
            self.prefilters.fetch_add(1, Ordering::SeqCst);
            Ok(samples.clone())
        }

        fn map_coordinates(&self, _samples: &Tensor, _npre: usize, coords: &Tensor, _config: &KernelConfig) -> Result<Tensor, IPError>
        {
            let ndim = coords.shape()[0];
            let npts = coords.len() / ndim;
            let data = (0..npts).map(|p| (0..ndim).map(|d| coords.data()[d * npts + p]).sum()).collect();
            Tensor::new(coords.shape()[1..].to_vec(), data)
        }
    }

    #[test]
    fn points_are_rescaled_to_indices()
    {
        let bbox = BoundingBox::new(&[0.0, 10.0], &[2.0, 20.0]);
        let ip = KernelInterpolator::new(bbox, Tensor::zeros(vec![5, 3]), RecordingKernel::default(), KernelConfig::default()).unwrap();
        assert_eq!(ip.kernel.prefilters.load(Ordering::SeqCst), 1);
        // x = 1 -> index 2 of 0..4, y = 20 -> index 2 of 0..2
        assert_eq!(ip.evaluate_point(&[1.0, 20.0]).unwrap(), vec![4.0]);
        assert_eq!(ip.evaluate_point(&[0.0, 15.0]).unwrap(), vec![1.0]);
        assert_eq!(ip.evaluate_point(&[1.0]), Err(IPError::ShapeMismatch));
    }

    #[test]
    fn prefilter_only_in_spline_mode()
    {
        let bbox = BoundingBox::new(&[0.0], &[1.0]);
        let config = KernelConfig { mode: KernelMode::Convolution, ..Default::default() };
        let ip = KernelInterpolator::new(bbox, Tensor::zeros(vec![4]), RecordingKernel::default(), config).unwrap();
        assert_eq!(ip.kernel.prefilters.load(Ordering::SeqCst), 0);
        assert_eq!(ip.config().mode, KernelMode::Convolution);
    }
}
