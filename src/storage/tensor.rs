use serde::{Deserialize, Serialize};

use crate::{algorithms::finite_difference::{grad_forward, lin_derivs_forward, trim_spatial}, errors::IPError};

///
/// Dense, row-major n-dimensional array of `f64`.
///
/// Sample tensors use the layout `(*output_shape, n[0], ..., n[k-1])`, point sets
/// `(ndim, *point_shape)`. A zero-dimensional tensor holds a single value.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tensor
{
    pub(crate) shape: Vec<usize>,
    pub(crate) data: Vec<f64>,
}

impl Tensor
{
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, IPError>
    {
        if shape.iter().product::<usize>() != data.len()
        {
            Err(IPError::ShapeMismatch)
        }
        else
        {
            Ok(Self { shape, data })
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Self
    {
        let len = shape.iter().product();
        Self { shape, data: vec![0.0; len] }
    }

    ///
    /// Gather a list of points into the `(ndim, npoints)` layout expected by
    /// `Interpolator::evaluate`.
    ///
    pub fn from_points(points: &[Vec<f64>]) -> Result<Self, IPError>
    {
        let ndim = points.first().map(|p| p.len()).unwrap_or(0);
        let npts = points.len();
        let mut data = vec![0.0; ndim * npts];
        for (p, point) in points.iter().enumerate()
        {
            if point.len() != ndim
            {
                return Err(IPError::ShapeMismatch);
            }
            for (axis, &x) in point.iter().enumerate()
            {
                data[axis * npts + p] = x;
            }
        }
        Ok(Self { shape: vec![ndim, npts], data })
    }

    #[inline]
    pub fn shape(&self) -> &[usize]
    {
        &self.shape
    }

    #[inline]
    pub fn ndim(&self) -> usize
    {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[f64]
    {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64]
    {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64>
    {
        self.data
    }

    pub fn strides(&self) -> Vec<usize>
    {
        strides(&self.shape)
    }

    /// Value at a full multi-index. Panics if the index is out of bounds.
    pub fn get(&self, index: &[usize]) -> f64
    {
        assert_eq!(index.len(), self.ndim(), "index rank must match tensor rank");
        let offset: usize = index.iter().zip(self.strides()).map(|(&i, s)|
        {
            i * s
        }).sum();
        self.data[offset]
    }

    pub fn is_finite(&self) -> bool
    {
        self.data.iter().all(|v| v.is_finite())
    }

    ///
    /// Forward-difference corner tensor over the trailing spatial axes (everything
    /// after the first `npre` axes). See `algorithms::finite_difference::lin_derivs_forward`.
    ///
    pub fn corner_tensor(&self, npre: usize) -> Result<Tensor, IPError>
    {
        let (shape, data) = lin_derivs_forward(&self.data, &self.shape, npre)?;
        Ok(Self { shape, data })
    }

    ///
    /// Forward-difference gradient along each trailing spatial axis.
    ///
    pub fn gradient_tensor(&self, npre: usize) -> Result<Tensor, IPError>
    {
        let (shape, data) = grad_forward(&self.data, &self.shape, npre)?;
        Ok(Self { shape, data })
    }

    /// Drop the last index along every spatial axis.
    pub fn trim_spatial(&self, npre: usize) -> Result<Tensor, IPError>
    {
        let (shape, data) = trim_spatial(&self.data, &self.shape, npre)?;
        Ok(Self { shape, data })
    }
}

/// Row-major strides for `shape`.
pub fn strides(shape: &[usize]) -> Vec<usize>
{
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev()
    {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Write the multi-index of flat offset `flat` within `shape` into `index`.
#[inline]
pub fn unravel_index(mut flat: usize, shape: &[usize], index: &mut [usize])
{
    for (i, &extent) in shape.iter().enumerate().rev()
    {
        index[i] = flat % extent;
        flat /= extent;
    }
}

#[test]
fn check_strides_and_get()
{
    let tensor = Tensor::new(vec![2, 3, 4], (0..24).map(|v| v as f64).collect()).unwrap();
    assert_eq!(tensor.strides(), vec![12, 4, 1]);
    assert_eq!(tensor.get(&[1, 2, 3]), 23.0);
    assert_eq!(tensor.get(&[0, 1, 0]), 4.0);
    let mut index = [0; 3];
    unravel_index(17, tensor.shape(), &mut index);
    assert_eq!(index, [1, 1, 1]);
}

#[test]
fn check_shape_validation()
{
    assert_eq!(Tensor::new(vec![2, 2], vec![0.0; 3]), Err(IPError::ShapeMismatch));
    let scalar = Tensor::new(vec![], vec![3.0]).unwrap();
    assert_eq!(scalar.len(), 1);
    assert_eq!(scalar.get(&[]), 3.0);
}

#[test]
fn check_from_points_layout()
{
    let points = Tensor::from_points(&[vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]]).unwrap();
    assert_eq!(points.shape(), &[2, 3]);
    assert_eq!(points.data(), &[0.1, 0.3, 0.5, 0.2, 0.4, 0.6]);
    assert!(Tensor::from_points(&[vec![0.1], vec![0.3, 0.4]]).is_err());
}
