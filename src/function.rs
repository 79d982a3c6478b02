use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{errors::IPError, storage::tensor::Tensor};

///
/// The expensive function being approximated. Takes points of shape
/// `(ndim, *point_shape)` and returns values of shape `(*output_shape, *point_shape)`.
///
/// Must be deterministic and defined everywhere inside the box; non-finite
/// outputs abort a build. Errors are reserved for malformed output.
///
pub trait TargetFunction
{
    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>;
}

impl<F: Fn(&Tensor) -> Result<Tensor, IPError>> TargetFunction for F
{
    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>
    {
        self(points)
    }
}

/// Copy point `p` of a `(ndim, npts)` buffer into `x`.
#[inline]
fn gather(points: &[f64], npts: usize, p: usize, x: &mut [f64])
{
    for (d, xd) in x.iter_mut().enumerate()
    {
        *xd = points[d * npts + p];
    }
}

///
/// Adapts a per-point closure `f(x) -> [y_0, ..., y_{m-1}]` with a fixed number of
/// outputs. Points are evaluated serially. A closure returning the wrong number of
/// values is reported as `ShapeMismatch`.
///
pub struct Pointwise<F: Fn(&[f64]) -> Vec<f64>>
{
    pub num_outputs: usize,
    pub fun: F,
}

impl<F: Fn(&[f64]) -> Vec<f64>> Pointwise<F>
{
    pub fn new(num_outputs: usize, fun: F) -> Self
    {
        Self { num_outputs, fun }
    }
}

/// Assemble per-point outputs into `(num_outputs, *point_shape)`.
fn assemble(points: &Tensor, num_outputs: usize, rows: Vec<Vec<f64>>) -> Result<Tensor, IPError>
{
    let npts = rows.len();
    let mut shape = vec![num_outputs];
    shape.extend(&points.shape()[1..]);
    if rows.iter().any(|row| row.len() != num_outputs)
    {
        return Err(IPError::ShapeMismatch);
    }
    let mut data = vec![0.0; num_outputs * npts];
    for (p, row) in rows.iter().enumerate()
    {
        for (c, &v) in row.iter().enumerate()
        {
            data[c * npts + p] = v;
        }
    }
    Tensor::new(shape, data)
}

impl<F: Fn(&[f64]) -> Vec<f64>> TargetFunction for Pointwise<F>
{
    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>
    {
        let ndim = points.shape().first().copied().unwrap_or(0);
        let npts = if ndim == 0 { 0 } else { points.len() / ndim };
        let mut x = vec![0.0; ndim];
        let rows = (0..npts).map(|p|
        {
            gather(points.data(), npts, p, &mut x);
            (self.fun)(&x)
        }).collect();
        assemble(points, self.num_outputs, rows)
    }
}

///
/// Same as `Pointwise`, but evaluates points in parallel on the rayon thread pool.
///
pub struct ParallelPointwise<F: Fn(&[f64]) -> Vec<f64> + Send + Sync>
{
    pub num_outputs: usize,
    pub fun: F,
}

impl<F: Fn(&[f64]) -> Vec<f64> + Send + Sync> ParallelPointwise<F>
{
    pub fn new(num_outputs: usize, fun: F) -> Self
    {
        Self { num_outputs, fun }
    }
}

impl<F: Fn(&[f64]) -> Vec<f64> + Send + Sync> TargetFunction for ParallelPointwise<F>
{
    fn evaluate(&self, points: &Tensor) -> Result<Tensor, IPError>
    {
        let ndim = points.shape().first().copied().unwrap_or(0);
        let npts = if ndim == 0 { 0 } else { points.len() / ndim };
        let rows = (0..npts).into_par_iter().map_init(|| vec![0.0; ndim], |x, p|
        {
            gather(points.data(), npts, p, x);
            (self.fun)(x)
        }).collect();
        assemble(points, self.num_outputs, rows)
    }
}

#[test]
fn pointwise_layout()
{
    let f = Pointwise::new(2, |x: &[f64]| vec![x[0] + x[1], x[0] * x[1]]);
    let points = Tensor::from_points(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
    let values = f.evaluate(&points).unwrap();
    assert_eq!(values.shape(), &[2, 3]);
    assert_eq!(values.data(), &[3.0, 7.0, 11.0, 2.0, 12.0, 30.0]);
}

#[test]
fn parallel_matches_serial()
{
    let fun = |x: &[f64]| vec![(x[0] * 2.0).sin() + x[1].cos()];
    let points = Tensor::new(vec![2, 4, 5], (0..40).map(|i| i as f64 * 0.1).collect()).unwrap();
    let serial = Pointwise::new(1, fun).evaluate(&points).unwrap();
    let parallel = ParallelPointwise::new(1, fun).evaluate(&points).unwrap();
    assert_eq!(serial.shape(), &[1, 4, 5]);
    assert_eq!(serial, parallel);
}

#[test]
fn wrong_output_count_is_visible()
{
    let f = Pointwise::new(2, |x: &[f64]| vec![x[0]]);
    let points = Tensor::from_points(&[vec![1.0], vec![2.0]]).unwrap();
    assert_eq!(f.evaluate(&points), Err(IPError::ShapeMismatch));
}
