use crate::{errors::IPError, storage::{bounding_box::BoundingBox, tensor::{strides, Tensor}}};

use super::{evaluate_by_cell, output_axes, Interpolator};

///
/// Multilinear interpolation reconstructed from the forward-difference corner
/// tensor: inside each cell the value is
/// `sum_c corner[c] * prod_axis offset[axis]^bit(c, axis)` over the `2^k`
/// value/difference combinations.
///
#[derive(Debug, Clone)]
pub struct MultilinearInterpolator
{
    bbox: BoundingBox,
    output_shape: Vec<usize>,
    cells: Vec<usize>,
    cell_strides: Vec<usize>,
    /// `(2,)^k ++ output_shape ++ cells`
    corners: Tensor,
}

impl MultilinearInterpolator
{
    pub fn new(bbox: BoundingBox, samples: Tensor) -> Result<Self, IPError>
    {
        let npre = output_axes(&bbox, &samples)?;
        let corners = samples.corner_tensor(npre)?;
        let cells: Vec<usize> = samples.shape()[npre..].iter().map(|&n| n - 1).collect();
        Ok(Self
        {
            bbox,
            output_shape: samples.shape()[..npre].to_vec(),
            cell_strides: strides(&cells),
            cells,
            corners,
        })
    }

    /// Number of cells along each axis.
    pub fn cells(&self) -> &[usize]
    {
        &self.cells
    }
}

impl Interpolator for MultilinearInterpolator
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
        let k = self.cells.len();
        let cell_len: usize = self.cells.iter().product();
        let channels: usize = self.output_shape.iter().product();
        let block = channels * cell_len;
        let corners = self.corners.data();
        evaluate_by_cell(&self.bbox, &self.cells, &self.output_shape, points, |index, offset, out|
        {
            let cell: usize = index.iter().zip(&self.cell_strides).map(|(&i, &s)| i * s).sum();
            for comb in 0..(1_usize << k)
            {
                let mut weight = 1.0;
                for (d, &f) in offset.iter().enumerate()
                {
                    if comb & (1 << (k - 1 - d)) != 0
                    {
                        weight *= f;
                    }
                }
                let base = comb * block + cell;
                for (c, value) in out.iter_mut().enumerate()
                {
                    *value += corners[base + c * cell_len] * weight;
                }
            }
        })
    }
}

#[cfg(test)]
fn sample<F: Fn(f64, f64) -> f64>(f: F, n: [usize; 2], bbox: &BoundingBox) -> Tensor
{
    use crate::storage::regular_grid::RegularGrid;
    let grid = RegularGrid::new(bbox.clone(), n.to_vec()).unwrap();
    let points = grid.points();
    let len = grid.len();
    let data = (0..len).map(|i| f(points.data()[i], points.data()[len + i])).collect();
    Tensor::new(n.to_vec(), data).unwrap()
}

#[test]
fn reproduces_multilinear_function()
{
    let bbox = BoundingBox::new(&[-1.0, 2.0], &[3.0, 5.0]);
    let f = |x: f64, y: f64| 0.5 - 2.0 * x + 3.0 * y + 1.5 * x * y;
    let ip = MultilinearInterpolator::new(bbox.clone(), sample(f, [4, 5], &bbox)).unwrap();
    assert_eq!(ip.cells(), &[3, 4]);
    let queries = [[-1.0, 2.0], [0.123, 4.321], [2.99, 2.01], [1.7, 3.3], [3.0, 5.0]];
    for q in queries
    {
        let value = ip.evaluate_point(&q).unwrap()[0];
        assert!((value - f(q[0], q[1])).abs() < 1e-12, "{q:?}: {value}");
    }
}

#[test]
fn batch_shape_and_idempotence()
{
    let bbox = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
    let ip = MultilinearInterpolator::new(bbox.clone(), sample(|x, y| (x * 3.0).sin() * y, [6, 6], &bbox)).unwrap();
    let points = Tensor::new(vec![2, 2, 3], vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4]).unwrap();
    let first = ip.evaluate(&points).unwrap();
    let second = ip.evaluate(&points).unwrap();
    assert_eq!(first.shape(), &[2, 3]);
    assert_eq!(first, second);
}

#[test]
fn upper_edge_uses_last_cell()
{
    let bbox = BoundingBox::new(&[0.0], &[1.0]);
    let samples = Tensor::new(vec![4], vec![0.0, 1.0, 5.0, 2.0]).unwrap();
    let ip = MultilinearInterpolator::new(bbox, samples).unwrap();
    assert!((ip.evaluate_point(&[1.0]).unwrap()[0] - 2.0).abs() < 1e-12);
    // beyond the box the last cell is extended linearly
    assert!((ip.evaluate_point(&[4.0 / 3.0]).unwrap()[0] + 1.0).abs() < 1e-12);
}

#[test]
fn multiple_outputs()
{
    let bbox = BoundingBox::new(&[0.0], &[2.0]);
    // outputs (x, 10 - x) at x = 0, 1, 2
    let samples = Tensor::new(vec![2, 3], vec![0.0, 1.0, 2.0, 10.0, 9.0, 8.0]).unwrap();
    let ip = MultilinearInterpolator::new(bbox, samples).unwrap();
    assert_eq!(ip.output_shape(), &[2]);
    let out = ip.evaluate_point(&[1.5]).unwrap();
    assert!((out[0] - 1.5).abs() < 1e-12);
    assert!((out[1] - 8.5).abs() < 1e-12);
}

#[test]
fn wrong_point_dimension()
{
    let bbox = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
    let ip = MultilinearInterpolator::new(bbox.clone(), sample(|x, y| x + y, [3, 3], &bbox)).unwrap();
    assert_eq!(ip.evaluate_point(&[0.5]), Err(IPError::ShapeMismatch));
}
