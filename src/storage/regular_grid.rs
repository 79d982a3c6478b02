use serde::{Deserialize, Serialize};

use crate::{errors::IPError, storage::{bounding_box::BoundingBox, tensor::{unravel_index, Tensor}}};

///
/// Regular mesh over a bounding box: `n[d]` evenly spaced samples along axis `d`,
/// endpoints included.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularGrid
{
    bbox: BoundingBox,
    n: Vec<usize>,
}

impl RegularGrid
{
    pub fn new(bbox: BoundingBox, n: Vec<usize>) -> Result<Self, IPError>
    {
        bbox.validate()?;
        if n.len() != bbox.ndim() || n.iter().any(|&count| count < 2)
        {
            return Err(IPError::ShapeMismatch);
        }
        Ok(Self { bbox, n })
    }

    /// Grid with `resolution` points along every axis.
    pub fn uniform(bbox: BoundingBox, resolution: usize) -> Result<Self, IPError>
    {
        let n = vec![resolution; bbox.ndim()];
        Self::new(bbox, n)
    }

    pub fn bounding_box(&self) -> &BoundingBox
    {
        &self.bbox
    }

    pub fn ndim(&self) -> usize
    {
        self.n.len()
    }

    /// Number of samples along each axis.
    pub fn resolution(&self) -> &[usize]
    {
        &self.n
    }

    /// Total number of mesh points.
    pub fn len(&self) -> usize
    {
        self.n.iter().product()
    }

    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }

    ///
    /// Copy of this grid with the resolution along `axis` doubled (`n <- 2n + 1`).
    ///
    pub fn refined(&self, axis: usize) -> Self
    {
        let mut n = self.n.clone();
        n[axis] = 2 * n[axis] + 1;
        Self { bbox: self.bbox.clone(), n }
    }

    /// Coordinate of sample `index` along `axis`.
    #[inline]
    pub fn coordinate(&self, axis: usize, index: usize) -> f64
    {
        let last = self.n[axis] - 1;
        if index == last
        {
            self.bbox.upper[axis]
        }
        else
        {
            self.bbox.real_coordinate(index as f64 / last as f64, axis)
        }
    }

    ///
    /// All mesh points as a `(ndim, n[0], ..., n[k-1])` tensor.
    ///
    pub fn points(&self) -> Tensor
    {
        let ndim = self.ndim();
        let len = self.len();
        let mut data = vec![0.0; ndim * len];
        let mut index = vec![0; ndim];
        for flat in 0..len
        {
            unravel_index(flat, &self.n, &mut index);
            for axis in 0..ndim
            {
                data[axis * len + flat] = self.coordinate(axis, index[axis]);
            }
        }
        let mut shape = Vec::with_capacity(ndim + 1);
        shape.push(ndim);
        shape.extend(&self.n);
        Tensor { shape, data }
    }
}

#[test]
fn check_grid_points()
{
    let grid = RegularGrid::new(BoundingBox::new(&[0.0, 1.0], &[1.0, 3.0]), vec![3, 2]).unwrap();
    let points = grid.points();
    assert_eq!(points.shape(), &[2, 3, 2]);
    assert_eq!(grid.len(), 6);
    // x varies along the first grid axis, y along the second
    assert_eq!(points.get(&[0, 1, 0]), 0.5);
    assert_eq!(points.get(&[0, 2, 1]), 1.0);
    assert_eq!(points.get(&[1, 0, 0]), 1.0);
    assert_eq!(points.get(&[1, 2, 1]), 3.0);
}

#[test]
fn check_refinement_rule()
{
    let grid = RegularGrid::uniform(BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]), 4).unwrap();
    let refined = grid.refined(1);
    assert_eq!(refined.resolution(), &[4, 9]);
    assert_eq!(refined.refined(1).resolution(), &[4, 19]);
    assert_eq!(grid.resolution(), &[4, 4]);
    assert_eq!(refined.coordinate(1, 8), 1.0);
}

#[test]
fn check_invalid_grid()
{
    let bbox = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
    assert_eq!(RegularGrid::new(bbox.clone(), vec![4]), Err(IPError::ShapeMismatch));
    assert_eq!(RegularGrid::new(bbox, vec![4, 1]), Err(IPError::ShapeMismatch));
}
