use serde::{Deserialize, Serialize};

use crate::errors::IPError;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox
{
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoundingBox
{
    pub fn new(lower: &[f64], upper: &[f64]) -> Self
    {
        Self { lower: lower.to_owned(), upper: upper.to_owned() }
    }

    ///
    /// Build from a `2 x ndim` array: the first row holds the lower bounds,
    /// the second the upper bounds.
    ///
    pub fn from_rows(rows: [&[f64]; 2]) -> Result<Self, IPError>
    {
        let bbox = Self::new(rows[0], rows[1]);
        bbox.validate()?;
        Ok(bbox)
    }

    ///
    /// Check that both bounds have the same (non-zero) length, are finite
    /// and that `lower[d] < upper[d]` on every axis.
    ///
    pub fn validate(&self) -> Result<(), IPError>
    {
        if self.lower.is_empty() || self.lower.len() != self.upper.len()
        {
            return Err(IPError::InvalidBoundingBox);
        }
        let ordered = self.lower.iter().zip(&self.upper).all(|(&lo, &hi)|
        {
            lo.is_finite() && hi.is_finite() && lo < hi
        });
        if ordered { Ok(()) } else { Err(IPError::InvalidBoundingBox) }
    }

    #[inline]
    pub fn ndim(&self) -> usize
    {
        self.lower.len()
    }

    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.upper[dim] - self.lower[dim]
    }

    ///
    /// Volume of hypercube (width(dim1)*...*width(dim_n))
    ///
    pub fn volume(&self) -> f64
    {
        (0..self.ndim()).map(|d| self.width(d)).product()
    }

    #[inline]
    pub fn unit_coordinate(&self, x: f64, dim: usize) -> f64
    {
        (x - self.lower[dim]) / self.width(dim)
    }

    #[inline]
    pub fn real_coordinate(&self, x: f64, dim: usize) -> f64
    {
        self.lower[dim] + self.width(dim) * x
    }

    pub fn contains(&self, point: &[f64]) -> bool
    {
        point.len() == self.ndim() && point.iter().enumerate().all(|(d, &x)|
        {
            self.lower[d] <= x && x <= self.upper[d]
        })
    }
}

#[test]
fn check_validation()
{
    assert!(BoundingBox::new(&[0.0, -1.0], &[1.0, 1.0]).validate().is_ok());
    assert_eq!(BoundingBox::new(&[0.0], &[0.0]).validate(), Err(IPError::InvalidBoundingBox));
    assert_eq!(BoundingBox::new(&[1.0], &[0.0]).validate(), Err(IPError::InvalidBoundingBox));
    assert_eq!(BoundingBox::new(&[0.0, 0.0], &[1.0]).validate(), Err(IPError::InvalidBoundingBox));
    assert_eq!(BoundingBox::new(&[], &[]).validate(), Err(IPError::InvalidBoundingBox));
    assert_eq!(BoundingBox::new(&[f64::NAN], &[1.0]).validate(), Err(IPError::InvalidBoundingBox));
}

#[test]
fn check_coordinates()
{
    let bbox = BoundingBox::from_rows([&[0.0, 2.0], &[4.0, 3.0]]).unwrap();
    assert_eq!(bbox.volume(), 4.0);
    assert_eq!(bbox.unit_coordinate(1.0, 0), 0.25);
    assert_eq!(bbox.real_coordinate(0.5, 1), 2.5);
    assert!(bbox.contains(&[4.0, 2.0]));
    assert!(!bbox.contains(&[4.1, 2.0]));
    assert!(!bbox.contains(&[1.0]));
}
