use serde::{Deserialize, Serialize};

use crate::algorithms::statistics::channel_range;

///
/// Per-channel range of the sampled outputs. Lower and upper bounds are tracked
/// independently; an untouched channel has `lower = +inf`, `upper = -inf`.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBox
{
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl OutputBox
{
    pub fn new(channels: usize) -> Self
    {
        Self { lower: vec![f64::INFINITY; channels], upper: vec![f64::NEG_INFINITY; channels] }
    }

    pub fn channels(&self) -> usize
    {
        self.lower.len()
    }

    /// True until every channel has seen at least one value.
    pub fn is_empty(&self) -> bool
    {
        self.lower.iter().zip(&self.upper).any(|(lo, hi)| lo > hi)
    }

    ///
    /// Grow the box to cover `values`, a channel-major buffer `(channels, points)`.
    ///
    pub fn widen(&mut self, values: &[f64])
    {
        for (c, (lo, hi)) in channel_range(values, self.channels()).into_iter().enumerate()
        {
            self.lower[c] = self.lower[c].min(lo);
            self.upper[c] = self.upper[c].max(hi);
        }
    }

    pub fn contains(&self, value: &[f64]) -> bool
    {
        value.len() == self.channels()
            && value.iter().enumerate().all(|(c, &v)| self.lower[c] <= v && v <= self.upper[c])
    }
}

#[test]
fn widen_tracks_each_side()
{
    let mut obox = OutputBox::new(2);
    assert!(obox.is_empty());
    obox.widen(&[1.0, 3.0, -5.0, -4.0]);
    assert_eq!(obox.lower, vec![1.0, -5.0]);
    assert_eq!(obox.upper, vec![3.0, -4.0]);
    // only the upper bound of channel 0 and the lower bound of channel 1 move
    obox.widen(&[2.0, 7.0, -9.0, -6.0]);
    assert_eq!(obox.lower, vec![1.0, -9.0]);
    assert_eq!(obox.upper, vec![7.0, -4.0]);
    assert!(!obox.is_empty());
    assert!(obox.contains(&[5.0, -8.0]));
    assert!(!obox.contains(&[0.0, -8.0]));
    assert!(!obox.contains(&[5.0]));
}
