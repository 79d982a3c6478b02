use crate::errors::IPError;

///
/// Population standard deviation of `truth - predicted` for every output channel.
///
/// Both buffers use the channel-major layout `(channels, points)`.
///
pub fn residual_std(truth: &[f64], predicted: &[f64], channels: usize) -> Result<Vec<f64>, IPError>
{
    if truth.len() != predicted.len() || channels == 0 || truth.len() % channels != 0
    {
        return Err(IPError::ShapeMismatch);
    }
    let npts = truth.len() / channels;
    if npts == 0
    {
        return Ok(vec![0.0; channels]);
    }
    let std = truth.chunks_exact(npts).zip(predicted.chunks_exact(npts)).map(|(t, p)|
    {
        let mean = t.iter().zip(p).map(|(a, b)| a - b).sum::<f64>() / npts as f64;
        let var = t.iter().zip(p).map(|(a, b)|
        {
            let r = a - b - mean;
            r * r
        }).sum::<f64>() / npts as f64;
        var.sqrt()
    }).collect();
    Ok(std)
}

///
/// Per-channel (min, max) of a channel-major buffer.
///
pub fn channel_range(values: &[f64], channels: usize) -> Vec<(f64, f64)>
{
    let npts = values.len() / channels.max(1);
    if npts == 0
    {
        return vec![(f64::INFINITY, f64::NEG_INFINITY); channels];
    }
    values.chunks_exact(npts).map(|chunk|
    {
        chunk.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }).collect()
}

#[test]
fn constant_offset_has_zero_spread()
{
    let truth = [1.0, 2.0, 3.0, 10.0, 10.0, 10.0];
    let predicted = [0.0, 1.0, 2.0, 9.0, 11.0, 10.0];
    let std = residual_std(&truth, &predicted, 2).unwrap();
    assert!(std[0].abs() < 1e-15);
    assert!((std[1] - (2.0_f64 / 3.0).sqrt()).abs() < 1e-15);
}

#[test]
fn mismatched_lengths()
{
    assert_eq!(residual_std(&[1.0, 2.0], &[1.0], 1), Err(IPError::ShapeMismatch));
    assert_eq!(residual_std(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 2), Err(IPError::ShapeMismatch));
}

#[test]
fn check_channel_range()
{
    let range = channel_range(&[3.0, -1.0, 2.0, 5.0, 7.0, 6.0], 2);
    assert_eq!(range, vec![(-1.0, 3.0), (5.0, 7.0)]);
}
