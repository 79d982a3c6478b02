//!
//! Forward-difference tensors used by the multilinear and gradient interpolators.
//!
//! All functions take a row-major buffer whose shape is split into `npre` leading
//! batch (output) axes followed by `k` spatial axes. Forward differences are not
//! defined at the last sample of a spatial axis, so every result drops that index.
//!
use num_traits::Float;

use crate::{errors::IPError, storage::tensor::{strides, unravel_index}};

fn check_layout(shape: &[usize], npre: usize) -> Result<usize, IPError>
{
    if npre >= shape.len() || shape[npre..].iter().any(|&extent| extent < 2)
    {
        return Err(IPError::ShapeMismatch);
    }
    Ok(shape.len() - npre)
}

/// Shape with the last index of every spatial axis dropped.
fn trimmed_shape(shape: &[usize], npre: usize) -> Vec<usize>
{
    shape.iter().enumerate().map(|(i, &extent)| if i < npre { extent } else { extent - 1 }).collect()
}

///
/// Copy `blocks` consecutive arrays of shape `shape` out of `values`, keeping only
/// the leading `extent - 1` indices along each spatial axis.
///
fn trim_blocks<T: Float>(values: &[T], shape: &[usize], npre: usize, blocks: usize) -> Vec<T>
{
    let block_len: usize = shape.iter().product();
    let source_strides = strides(shape);
    let trimmed = trimmed_shape(shape, npre);
    let trimmed_len: usize = trimmed.iter().product();
    let mut index = vec![0; shape.len()];
    let mut out = Vec::with_capacity(blocks * trimmed_len);
    for block in 0..blocks
    {
        let source = &values[block * block_len..(block + 1) * block_len];
        for flat in 0..trimmed_len
        {
            unravel_index(flat, &trimmed, &mut index);
            let offset: usize = index.iter().zip(&source_strides).map(|(&i, &s)| i * s).sum();
            out.push(source[offset]);
        }
    }
    out
}

///
/// Drop the last index along every spatial axis. Returns the new shape and data.
///
pub fn trim_spatial<T: Float>(values: &[T], shape: &[usize], npre: usize) -> Result<(Vec<usize>, Vec<T>), IPError>
{
    check_layout(shape, npre)?;
    if values.len() != shape.iter().product::<usize>()
    {
        return Err(IPError::ShapeMismatch);
    }
    Ok((trimmed_shape(shape, npre), trim_blocks(values, shape, npre, 1)))
}

///
/// Compute every combination of value (0) and forward difference (1) along the
/// spatial axes, returning an array of shape `(2,)*k ++ shape[..npre] ++ (n-1,)*k`.
///
/// Combinations are indexed row-major over `(2,)*k`, so spatial axis 0 is the most
/// significant bit. Summing `corner[c] * prod(offset[axis]^bit(c, axis))` over all
/// combinations reproduces multilinear interpolation inside each cell.
///
pub fn lin_derivs_forward<T: Float>(values: &[T], shape: &[usize], npre: usize) -> Result<(Vec<usize>, Vec<T>), IPError>
{
    let k = check_layout(shape, npre)?;
    let block_len: usize = shape.iter().product();
    if values.len() != block_len
    {
        return Err(IPError::ShapeMismatch);
    }
    let ncomb = 1_usize << k;
    let shape_strides = strides(shape);
    let mut ys = vec![T::zero(); ncomb * block_len];
    ys[..block_len].copy_from_slice(values);

    for axis in 0..k
    {
        let bit = 1_usize << (k - 1 - axis);
        let stride = shape_strides[npre + axis];
        let extent = shape[npre + axis];
        // sources are the combinations with this axis and every later axis still at 0
        for comb in (0..ncomb).filter(|&c| c & (2 * bit - 1) == 0)
        {
            let source = comb * block_len;
            let target = (comb | bit) * block_len;
            for flat in 0..block_len
            {
                if (flat / stride) % extent + 1 == extent
                {
                    continue;
                }
                ys[target + flat] = ys[source + flat + stride] - ys[source + flat];
            }
        }
    }

    let mut out_shape = vec![2; k];
    out_shape.extend(trimmed_shape(shape, npre));
    Ok((out_shape, trim_blocks(&ys, shape, npre, ncomb)))
}

///
/// Forward-difference gradient along each spatial axis independently (no mixed
/// terms), returning an array of shape `(k,) ++ shape[..npre] ++ (n-1,)*k`.
///
pub fn grad_forward<T: Float>(values: &[T], shape: &[usize], npre: usize) -> Result<(Vec<usize>, Vec<T>), IPError>
{
    let k = check_layout(shape, npre)?;
    let block_len: usize = shape.iter().product();
    if values.len() != block_len
    {
        return Err(IPError::ShapeMismatch);
    }
    let shape_strides = strides(shape);
    let mut dy = vec![T::zero(); k * block_len];
    for axis in 0..k
    {
        let stride = shape_strides[npre + axis];
        let extent = shape[npre + axis];
        let target = &mut dy[axis * block_len..(axis + 1) * block_len];
        for flat in 0..block_len
        {
            if (flat / stride) % extent + 1 == extent
            {
                continue;
            }
            target[flat] = values[flat + stride] - values[flat];
        }
    }
    let mut out_shape = vec![k];
    out_shape.extend(trimmed_shape(shape, npre));
    Ok((out_shape, trim_blocks(&dy, shape, npre, k)))
}

#[test]
fn ramp_gives_grid_spacing()
{
    // f(x) = x sampled at 5 points on [0, 1]
    let values: Vec<f64> = (0..5).map(|i| i as f64 / 4.0).collect();
    let (shape, ys) = lin_derivs_forward(&values, &[5], 0).unwrap();
    assert_eq!(shape, vec![2, 4]);
    assert_eq!(&ys[..4], &[0.0, 0.25, 0.5, 0.75]);
    assert!(ys[4..].iter().all(|&d| (d - 0.25).abs() < 1e-15));
}

#[test]
fn constant_has_no_differences()
{
    let values = vec![3.0_f64; 4 * 3];
    let (shape, ys) = lin_derivs_forward(&values, &[4, 3], 0).unwrap();
    assert_eq!(shape, vec![2, 2, 3, 2]);
    let block = 3 * 2;
    assert!(ys[..block].iter().all(|&v| v == 3.0));
    assert!(ys[block..].iter().all(|&v| v == 0.0));
}

#[test]
fn bilinear_corner_terms()
{
    // f(x, y) = 1 + 2x + 3y + 4xy on the integer lattice {0,1,2} x {0,1}
    let f = |x: f64, y: f64| 1.0 + 2.0 * x + 3.0 * y + 4.0 * x * y;
    let mut values = Vec::new();
    for i in 0..3
    {
        for j in 0..2
        {
            values.push(f(i as f64, j as f64));
        }
    }
    let (shape, ys) = lin_derivs_forward(&values, &[3, 2], 0).unwrap();
    assert_eq!(shape, vec![2, 2, 2, 1]);
    // layout: comb (bx, by) then cell (i, 0)
    let at = |bx: usize, by: usize, i: usize| ys[(bx * 2 + by) * 2 + i];
    assert_eq!(at(0, 0, 1), f(1.0, 0.0));
    assert_eq!(at(1, 0, 1), f(2.0, 0.0) - f(1.0, 0.0));
    assert_eq!(at(0, 1, 1), f(1.0, 1.0) - f(1.0, 0.0));
    assert_eq!(at(1, 1, 0), 4.0);
    assert_eq!(at(1, 1, 1), 4.0);
}

#[test]
fn leading_axes_are_kept()
{
    // two output channels: f0 = x, f1 = -2x
    let values = vec![0.0_f32, 1.0, 2.0, 0.0, -2.0, -4.0];
    let (shape, ys) = lin_derivs_forward(&values, &[2, 3], 1).unwrap();
    assert_eq!(shape, vec![2, 2, 2]);
    assert_eq!(ys, vec![0.0, 1.0, 0.0, -2.0, 1.0, 1.0, -2.0, -2.0]);
}

#[test]
fn gradient_is_per_axis()
{
    let f = |x: f64, y: f64| 1.0 + 2.0 * x + 3.0 * y + 4.0 * x * y;
    let mut values = Vec::new();
    for i in 0..3
    {
        for j in 0..3
        {
            values.push(f(i as f64, j as f64));
        }
    }
    let (shape, dy) = grad_forward(&values, &[3, 3], 0).unwrap();
    assert_eq!(shape, vec![2, 2, 2]);
    // d/dx at (i, j) = 2 + 4j, d/dy at (i, j) = 3 + 4i
    assert_eq!(&dy[..4], &[2.0, 6.0, 2.0, 6.0]);
    assert_eq!(&dy[4..], &[3.0, 3.0, 7.0, 7.0]);
}

#[test]
fn invalid_layouts_are_rejected()
{
    assert_eq!(lin_derivs_forward(&[1.0_f64, 2.0], &[2], 1), Err(IPError::ShapeMismatch));
    assert_eq!(grad_forward(&[1.0_f64], &[1], 0), Err(IPError::ShapeMismatch));
    assert_eq!(trim_spatial(&[1.0_f64, 2.0, 3.0], &[2, 2], 0), Err(IPError::ShapeMismatch));
    let (shape, trimmed) = trim_spatial(&[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], 1).unwrap();
    assert_eq!(shape, vec![2, 2]);
    assert_eq!(trimmed, vec![1.0, 2.0, 4.0, 5.0]);
}
