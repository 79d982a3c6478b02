use crate::{errors::IPError, storage::tensor::{strides, Tensor}};

use super::kernel::{BorderMode, InterpolationKernel, KernelConfig, KernelMode};

///
/// Low-order kernel: nearest-sample (order 0) and multilinear (order 1)
/// convolution with configurable border handling. For these orders spline
/// interpolation coincides with convolution, so `Spline` mode is served too and
/// prefiltering is the identity. Higher orders and Lanczos kernels are left to
/// external kernels and report `UnsupportedKernel`.
///
#[derive(Default, Debug, Clone, Copy)]
pub struct ConvolutionKernel;

impl ConvolutionKernel
{
    fn check(config: &KernelConfig) -> Result<(), IPError>
    {
        match config.mode
        {
            KernelMode::Lanczos => Err(IPError::UnsupportedKernel),
            _ if config.order > 1 => Err(IPError::UnsupportedKernel),
            _ => Ok(()),
        }
    }
}

///
/// Map a possibly out-of-range sample index onto the grid. `None` means the tap
/// contributes nothing (zero border).
///
pub fn resolve_index(i: i64, n: usize, border: BorderMode) -> Option<usize>
{
    let n = n as i64;
    let resolved = match border
    {
        BorderMode::Zero => if (0..n).contains(&i) { i } else { return None },
        BorderMode::Nearest => i.clamp(0, n - 1),
        BorderMode::Cyclic => i.rem_euclid(n),
        BorderMode::Mirror =>
        {
            let m = i.rem_euclid(2 * n);
            if m < n { m } else { 2 * n - 1 - m }
        }
    };
    Some(resolved as usize)
}

impl InterpolationKernel for ConvolutionKernel
{
    fn prefilter(&self, samples: &Tensor, _npre: usize, config: &KernelConfig) -> Result<Tensor, IPError>
    {
        Self::check(config)?;
        Ok(samples.clone())
    }

    fn map_coordinates(&self, samples: &Tensor, npre: usize, coords: &Tensor, config: &KernelConfig) -> Result<Tensor, IPError>
    {
        Self::check(config)?;
        if npre > samples.ndim() || coords.ndim() == 0 || coords.shape()[0] != samples.ndim() - npre
        {
            return Err(IPError::ShapeMismatch);
        }
        let grid = &samples.shape()[npre..];
        let k = grid.len();
        let grid_strides = strides(grid);
        let grid_len: usize = grid.iter().product();
        let channels: usize = samples.shape()[..npre].iter().product();
        let npts = if k == 0 { 0 } else { coords.len() / k };
        let ntaps = config.order + 1;
        let data = samples.data();

        let mut out = vec![0.0; channels * npts];
        let mut taps = vec![(None, 0.0); k * ntaps];
        for p in 0..npts
        {
            for d in 0..k
            {
                let x = coords.data()[d * npts + p];
                let axis_taps = &mut taps[d * ntaps..(d + 1) * ntaps];
                if config.order == 0
                {
                    axis_taps[0] = (resolve_index((x + 0.5).floor() as i64, grid[d], config.border), 1.0);
                }
                else
                {
                    let i0 = x.floor();
                    let f = x - i0;
                    axis_taps[0] = (resolve_index(i0 as i64, grid[d], config.border), 1.0 - f);
                    axis_taps[1] = (resolve_index(i0 as i64 + 1, grid[d], config.border), f);
                }
            }
            // every combination of one tap per axis
            'combination: for comb in 0..ntaps.pow(k as u32)
            {
                let mut rest = comb;
                let mut weight = 1.0;
                let mut offset = 0;
                for d in (0..k).rev()
                {
                    let (index, w) = taps[d * ntaps + rest % ntaps];
                    rest /= ntaps;
                    match index
                    {
                        Some(i) => offset += i * grid_strides[d],
                        None => continue 'combination,
                    }
                    weight *= w;
                }
                for c in 0..channels
                {
                    out[c * npts + p] += weight * data[c * grid_len + offset];
                }
            }
        }
        let mut shape = samples.shape()[..npre].to_vec();
        shape.extend(&coords.shape()[1..]);
        Tensor::new(shape, out)
    }
}

#[test]
fn check_border_modes()
{
    assert_eq!(resolve_index(-1, 4, BorderMode::Zero), None);
    assert_eq!(resolve_index(4, 4, BorderMode::Zero), None);
    assert_eq!(resolve_index(2, 4, BorderMode::Zero), Some(2));
    assert_eq!(resolve_index(-3, 4, BorderMode::Nearest), Some(0));
    assert_eq!(resolve_index(9, 4, BorderMode::Nearest), Some(3));
    assert_eq!(resolve_index(-1, 4, BorderMode::Cyclic), Some(3));
    assert_eq!(resolve_index(5, 4, BorderMode::Cyclic), Some(1));
    assert_eq!(resolve_index(-1, 4, BorderMode::Mirror), Some(0));
    assert_eq!(resolve_index(4, 4, BorderMode::Mirror), Some(3));
    assert_eq!(resolve_index(6, 4, BorderMode::Mirror), Some(1));
}

#[test]
fn linear_and_nearest_orders()
{
    let samples = Tensor::new(vec![4], vec![0.0, 1.0, 4.0, 9.0]).unwrap();
    let coords = Tensor::new(vec![1, 3], vec![0.5, 2.25, 3.0]).unwrap();
    let linear = KernelConfig { mode: KernelMode::Convolution, order: 1, border: BorderMode::Nearest };
    let out = ConvolutionKernel.map_coordinates(&samples, 0, &coords, &linear).unwrap();
    assert_eq!(out.shape(), &[3]);
    assert_eq!(out.data(), &[0.5, 5.25, 9.0]);

    let nearest = KernelConfig { order: 0, ..linear };
    let out = ConvolutionKernel.map_coordinates(&samples, 0, &coords, &nearest).unwrap();
    assert_eq!(out.data(), &[1.0, 4.0, 9.0]);
}

#[test]
fn borders_affect_taps_outside_the_grid()
{
    let samples = Tensor::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
    let coords = Tensor::new(vec![1, 1], vec![2.5]).unwrap();
    let config = |border| KernelConfig { mode: KernelMode::Convolution, order: 1, border };
    let eval = |border| ConvolutionKernel.map_coordinates(&samples, 0, &coords, &config(border)).unwrap().data()[0];
    assert_eq!(eval(BorderMode::Zero), 1.5);
    assert_eq!(eval(BorderMode::Nearest), 3.0);
    assert_eq!(eval(BorderMode::Cyclic), 2.0);
    assert_eq!(eval(BorderMode::Mirror), 3.0);
}

#[test]
fn bilinear_with_channels()
{
    // channels: x + y and 2xy on the integer lattice {0,1} x {0,1,2}
    let samples = Tensor::new(vec![2, 2, 3], vec![0.0, 1.0, 2.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0]).unwrap();
    let coords = Tensor::new(vec![2, 1], vec![0.5, 1.5]).unwrap();
    let config = KernelConfig { mode: KernelMode::Spline, order: 1, border: BorderMode::Nearest };
    let out = ConvolutionKernel.map_coordinates(&samples, 1, &coords, &config).unwrap();
    assert_eq!(out.shape(), &[2, 1]);
    assert!((out.data()[0] - 2.0).abs() < 1e-12);
    assert!((out.data()[1] - 1.5).abs() < 1e-12);
}

#[test]
fn unsupported_configurations()
{
    let samples = Tensor::zeros(vec![4]);
    let coords = Tensor::zeros(vec![1, 1]);
    let cubic = KernelConfig::default();
    assert_eq!(ConvolutionKernel.prefilter(&samples, 0, &cubic), Err(IPError::UnsupportedKernel));
    let lanczos = KernelConfig { mode: KernelMode::Lanczos, order: 1, border: BorderMode::Zero };
    assert_eq!(ConvolutionKernel.map_coordinates(&samples, 0, &coords, &lanczos), Err(IPError::UnsupportedKernel));
    let linear = KernelConfig { order: 1, ..Default::default() };
    assert_eq!(ConvolutionKernel.map_coordinates(&samples, 0, &Tensor::zeros(vec![2, 1]), &linear), Err(IPError::ShapeMismatch));
}
