use burn::tensor::{Shape, Tensor};
use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use crate::image::Image;
use crate::spatial::Spacing;

/// Separable Gaussian smoothing.
///
/// Sigmas are given in physical units (mm) in `(x, y, z)` order and converted
/// to voxels with the image spacing. Kernels span `±ceil(3σ)` voxels.
/// Borders are zero-extended.
pub struct GaussianFilter<B: Backend> {
    sigmas: [f64; 3],
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> GaussianFilter<B> {
    pub fn new(sigmas: [f64; 3]) -> Self {
        Self {
            sigmas,
            _b: std::marker::PhantomData,
        }
    }

    /// Same sigma along every axis.
    pub fn isotropic(sigma: f64) -> Self {
        Self::new([sigma; 3])
    }

    pub fn apply(&self, image: &Image<B>) -> Image<B> {
        image.with_data(self.apply_tensor(image.data().clone(), image.spacing()))
    }

    /// Smooth a `[Z, Y, X]` tensor sampled with `spacing`.
    pub fn apply_tensor(&self, input: Tensor<B, 3>, spacing: &Spacing<3>) -> Tensor<B, 3> {
        let mut data = input;
        let device = data.device();

        for dim in 0..3 {
            // Tensor dim 0 is z, dim 2 is x.
            let axis = 2 - dim;
            let sigma = self.sigmas[axis];
            if sigma <= 1e-6 || data.dims()[dim] < 2 {
                continue;
            }

            let voxel_sigma = sigma / spacing[axis];
            let radius = (3.0 * voxel_sigma).ceil() as usize;
            let kernel = Self::generate_kernel(voxel_sigma, radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            data = Self::convolve_1d(data, kernel_tensor, dim);
        }
        data
    }

    fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
        let two_sigma2 = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (0..=(2 * radius))
            .map(|i| {
                let x = i as f64 - radius as f64;
                (-x * x / two_sigma2).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|v| (v / sum) as f32).collect()
    }

    fn convolve_1d(input: Tensor<B, 3>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, 3> {
        let dims = input.dims();

        // Move the filtered dimension last.
        let mut permute = [0isize; 3];
        let mut idx = 0;
        for i in 0..3 {
            if i != dim {
                permute[idx] = i as isize;
                idx += 1;
            }
        }
        permute[2] = dim as isize;

        let length = dims[dim];
        let batch: usize = (0..3).filter(|&i| i != dim).map(|i| dims[i]).product();
        let permuted = input.permute(permute);
        let permuted_dims = permuted.dims();

        let kernel_size = kernel.dims()[0];
        let options = ConvOptions::new([1], [kernel_size / 2], [1], 1);
        let output = burn::tensor::module::conv1d(
            permuted.reshape([batch, 1, length]),
            kernel.reshape([1, 1, kernel_size]),
            None,
            options,
        );

        let mut inverse = [0isize; 3];
        for (new_pos, &old_pos) in permute.iter().enumerate() {
            inverse[old_pos as usize] = new_pos as isize;
        }
        output.reshape(Shape::new(permuted_dims)).permute(inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn impulse(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3> {
        let mut data = vec![0.0f32; 9 * 9 * 9];
        data[4 * 81 + 4 * 9 + 4] = 1.0;
        Tensor::from_data(TensorData::new(data, Shape::new([9, 9, 9])), device)
    }

    #[test]
    fn test_gaussian_preserves_mass_inside() {
        let device = Default::default();
        let filter = GaussianFilter::<TestBackend>::isotropic(1.0);
        let out = filter.apply_tensor(impulse(&device), &Spacing::uniform(1.0));
        let total: f32 = out.clone().sum().into_scalar();
        assert!((total - 1.0).abs() < 1e-4);

        let values = out.into_data();
        let values = values.as_slice::<f32>().unwrap();
        let centre = values[4 * 81 + 4 * 9 + 4];
        assert!(centre < 0.2 && centre > 0.0);
    }

    #[test]
    fn test_gaussian_axis_uses_matching_spacing() {
        let device = Default::default();
        // Smooth along x only.
        let filter = GaussianFilter::<TestBackend>::new([1.0, 0.0, 0.0]);
        let out = filter.apply_tensor(impulse(&device), &Spacing::new([1.0, 5.0, 5.0]));
        let values = out.into_data();
        let values = values.as_slice::<f32>().unwrap();

        // Spread along x, nothing along y or z.
        assert!(values[4 * 81 + 4 * 9 + 5] > 0.1);
        assert_eq!(values[4 * 81 + 5 * 9 + 4], 0.0);
        assert_eq!(values[5 * 81 + 4 * 9 + 4], 0.0);
    }

    #[test]
    fn test_gaussian_zero_sigma_is_noop() {
        let device = Default::default();
        let filter = GaussianFilter::<TestBackend>::isotropic(0.0);
        let input = impulse(&device);
        let out = filter.apply_tensor(input.clone(), &Spacing::uniform(1.0));
        assert_eq!(out.into_data(), input.into_data());
    }

    #[test]
    fn test_wide_sigma_is_not_truncated() {
        let device = Default::default();
        let n = 101;
        let mut data = vec![0.0f32; n];
        data[n / 2] = 1.0;
        let line = Tensor::<TestBackend, 3>::from_data(TensorData::new(data, Shape::new([1, 1, n])), &device);

        for sigma in [5.0, 10.0, 15.0] {
            let out = GaussianFilter::<TestBackend>::new([sigma, 0.0, 0.0])
                .apply_tensor(line.clone(), &Spacing::uniform(1.0))
                .into_data();
            let values = out.as_slice::<f32>().unwrap();

            let total: f64 = values.iter().map(|&v| v as f64).sum();
            let variance: f64 = values
                .iter()
                .enumerate()
                .map(|(i, &v)| v as f64 * (i as f64 - (n / 2) as f64).powi(2))
                .sum::<f64>()
                / total;
            // A ±3σ truncated Gaussian keeps about 97% of the variance.
            let effective = variance.sqrt();
            assert!((effective - sigma).abs() < 0.03 * sigma, "sigma {sigma}: effective {effective}");
            assert!((total - 1.0).abs() < 1e-4);
        }
    }
}
