//! Trilinear interpolation.

use burn::tensor::{Bool, Int, Tensor};
use burn::tensor::backend::Backend;
use super::trait_::Interpolator;

/// Indices this far beyond the first or last voxel centre still count as inside.
const OUTSIDE_TOLERANCE: f64 = 1e-3;

/// Trilinear interpolator.
///
/// Out-of-range indices are clamped to the nearest edge voxel unless a fill
/// value is set, in which case samples outside `[0, n - 1]` on any axis take
/// that value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearInterpolator {
    fill: Option<f32>,
}

impl LinearInterpolator {
    /// Clamp-to-edge interpolator.
    pub fn new() -> Self {
        Self { fill: None }
    }

    /// Interpolator returning `value` outside the sampled field of view.
    pub fn with_fill(value: f32) -> Self {
        Self { fill: Some(value) }
    }

    pub fn fill(&self) -> Option<f32> {
        self.fill
    }

    #[inline]
    fn gather_3d<B: Backend>(
        flat_data: &Tensor<B, 1>,
        xi: &Tensor<B, 1, Int>,
        yi: &Tensor<B, 1, Int>,
        zi: &Tensor<B, 1, Int>,
        stride_y: i32,
        stride_z: i32,
    ) -> Tensor<B, 1> {
        let idx = zi.clone() * stride_z + yi.clone() * stride_y + xi.clone();
        flat_data.clone().gather(0, idx)
    }

    fn outside_axis<B: Backend>(c: &Tensor<B, 1>, n: usize) -> Tensor<B, 1> {
        let low = c.clone().lower_elem(-OUTSIDE_TOLERANCE).float();
        let high = c.clone().greater_elem(n as f64 - 1.0 + OUTSIDE_TOLERANCE).float();
        low + high
    }

    fn outside_mask<B: Backend>(
        x: &Tensor<B, 1>,
        y: &Tensor<B, 1>,
        z: &Tensor<B, 1>,
        dims_xyz: [usize; 3],
    ) -> Tensor<B, 1, Bool> {
        let count = Self::outside_axis(x, dims_xyz[0])
            + Self::outside_axis(y, dims_xyz[1])
            + Self::outside_axis(z, dims_xyz[2]);
        count.greater_elem(0.0)
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d0, d1, d2] = data.dims(); // Z, Y, X
        let batch_size = indices.dims()[0];
        let device = indices.device();

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let outside = self
            .fill
            .map(|_| Self::outside_mask(&x, &y, &z, [d2, d1, d0]));

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let z0 = z.clone().floor();

        let wx = x - x0.clone();
        let wy = y - y0.clone();
        let wz = z - z0.clone();

        let x1 = x0.clone() + 1.0;
        let y1 = y0.clone() + 1.0;
        let z1 = z0.clone() + 1.0;

        let x0_i = x0.clamp(0.0, (d2 - 1) as f64).int();
        let y0_i = y0.clamp(0.0, (d1 - 1) as f64).int();
        let z0_i = z0.clamp(0.0, (d0 - 1) as f64).int();
        let x1_i = x1.clamp(0.0, (d2 - 1) as f64).int();
        let y1_i = y1.clamp(0.0, (d1 - 1) as f64).int();
        let z1_i = z1.clamp(0.0, (d0 - 1) as f64).int();

        let stride_z = (d1 * d2) as i32;
        let stride_y = d2 as i32;
        let flat_data = data.clone().reshape([d0 * d1 * d2]);

        let v000 = Self::gather_3d(&flat_data, &x0_i, &y0_i, &z0_i, stride_y, stride_z);
        let v001 = Self::gather_3d(&flat_data, &x0_i, &y0_i, &z1_i, stride_y, stride_z);
        let v010 = Self::gather_3d(&flat_data, &x0_i, &y1_i, &z0_i, stride_y, stride_z);
        let v011 = Self::gather_3d(&flat_data, &x0_i, &y1_i, &z1_i, stride_y, stride_z);
        let v100 = Self::gather_3d(&flat_data, &x1_i, &y0_i, &z0_i, stride_y, stride_z);
        let v101 = Self::gather_3d(&flat_data, &x1_i, &y0_i, &z1_i, stride_y, stride_z);
        let v110 = Self::gather_3d(&flat_data, &x1_i, &y1_i, &z0_i, stride_y, stride_z);
        let v111 = Self::gather_3d(&flat_data, &x1_i, &y1_i, &z1_i, stride_y, stride_z);

        let one = Tensor::<B, 1>::ones([batch_size], &device);
        let one_minus_wx = one.clone() - wx.clone();
        let one_minus_wy = one.clone() - wy.clone();
        let one_minus_wz = one - wz.clone();

        let c00 = v000 * one_minus_wx.clone() + v100 * wx.clone();
        let c01 = v001 * one_minus_wx.clone() + v101 * wx.clone();
        let c10 = v010 * one_minus_wx.clone() + v110 * wx.clone();
        let c11 = v011 * one_minus_wx + v111 * wx;

        let c0 = c00 * one_minus_wy.clone() + c10 * wy.clone();
        let c1 = c01 * one_minus_wy + c11 * wy;

        let values = c0 * one_minus_wz + c1 * wz;

        match (outside, self.fill) {
            (Some(mask), Some(fill)) => values.mask_fill(mask, fill),
            _ => values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn cube(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3> {
        // [Z=2, Y=2, X=2], value = x + 10y + 100z
        let data_vec = vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0];
        Tensor::from_data(TensorData::new(data_vec, Shape::new([2, 2, 2])), device)
    }

    #[test]
    fn test_linear_interpolator_grid_points_and_centre() {
        let device = Default::default();
        let data = cube(&device);
        let interpolator = LinearInterpolator::new();

        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5, 0.5]],
            &device,
        );
        let result = interpolator.interpolate(&data, indices).into_data();
        let slice = result.as_slice::<f32>().unwrap();

        assert_eq!(slice[0], 0.0);
        assert_eq!(slice[1], 1.0);
        assert_eq!(slice[2], 10.0);
        assert_eq!(slice[3], 100.0);
        assert!((slice[4] - 55.5).abs() < 1e-4);
    }

    #[test]
    fn test_linear_interpolator_clamps_to_edge() {
        let device = Default::default();
        let data = cube(&device);
        let interpolator = LinearInterpolator::new();

        let indices = Tensor::<TestBackend, 2>::from_floats([[-1.0, -1.0, -1.0], [5.0, 5.0, 5.0], [1.5, 0.0, 0.0]], &device);
        let result = interpolator.interpolate(&data, indices).into_data();
        let slice = result.as_slice::<f32>().unwrap();

        assert_eq!(slice[0], 0.0);
        assert_eq!(slice[1], 111.0);
        assert_eq!(slice[2], 1.0);
    }

    #[test]
    fn test_linear_interpolator_fill_outside() {
        let device = Default::default();
        let data = cube(&device);
        let interpolator = LinearInterpolator::with_fill(0.0);

        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 1.0, 1.0], [1.2, 0.0, 0.0], [0.0, -0.5, 0.0], [0.5, 0.5, 0.5]],
            &device,
        );
        let result = interpolator.interpolate(&data, indices).into_data();
        let slice = result.as_slice::<f32>().unwrap();

        assert_eq!(slice[0], 111.0);
        assert_eq!(slice[1], 0.0);
        assert_eq!(slice[2], 0.0);
        assert!((slice[3] - 55.5).abs() < 1e-4);
    }
}
