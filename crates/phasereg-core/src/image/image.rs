//! Backend-resident 3-D image with physical grid geometry.
//!
//! Axes are not oriented: index `(i, j, k)` maps to the physical point
//! `origin + (i·sx, j·sy, k·sz)`. Registration grids are center-aligned,
//! meaning the grid centre sits at the physical origin.

use burn::tensor::{Shape, Tensor, TensorData};
use burn::tensor::backend::Backend;
use crate::spatial::{Point, Spacing, Vector};

/// 3-D image with physical metadata.
///
/// `data` has shape `[Z, Y, X]`; `origin` and `spacing` are in `(x, y, z)`
/// order and in millimetres.
///
/// # Examples
/// ```rust
/// use phasereg_core::Image;
/// use phasereg_core::spatial::Spacing3;
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([4, 6, 8], &device);
/// let image = Image::centered(data, Spacing3::uniform(2.0));
/// assert_eq!(image.size(), [8, 6, 4]);
/// assert_eq!(image.origin()[0], -7.0);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend> {
    data: Tensor<B, 3>,
    origin: Point<3>,
    spacing: Spacing<3>,
}

impl<B: Backend> Image<B> {
    pub fn new(data: Tensor<B, 3>, origin: Point<3>, spacing: Spacing<3>) -> Self {
        Self { data, origin, spacing }
    }

    /// Image whose grid centre lies at the physical origin.
    pub fn centered(data: Tensor<B, 3>, spacing: Spacing<3>) -> Self {
        let [nz, ny, nx] = data.dims();
        let origin = Self::centered_origin([nx, ny, nz], &spacing);
        Self { data, origin, spacing }
    }

    /// Origin that places the centre of a `size` (xyz) grid at zero.
    pub fn centered_origin(size: [usize; 3], spacing: &Spacing<3>) -> Point<3> {
        let mut origin = Point::origin();
        for axis in 0..3 {
            origin[axis] = -(size[axis] as f64 - 1.0) / 2.0 * spacing[axis];
        }
        origin
    }

    pub fn data(&self) -> &Tensor<B, 3> {
        &self.data
    }

    pub fn into_data(self) -> Tensor<B, 3> {
        self.data
    }

    pub fn origin(&self) -> &Point<3> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<3> {
        &self.spacing
    }

    /// Tensor shape `[Z, Y, X]`.
    pub fn shape(&self) -> [usize; 3] {
        self.data.dims()
    }

    /// Grid size in `(x, y, z)` order.
    pub fn size(&self) -> [usize; 3] {
        let [nz, ny, nx] = self.shape();
        [nx, ny, nz]
    }

    /// Same geometry, new samples.
    pub fn with_data(&self, data: Tensor<B, 3>) -> Self {
        Self::new(data, self.origin, self.spacing)
    }

    /// Physical position of the grid centre.
    pub fn center(&self) -> Point<3> {
        let size = self.size();
        let mut offset = Vector::zeros();
        for axis in 0..3 {
            offset[axis] = (size[axis] as f64 - 1.0) / 2.0 * self.spacing[axis];
        }
        self.origin + offset
    }

    /// Continuous voxel indices of `[N, 3]` physical points.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let origin = Self::row_tensor(self.origin.to_array(), &device);
        let inv_spacing = Self::row_tensor(
            [1.0 / self.spacing[0], 1.0 / self.spacing[1], 1.0 / self.spacing[2]],
            &device,
        );
        (points - origin) * inv_spacing
    }

    /// Physical points of `[N, 3]` continuous voxel indices.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let origin = Self::row_tensor(self.origin.to_array(), &device);
        let spacing = Self::row_tensor(self.spacing.to_array(), &device);
        indices * spacing + origin
    }

    fn row_tensor(values: [f64; 3], device: &B::Device) -> Tensor<B, 2> {
        let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        Tensor::<B, 1>::from_data(TensorData::new(values, Shape::new([3])), device).reshape([1, 3])
    }
}
