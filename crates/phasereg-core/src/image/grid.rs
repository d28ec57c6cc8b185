use burn::tensor::{Int, Tensor};
use burn::tensor::backend::Backend;

/// Continuous index grid for a volume of tensor shape `[Z, Y, X]`.
///
/// Returns `[N, 3]` with columns `(x, y, z)`, rows ordered x fastest, which
/// matches the row-major flattening of the volume tensor.
pub fn generate_grid_3d<B: Backend>(shape: [usize; 3], device: &B::Device) -> Tensor<B, 2> {
    let [d, h, w] = shape;
    let total = d * h * w;

    let z_range = Tensor::<B, 1, Int>::arange(0..d as i64, device);
    let y_range = Tensor::<B, 1, Int>::arange(0..h as i64, device);
    let x_range = Tensor::<B, 1, Int>::arange(0..w as i64, device);

    let z_grid = z_range.reshape([d, 1, 1]).repeat(&[1, h, w]).reshape([total]).float();
    let y_grid = y_range.reshape([1, h, 1]).repeat(&[d, 1, w]).reshape([total]).float();
    let x_grid = x_range.reshape([1, 1, w]).repeat(&[d, h, 1]).reshape([total]).float();

    Tensor::cat(
        vec![
            x_grid.unsqueeze_dim(1),
            y_grid.unsqueeze_dim(1),
            z_grid.unsqueeze_dim(1),
        ],
        1,
    )
}
