//! Dense displacement-field registration.
//!
//! The field `u` is held in voxels of the working grid as three `[Z, Y, X]`
//! tensors and converted to millimetres whenever it is used as a transform
//! or returned.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use phasereg_core::filter::{GaussianFilter, ResampleImageFilter};
use phasereg_core::image::{tensor_to_vec, Image};
use phasereg_core::interpolation::LinearInterpolator;
use phasereg_core::transform::{AffineParameters, AffineTransform, ChainedTransform, DisplacementField};
use phasereg_core::Spacing;
use crate::error::{RegistrationError, Result};
use crate::filters::{FilterResponse, NonlinearFilterSet, QuadratureFilterBank};
use crate::phase::{border_margin, PhaseField};

/// Gaussian sigma (voxels) applied to the per-voxel tensor components.
pub const TENSOR_SMOOTHING_SIGMA: f64 = 1.5;

/// Tikhonov weight relative to the largest tensor trace.
pub const TIKHONOV_FACTOR: f64 = 1e-3;

/// Tensor components in upload order: Axx, Axy, Axz, Ayy, Ayz, Azz, hx, hy, hz.
const COMPONENTS: usize = 9;

/// Displacement-field solver bound to one non-linear filter set.
#[derive(Debug, Clone)]
pub struct DisplacementSolver<B: Backend> {
    bank: QuadratureFilterBank<B>,
    directions: Vec<[f64; 3]>,
    margin: usize,
    smoothing_sigma: f64,
}

/// Running displacement estimate in voxels.
#[derive(Debug, Clone)]
pub struct DisplacementState<B: Backend> {
    components: [Tensor<B, 3>; 3],
}

impl<B: Backend> DisplacementState<B> {
    pub fn zeros(shape: [usize; 3], device: &B::Device) -> Self {
        Self {
            components: [
                Tensor::zeros(shape, device),
                Tensor::zeros(shape, device),
                Tensor::zeros(shape, device),
            ],
        }
    }

    /// The field in millimetres on the grid of `grid`.
    pub fn to_field(&self, grid: &Image<B>) -> DisplacementField<B> {
        let spacing = grid.spacing();
        let [x, y, z] = self.components.clone();
        DisplacementField::from_components(
            [x * spacing[0], y * spacing[1], z * spacing[2]],
            grid,
        )
    }
}

impl<B: Backend> DisplacementSolver<B> {
    /// `smoothing_sigma` is in millimetres.
    pub fn new(filters: &NonlinearFilterSet, smoothing_sigma: f64, device: &B::Device) -> Result<Self> {
        Ok(Self {
            bank: QuadratureFilterBank::new(filters.filters(), device)?,
            directions: filters.filters().iter().map(|f| f.direction()).collect(),
            margin: border_margin(filters.kernel_size()),
            smoothing_sigma,
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.bank.kernel_size()
    }

    pub fn reference_responses(&self, reference: &Image<B>) -> Result<Vec<FilterResponse>> {
        self.bank.apply(reference)
    }

    /// Sample `source` at `T_affine(x + u(x))` for every point of the
    /// reference grid, clamping at the edges.
    pub fn warp(
        &self,
        source: &Image<B>,
        reference: &Image<B>,
        affine: &AffineParameters,
        state: &DisplacementState<B>,
    ) -> Image<B> {
        let device = reference.data().device();
        let affine = AffineTransform::from_parameters(affine, reference.spacing(), &reference.center(), &device);
        let transform = ChainedTransform::new(state.to_field(reference), affine);
        ResampleImageFilter::new_from_reference(reference, transform, LinearInterpolator::new()).apply(source)
    }

    /// One iteration. Returns the RMS update in millimetres.
    pub fn iterate(
        &self,
        source: &Image<B>,
        reference: &Image<B>,
        reference_responses: &[FilterResponse],
        affine: &AffineParameters,
        state: &mut DisplacementState<B>,
    ) -> Result<f64> {
        let warped = self.warp(source, reference, affine, state);
        let responses = self.bank.apply(&warped)?;
        let dims = reference.size();
        let device = reference.data().device();

        let tensors = self.accumulate_tensors(reference_responses, &responses, dims);
        let tensors = smooth_components::<B>(tensors, reference.shape(), &device)?;
        let update = solve_updates(&tensors)?;

        let spacing = reference.spacing();
        let smoothing = GaussianFilter::<B>::isotropic(self.smoothing_sigma);
        let mut squared = 0.0f64;
        for axis in 0..3 {
            squared += update[axis]
                .iter()
                .map(|&v| (v as f64 * spacing[axis]).powi(2))
                .sum::<f64>();
            let delta = upload::<B>(update[axis].clone(), reference.shape(), &device);
            let accumulated = state.components[axis].clone() + delta;
            state.components[axis] = smoothing.apply_tensor(accumulated, spacing);
        }
        Ok((squared / update[0].len().max(1) as f64).sqrt())
    }

    /// Per-voxel `A = Σ c g² n nᵀ` and `h = Σ c g Δφ n`, as nine host fields.
    fn accumulate_tensors(
        &self,
        reference: &[FilterResponse],
        warped: &[FilterResponse],
        dims: [usize; 3],
    ) -> Vec<Vec<f32>> {
        let voxels = dims.iter().product::<usize>();
        let plane = dims[0] * dims[1];
        let fields: Vec<PhaseField> = self
            .directions
            .iter()
            .enumerate()
            .map(|(k, &n)| PhaseField::compute(&reference[k], &warped[k], n, dims, self.margin))
            .collect();

        let mut packed = vec![[0.0f32; COMPONENTS]; voxels];
        packed.par_chunks_mut(plane).enumerate().for_each(|(z, slice)| {
            for (local, out) in slice.iter_mut().enumerate() {
                let i = local + z * plane;
                for (field, n) in fields.iter().zip(&self.directions) {
                    let c = field.certainty[i];
                    if c <= 0.0 {
                        continue;
                    }
                    let g = field.gradient[i];
                    let w = c * g * g;
                    let r = c * g * field.delta[i];
                    let [nx, ny, nz] = n.map(|v| v as f32);
                    out[0] += w * nx * nx;
                    out[1] += w * nx * ny;
                    out[2] += w * nx * nz;
                    out[3] += w * ny * ny;
                    out[4] += w * ny * nz;
                    out[5] += w * nz * nz;
                    out[6] += r * nx;
                    out[7] += r * ny;
                    out[8] += r * nz;
                }
            }
        });

        (0..COMPONENTS)
            .map(|component| packed.iter().map(|values| values[component]).collect())
            .collect()
    }
}

fn upload<B: Backend>(values: Vec<f32>, shape: [usize; 3], device: &B::Device) -> Tensor<B, 3> {
    let len = values.len();
    Tensor::<B, 1>::from_data(TensorData::new(values, Shape::new([len])), device).reshape(shape)
}

fn smooth_components<B: Backend>(
    components: Vec<Vec<f32>>,
    shape: [usize; 3],
    device: &B::Device,
) -> Result<Vec<Vec<f32>>> {
    let filter = GaussianFilter::<B>::isotropic(TENSOR_SMOOTHING_SIGMA);
    let unit = Spacing::uniform(1.0);
    components
        .into_iter()
        .map(|values| {
            let smoothed = filter.apply_tensor(upload::<B>(values, shape, device), &unit);
            Ok(tensor_to_vec(smoothed)?)
        })
        .collect()
}

/// Solve `(A + λI) δu = h` at every voxel.
fn solve_updates(tensors: &[Vec<f32>]) -> Result<[Vec<f32>; 3]> {
    let voxels = tensors[0].len();
    let max_trace = (0..voxels)
        .into_par_iter()
        .map(|i| (tensors[0][i] + tensors[3][i] + tensors[5][i]) as f64)
        .reduce(|| 0.0, f64::max);
    if !(max_trace > 0.0) || !max_trace.is_finite() {
        return Err(RegistrationError::numeric(
            "displacement system has no certainty anywhere",
        ));
    }
    let lambda = TIKHONOV_FACTOR * max_trace;

    let solved: Vec<[f32; 3]> = (0..voxels)
        .into_par_iter()
        .map(|i| {
            let t = |k: usize| tensors[k][i] as f64;
            let a = Matrix3::new(
                t(0), t(1), t(2),
                t(1), t(3), t(4),
                t(2), t(4), t(5),
            ) + Matrix3::identity() * lambda;
            let h = Vector3::new(t(6), t(7), t(8));
            let du = a
                .cholesky()
                .map(|ch| ch.solve(&h))
                .ok_or_else(|| RegistrationError::numeric("displacement tensor is not positive definite"))?;
            if du.iter().any(|v| !v.is_finite()) {
                return Err(RegistrationError::numeric("displacement update is not finite"));
            }
            Ok([du[0] as f32, du[1] as f32, du[2] as f32])
        })
        .collect::<Result<_>>()?;

    Ok([
        solved.iter().map(|d| d[0]).collect(),
        solved.iter().map(|d| d[1]).collect(),
        solved.iter().map(|d| d[2]).collect(),
    ])
}

/// Read a displacement state back to the host, in millimetres.
pub fn field_to_host<B: Backend>(field: &DisplacementField<B>) -> Result<[Vec<f32>; 3]> {
    let [x, y, z] = field.components();
    Ok([tensor_to_vec(x)?, tensor_to_vec(y)?, tensor_to_vec(z)?])
}
