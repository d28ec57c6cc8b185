//! Affine registration from local phase differences.
//!
//! Each iteration warps the source with the current estimate, filters it,
//! and solves the weighted least-squares problem
//!
//! ```text
//! minimise  Σ_k Σ_x c g² (vᵀ C_k δ - Δφ / g)²,   v = [1, x̃, ỹ, z̃]
//! ```
//!
//! for the increment `δ`, which is then composed into the running estimate.

use burn::tensor::backend::Backend;
use nalgebra::{Matrix4, SMatrix, SVector, Vector4};
use rayon::prelude::*;
use phasereg_core::filter::ResampleImageFilter;
use phasereg_core::image::Image;
use phasereg_core::interpolation::LinearInterpolator;
use phasereg_core::transform::{AffineParameters, AffineTransform};
use crate::error::{RegistrationError, Result};
use crate::filters::{ConstraintMatrix, FilterResponse, LinearFilterSet, QuadratureFilterBank};
use crate::phase::{border_margin, PhaseField};

type Matrix12 = SMatrix<f64, 12, 12>;
type Vector12 = SVector<f64, 12>;

/// Outcome of one affine iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineUpdate {
    /// Estimate after the update.
    pub parameters: AffineParameters,
    /// The increment that was composed in.
    pub increment: AffineParameters,
}

impl AffineUpdate {
    pub fn increment_norm(&self) -> f64 {
        self.increment.as_array().iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Affine solver bound to one linear filter set.
#[derive(Debug, Clone)]
pub struct AffineSolver<B: Backend> {
    bank: QuadratureFilterBank<B>,
    constraints: Vec<ConstraintMatrix>,
    directions: Vec<[f64; 3]>,
    margin: usize,
}

impl<B: Backend> AffineSolver<B> {
    pub fn new(filters: &LinearFilterSet, device: &B::Device) -> Result<Self> {
        Ok(Self {
            bank: QuadratureFilterBank::new(filters.filters(), device)?,
            constraints: filters.constraints().to_vec(),
            directions: filters.filters().iter().map(|f| f.direction()).collect(),
            margin: border_margin(filters.kernel_size()),
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.bank.kernel_size()
    }

    /// Filter responses of the reference, computed once per level.
    pub fn reference_responses(&self, reference: &Image<B>) -> Result<Vec<FilterResponse>> {
        self.bank.apply(reference)
    }

    /// Warp `source` onto the grid of `reference` with `parameters`
    /// (voxel units of that grid), clamping at the edges.
    pub fn warp(&self, source: &Image<B>, reference: &Image<B>, parameters: &AffineParameters) -> Image<B> {
        let device = reference.data().device();
        let transform = AffineTransform::from_parameters(parameters, reference.spacing(), &reference.center(), &device);
        ResampleImageFilter::new_from_reference(reference, transform, LinearInterpolator::new()).apply(source)
    }

    /// One iteration: warp, filter, solve, compose.
    pub fn iterate(
        &self,
        source: &Image<B>,
        reference: &Image<B>,
        reference_responses: &[FilterResponse],
        parameters: &AffineParameters,
    ) -> Result<AffineUpdate> {
        let warped = self.warp(source, reference, parameters);
        let responses = self.bank.apply(&warped)?;
        let increment = self.solve_increment(reference_responses, &responses, reference.size())?;

        let updated = parameters.compose(&increment);
        if !updated.is_finite() {
            return Err(RegistrationError::numeric("affine estimate became non-finite"));
        }
        Ok(AffineUpdate {
            parameters: updated,
            increment,
        })
    }

    /// Solve the normal equations for the increment on a `(nx, ny, nz)` grid.
    pub fn solve_increment(
        &self,
        reference: &[FilterResponse],
        warped: &[FilterResponse],
        dims: [usize; 3],
    ) -> Result<AffineParameters> {
        let mut a = Matrix12::zeros();
        let mut h = Vector12::zeros();

        for (k, constraint) in self.constraints.iter().enumerate() {
            let field = PhaseField::compute(&reference[k], &warped[k], self.directions[k], dims, self.margin);
            let (m, b) = accumulate_regressors(&field, dims);
            let c = constraint.inner();
            a += c.transpose() * m * c;
            h += c.transpose() * b;
        }

        if !(a.trace() > 0.0) {
            return Err(RegistrationError::numeric(
                "affine system has no certainty; the volumes carry no usable phase",
            ));
        }
        let cholesky = a
            .cholesky()
            .ok_or_else(|| RegistrationError::numeric("affine system is not positive definite"))?;
        let delta = cholesky.solve(&h);
        if delta.iter().any(|v| !v.is_finite()) {
            return Err(RegistrationError::numeric("affine increment is not finite"));
        }

        let mut values = [0.0; 12];
        values.copy_from_slice(delta.as_slice());
        Ok(AffineParameters::from_array(values))
    }
}

/// `Σ c g² v vᵀ` and `Σ c g Δφ v` over the active voxels.
///
/// Partial sums are formed per z-slice in parallel and added in slice order,
/// so the result does not depend on the number of worker threads.
fn accumulate_regressors(field: &PhaseField, dims: [usize; 3]) -> (Matrix4<f64>, Vector4<f64>) {
    let [nx, ny, nz] = dims;
    let plane = nx * ny;
    let half = [
        (nx as f64 - 1.0) / 2.0,
        (ny as f64 - 1.0) / 2.0,
        (nz as f64 - 1.0) / 2.0,
    ];

    let partials: Vec<(Matrix4<f64>, Vector4<f64>)> = (0..nz)
        .into_par_iter()
        .map(|z| {
            let mut m = Matrix4::zeros();
            let mut b = Vector4::zeros();
            for y in 0..ny {
                for x in 0..nx {
                    let i = x + y * nx + z * plane;
                    let c = field.certainty[i] as f64;
                    if c <= 0.0 {
                        continue;
                    }
                    let g = field.gradient[i] as f64;
                    let v = Vector4::new(1.0, x as f64 - half[0], y as f64 - half[1], z as f64 - half[2]);
                    m += v * v.transpose() * (c * g * g);
                    b += v * (c * g * field.delta[i] as f64);
                }
            }
            (m, b)
        })
        .collect();

    partials
        .into_iter()
        .fold((Matrix4::zeros(), Vector4::zeros()), |(m, b), (pm, pb)| (m + pm, b + pb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::filters::FilterSets;
    use phasereg_core::Volume;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn blobs(dims: [usize; 3], shift: [f64; 3]) -> Volume {
        let centres = [
            [8.0, 9.0, 10.0],
            [16.0, 8.0, 12.0],
            [11.0, 16.0, 8.0],
            [13.0, 12.0, 16.0],
            [20.0, 18.0, 18.0],
        ];
        Volume::from_fn(dims, [1.0; 3], |x, y, z| {
            centres
                .iter()
                .map(|c| {
                    let dx = x as f64 - c[0] - shift[0];
                    let dy = y as f64 - c[1] - shift[1];
                    let dz = z as f64 - c[2] - shift[2];
                    (-(dx * dx + dy * dy + dz * dz) / 8.0).exp() as f32
                })
                .sum()
        })
        .unwrap()
    }

    fn solver(device: &<TestBackend as Backend>::Device) -> AffineSolver<TestBackend> {
        AffineSolver::new(&FilterSets::standard().unwrap().linear, device).unwrap()
    }

    #[test]
    fn test_identical_volumes_give_zero_increment() {
        let device = Default::default();
        let solver = solver(&device);
        let image = blobs([28, 28, 28], [0.0; 3]).to_image::<TestBackend>(&device);
        let responses = solver.reference_responses(&image).unwrap();

        let update = solver.iterate(&image, &image, &responses, &AffineParameters::identity()).unwrap();
        assert!(update.increment_norm() < 1e-4, "increment {:?}", update.increment);
    }

    #[test]
    fn test_translation_is_recovered() {
        let device = Default::default();
        let solver = solver(&device);
        let reference = blobs([28, 28, 28], [0.0; 3]).to_image::<TestBackend>(&device);
        let source = blobs([28, 28, 28], [1.0, 0.0, 0.0]).to_image::<TestBackend>(&device);
        let responses = solver.reference_responses(&reference).unwrap();

        let mut parameters = AffineParameters::identity();
        for _ in 0..6 {
            parameters = solver.iterate(&source, &reference, &responses, &parameters).unwrap().parameters;
        }
        assert!((parameters[0] - 1.0).abs() < 0.15, "tx = {}", parameters[0]);
        assert!(parameters[1].abs() < 0.15);
        assert!(parameters[2].abs() < 0.15);
    }

    #[test]
    fn test_empty_volume_is_numeric_error() {
        let device = Default::default();
        let solver = solver(&device);
        let image = Volume::zeros([12, 12, 12], [1.0; 3]).unwrap().to_image::<TestBackend>(&device);
        let responses = solver.reference_responses(&image).unwrap();
        let err = solver.iterate(&image, &image, &responses, &AffineParameters::identity()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Numeric);
    }
}
