//! Quadrature filter kernels and the immutable filter sets passed to a run.

use nalgebra::{SMatrix, Vector3};
use serde::{Deserialize, Serialize};
use crate::error::{RegistrationError, Result};
use super::design::FilterDesign;

/// A complex, odd-sized cubic convolution kernel with a preferred direction.
///
/// Coefficients are stored z-major, x fastest: the value for kernel voxel
/// `(x, y, z)` is at `x + y·size + z·size²`, and that voxel sits at offset
/// `(x - r, y - r, z - r)` from the kernel centre, `r = (size - 1) / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadratureFilter {
    size: usize,
    real: Vec<f32>,
    imag: Vec<f32>,
    direction: [f64; 3],
    center_frequency: f64,
}

impl QuadratureFilter {
    /// The direction is normalised; a zero direction is rejected.
    pub fn new(
        size: usize,
        real: Vec<f32>,
        imag: Vec<f32>,
        direction: [f64; 3],
        center_frequency: f64,
    ) -> Result<Self> {
        if size == 0 || size % 2 == 0 {
            return Err(RegistrationError::configuration(format!(
                "filter size must be odd, got {size}"
            )));
        }
        let expected = size * size * size;
        if real.len() != expected || imag.len() != expected {
            return Err(RegistrationError::configuration(format!(
                "filter of size {size} needs {expected} coefficients, got {} real and {} imaginary",
                real.len(),
                imag.len()
            )));
        }
        let n = Vector3::from(direction);
        let norm = n.norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Err(RegistrationError::configuration("filter direction must be non-zero"));
        }
        let n = n / norm;
        Ok(Self {
            size,
            real,
            imag,
            direction: [n[0], n[1], n[2]],
            center_frequency,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn radius(&self) -> usize {
        (self.size - 1) / 2
    }

    pub fn real(&self) -> &[f32] {
        &self.real
    }

    pub fn imag(&self) -> &[f32] {
        &self.imag
    }

    /// Unit direction `(x, y, z)`.
    pub fn direction(&self) -> [f64; 3] {
        self.direction
    }

    /// Nominal centre frequency in rad/voxel.
    pub fn center_frequency(&self) -> f64 {
        self.center_frequency
    }
}

/// Maps the local regressor `[1, x̃, ỹ, z̃]` of one filter onto the twelve
/// affine unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMatrix(pub SMatrix<f64, 4, 12>);

impl ConstraintMatrix {
    /// Constraint for a filter measuring displacement along `n`.
    ///
    /// The displacement `t + M x̃` projected on `n` is
    /// `[1, x̃, ỹ, z̃] · C · p`, with `C[0][j] = n_j` for the translation and
    /// `C[1 + l][3 + 3j + l] = n_j` for the linear part.
    pub fn from_direction(n: [f64; 3]) -> Self {
        let mut c = SMatrix::<f64, 4, 12>::zeros();
        for j in 0..3 {
            c[(0, j)] = n[j];
            for l in 0..3 {
                c[(1 + l, 3 + 3 * j + l)] = n[j];
            }
        }
        Self(c)
    }

    pub fn inner(&self) -> &SMatrix<f64, 4, 12> {
        &self.0
    }
}

/// Filters driving the affine solver, each with its constraint matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFilterSet {
    filters: Vec<QuadratureFilter>,
    constraints: Vec<ConstraintMatrix>,
}

impl LinearFilterSet {
    /// Constraints default to [`ConstraintMatrix::from_direction`] of each filter.
    pub fn new(filters: Vec<QuadratureFilter>, constraints: Option<Vec<ConstraintMatrix>>) -> Result<Self> {
        check_uniform_size(&filters, "linear")?;
        let constraints = match constraints {
            Some(c) if c.len() != filters.len() => {
                return Err(RegistrationError::configuration(format!(
                    "{} constraint matrices for {} linear filters",
                    c.len(),
                    filters.len()
                )))
            }
            Some(c) => c,
            None => filters
                .iter()
                .map(|f| ConstraintMatrix::from_direction(f.direction()))
                .collect(),
        };
        Ok(Self { filters, constraints })
    }

    pub fn filters(&self) -> &[QuadratureFilter] {
        &self.filters
    }

    pub fn constraints(&self) -> &[ConstraintMatrix] {
        &self.constraints
    }

    pub fn kernel_size(&self) -> usize {
        self.filters[0].size()
    }
}

/// Filters driving the non-linear solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonlinearFilterSet {
    filters: Vec<QuadratureFilter>,
}

impl NonlinearFilterSet {
    pub fn new(filters: Vec<QuadratureFilter>) -> Result<Self> {
        check_uniform_size(&filters, "non-linear")?;
        Ok(Self { filters })
    }

    pub fn filters(&self) -> &[QuadratureFilter] {
        &self.filters
    }

    pub fn kernel_size(&self) -> usize {
        self.filters[0].size()
    }
}

/// Both filter sets of a run. Built once by the caller and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSets {
    pub linear: LinearFilterSet,
    pub nonlinear: NonlinearFilterSet,
}

impl FilterSets {
    pub fn new(linear: LinearFilterSet, nonlinear: NonlinearFilterSet) -> Self {
        Self { linear, nonlinear }
    }

    /// Default sets: three axis-aligned linear filters and six
    /// icosahedral non-linear filters, all of size 7.
    pub fn standard() -> Result<Self> {
        let design = FilterDesign::default();
        Ok(Self::new(
            LinearFilterSet::new(design.linear_set()?, None)?,
            NonlinearFilterSet::new(design.nonlinear_set()?)?,
        ))
    }
}

fn check_uniform_size(filters: &[QuadratureFilter], name: &str) -> Result<()> {
    let first = filters
        .first()
        .ok_or_else(|| RegistrationError::configuration(format!("{name} filter set is empty")))?;
    if filters.iter().any(|f| f.size() != first.size()) {
        return Err(RegistrationError::configuration(format!(
            "{name} filters must share one kernel size"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn delta_filter(size: usize, direction: [f64; 3]) -> QuadratureFilter {
        let n = size * size * size;
        let mut real = vec![0.0; n];
        real[n / 2] = 1.0;
        QuadratureFilter::new(size, real, vec![0.0; n], direction, 1.0).unwrap()
    }

    #[test]
    fn test_filter_validation() {
        assert!(QuadratureFilter::new(4, vec![0.0; 64], vec![0.0; 64], [1.0, 0.0, 0.0], 1.0).is_err());
        assert!(QuadratureFilter::new(3, vec![0.0; 26], vec![0.0; 27], [1.0, 0.0, 0.0], 1.0).is_err());
        let err = QuadratureFilter::new(3, vec![0.0; 27], vec![0.0; 27], [0.0; 3], 1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let f = delta_filter(3, [0.0, 2.0, 0.0]);
        assert_eq!(f.direction(), [0.0, 1.0, 0.0]);
        assert_eq!(f.radius(), 1);
    }

    #[test]
    fn test_constraint_from_direction() {
        let c = ConstraintMatrix::from_direction([0.6, 0.8, 0.0]);
        let params = [1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
        let p = nalgebra::SVector::<f64, 12>::from_row_slice(&params);
        let v = nalgebra::Vector4::new(1.0, 2.0, -1.0, 0.5);

        // n · (t + M x̃) for x̃ = (2, -1, 0.5)
        let t = Vector3::new(1.0, 2.0, 3.0);
        let m = nalgebra::Matrix3::from_row_slice(&params[3..]);
        let x = Vector3::new(2.0, -1.0, 0.5);
        let expected = Vector3::new(0.6, 0.8, 0.0).dot(&(t + m * x));

        let got = v.dot(&(c.inner() * p));
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn test_filter_sets_validation() {
        assert!(NonlinearFilterSet::new(vec![]).is_err());
        assert!(NonlinearFilterSet::new(vec![delta_filter(3, [1.0, 0.0, 0.0]), delta_filter(5, [0.0, 1.0, 0.0])]).is_err());

        let filters = vec![delta_filter(3, [1.0, 0.0, 0.0])];
        let set = LinearFilterSet::new(filters.clone(), None).unwrap();
        assert_eq!(set.constraints()[0], ConstraintMatrix::from_direction([1.0, 0.0, 0.0]));
        assert!(LinearFilterSet::new(filters, Some(vec![])).is_err());
    }

    #[test]
    fn test_standard_sets() {
        let sets = FilterSets::standard().unwrap();
        assert_eq!(sets.linear.filters().len(), 3);
        assert_eq!(sets.nonlinear.filters().len(), 6);
        assert_eq!(sets.linear.kernel_size(), 7);
        assert_eq!(sets.nonlinear.kernel_size(), 7);
    }

    #[test]
    fn test_empty_set_fails_in_its_solver_stage() {
        use crate::api::RegistrationInputs;
        use crate::config::{OutputLevel, RegistrationConfig};
        use crate::engine::RegistrationEngine;
        use crate::error::Stage;
        use burn_ndarray::NdArray;
        use phasereg_core::Volume;

        let volume = Volume::zeros([16, 16, 16], [1.0; 3]).unwrap();
        let inputs = RegistrationInputs::new(volume.clone(), volume);
        let standard = FilterSets::standard().unwrap();
        let cases = [
            (
                FilterSets::new(LinearFilterSet { filters: vec![], constraints: vec![] }, standard.nonlinear.clone()),
                Stage::AffineSolve,
            ),
            (
                FilterSets::new(standard.linear.clone(), NonlinearFilterSet { filters: vec![] }),
                Stage::NonlinearSolve,
            ),
        ];

        for (sets, stage) in cases {
            let err = RegistrationEngine::<NdArray<f32>>::new(
                &inputs,
                &sets,
                RegistrationConfig::default(),
                OutputLevel::Minimal,
                Default::default(),
            )
            .err()
            .unwrap();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert_eq!(err.stage(), Some(stage));
        }
    }
}
