//! Twelve-parameter affine estimate in voxel units.

use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use crate::spatial::Spacing;

/// Affine parameters `[tx, ty, tz, m00, m01, m02, m10, m11, m12, m20, m21, m22]`.
///
/// Expressed in voxels of the working grid, relative to the identity about
/// the grid centre: a centred voxel offset `x̃` maps to `x̃ + t + M·x̃`.
/// The homogeneous form is `[[I + M, t], [0, 1]]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineParameters([f64; 12]);

impl AffineParameters {
    pub const LEN: usize = 12;

    pub fn identity() -> Self {
        Self([0.0; 12])
    }

    pub fn from_array(values: [f64; 12]) -> Self {
        Self(values)
    }

    pub fn from_translation(t: [f64; 3]) -> Self {
        let mut p = Self::identity();
        p.0[..3].copy_from_slice(&t);
        p
    }

    pub fn as_array(&self) -> &[f64; 12] {
        &self.0
    }

    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.0[0], self.0[1], self.0[2])
    }

    /// The deviation `M` from identity.
    pub fn deviation(&self) -> Matrix3<f64> {
        Matrix3::from_row_slice(&self.0[3..])
    }

    pub fn homogeneous(&self) -> Matrix4<f64> {
        let a = Matrix3::identity() + self.deviation();
        let t = self.translation();
        let mut h = Matrix4::identity();
        h.fixed_view_mut::<3, 3>(0, 0).copy_from(&a);
        h.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        h
    }

    pub fn from_homogeneous(h: &Matrix4<f64>) -> Self {
        let mut values = [0.0; 12];
        for r in 0..3 {
            values[r] = h[(r, 3)];
            for c in 0..3 {
                let identity = if r == c { 1.0 } else { 0.0 };
                values[3 + 3 * r + c] = h[(r, c)] - identity;
            }
        }
        Self(values)
    }

    /// `self ∘ delta`: apply `delta` first, then `self`.
    pub fn compose(&self, delta: &Self) -> Self {
        Self::from_homogeneous(&(self.homogeneous() * delta.homogeneous()))
    }

    /// Same mapping on a grid whose voxels are `factor` times smaller.
    ///
    /// The linear part is scale-free; the translation scales with the grid.
    pub fn rescaled(&self, factor: f64) -> Self {
        let mut p = *self;
        for t in &mut p.0[..3] {
            *t *= factor;
        }
        p
    }

    /// Map a centred voxel offset.
    pub fn apply(&self, offset: [f64; 3]) -> [f64; 3] {
        let x = Vector3::from(offset);
        let y = x + self.translation() + self.deviation() * x;
        [y[0], y[1], y[2]]
    }

    /// Homogeneous matrix in millimetres for a grid of the given voxel size:
    /// linear block `S (I + M) S⁻¹`, translation `S t`.
    pub fn to_physical(&self, voxel_size: &Spacing<3>) -> Matrix4<f64> {
        let s = Matrix3::from_diagonal(voxel_size.inner());
        let s_inv = Matrix3::from_diagonal(&voxel_size.inner().map(|v| 1.0 / v));
        let a = s * (Matrix3::identity() + self.deviation()) * s_inv;
        let t = s * self.translation();
        let mut h = Matrix4::identity();
        h.fixed_view_mut::<3, 3>(0, 0).copy_from(&a);
        h.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        h
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Default for AffineParameters {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Index<usize> for AffineParameters {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_homogeneous() {
        assert_eq!(AffineParameters::identity().homogeneous(), Matrix4::identity());
        assert_eq!(AffineParameters::identity().apply([1.0, -2.0, 3.0]), [1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_homogeneous_roundtrip() {
        let p = AffineParameters::from_array([1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9]);
        let h = p.homogeneous();
        assert_eq!(h[(0, 3)], 1.0);
        assert!((h[(0, 0)] - 1.1).abs() < 1e-12);
        assert!((h[(1, 0)] - 0.4).abs() < 1e-12);
        let back = AffineParameters::from_homogeneous(&h);
        for i in 0..12 {
            assert!((back[i] - p[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_compose_applies_delta_first() {
        let scale = AffineParameters::from_array([0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let shift = AffineParameters::from_translation([1.0, 0.0, 0.0]);

        // scale(shift(x)) = 2(x + 1)
        let composed = scale.compose(&shift);
        let y = composed.apply([1.0, 0.0, 0.0]);
        assert!((y[0] - 4.0).abs() < 1e-12);

        let translations = shift.compose(&AffineParameters::from_translation([0.0, 2.0, 0.0]));
        assert_eq!(translations.translation(), Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_rescaled_only_touches_translation() {
        let p = AffineParameters::from_array([1.0, -2.0, 0.5, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.2]);
        let r = p.rescaled(2.0);
        assert_eq!(&r.as_array()[..3], &[2.0, -4.0, 1.0]);
        assert_eq!(&r.as_array()[3..], &p.as_array()[3..]);
    }

    #[test]
    fn test_physical_matrix() {
        let p = AffineParameters::from_array([2.0, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let h = p.to_physical(&Spacing::new([1.0, 2.0, 3.0]));
        assert!((h[(0, 3)] - 2.0).abs() < 1e-12);
        assert!((h[(2, 3)] + 3.0).abs() < 1e-12);
        // m01 = 0.5 in voxels becomes 0.5 * sx / sy in mm.
        assert!((h[(0, 1)] - 0.25).abs() < 1e-12);
        assert_eq!(h[(3, 3)], 1.0);
    }
}
