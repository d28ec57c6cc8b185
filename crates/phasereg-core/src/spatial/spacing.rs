//! Voxel spacing.
//!
//! Spacing is the physical distance (mm) between adjacent voxel centres
//! along each axis, stored in (x, y, z) order.

use super::Vector;

pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing along every axis.
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    /// True when every component is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self[i].is_finite() && self[i] > 0.0)
    }
}
