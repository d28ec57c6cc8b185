//! Spatial types: points, vectors and voxel spacing.
//!
//! All types are thin nalgebra wrappers in f64. Component order is always
//! (x, y, z), independent of the `[Z, Y, X]` tensor layout used for volumes.

pub mod point;
pub mod vector;
pub mod spacing;

pub use point::Point;
pub use vector::Vector;
pub use spacing::Spacing;

pub type Spacing3 = Spacing<3>;
