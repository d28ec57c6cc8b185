//! Spatial transforms used to pull samples back from a moving volume.
//!
//! Transforms map output physical points (mm) to input physical points.

pub mod trait_;
pub mod parameters;
pub mod affine;
pub mod displacement_field;
pub mod chained;

pub use trait_::Transform;
pub use parameters::AffineParameters;
pub use affine::AffineTransform;
pub use displacement_field::DisplacementField;
pub use chained::ChainedTransform;
