//! Quadrature filters: kernel values, standard designs and the bank that
//! applies them to volumes.

pub mod kernel;
pub mod design;
pub mod bank;

pub use kernel::{ConstraintMatrix, FilterSets, LinearFilterSet, NonlinearFilterSet, QuadratureFilter};
pub use design::FilterDesign;
pub use bank::{FilterResponse, QuadratureFilterBank, BOUNDARY_POLICY, BoundaryPolicy};
