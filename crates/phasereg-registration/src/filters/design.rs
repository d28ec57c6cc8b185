//! Gabor-type quadrature filter design.

use std::f64::consts::PI;
use crate::error::Result;
use super::kernel::QuadratureFilter;

/// Parameters of a Gaussian-windowed complex exponential
/// `g(u) · exp(i ω₀ n·u)`, with the DC response removed from the real part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDesign {
    /// Kernel edge length (odd).
    pub size: usize,
    /// Envelope standard deviation in voxels.
    pub sigma: f64,
    /// Centre frequency in rad/voxel.
    pub center_frequency: f64,
}

impl Default for FilterDesign {
    fn default() -> Self {
        Self {
            size: 7,
            sigma: 1.5,
            center_frequency: PI / 3.0,
        }
    }
}

impl FilterDesign {
    /// Axis directions used for affine estimation.
    pub const AXIS_DIRECTIONS: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    /// Six directions through the vertices of an icosahedron (one per
    /// antipodal pair).
    pub fn icosahedral_directions() -> [[f64; 3]; 6] {
        let q = (10.0 + 2.0 * 5f64.sqrt()).sqrt();
        let a = 2.0 / q;
        let b = (1.0 + 5f64.sqrt()) / q;
        [
            [a, 0.0, b],
            [-a, 0.0, b],
            [b, a, 0.0],
            [b, -a, 0.0],
            [0.0, b, a],
            [0.0, b, -a],
        ]
    }

    /// Build one filter tuned to `direction`.
    pub fn build(&self, direction: [f64; 3]) -> Result<QuadratureFilter> {
        let size = self.size;
        let r = (size as f64 - 1.0) / 2.0;
        let norm = (direction[0].powi(2) + direction[1].powi(2) + direction[2].powi(2)).sqrt();
        let n = direction.map(|v| if norm > 0.0 { v / norm } else { v });
        let two_sigma2 = 2.0 * self.sigma * self.sigma;

        let count = size * size * size;
        let mut envelope = Vec::with_capacity(count);
        let mut phase = Vec::with_capacity(count);
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let u = [x as f64 - r, y as f64 - r, z as f64 - r];
                    let d2 = u[0] * u[0] + u[1] * u[1] + u[2] * u[2];
                    envelope.push((-d2 / two_sigma2).exp());
                    phase.push(self.center_frequency * (n[0] * u[0] + n[1] * u[1] + n[2] * u[2]));
                }
            }
        }
        let envelope_sum: f64 = envelope.iter().sum();

        let mut real: Vec<f64> = envelope.iter().zip(&phase).map(|(g, p)| g * p.cos()).collect();
        let imag: Vec<f64> = envelope.iter().zip(&phase).map(|(g, p)| g * p.sin()).collect();

        // Subtract a scaled envelope so the real part sums to zero.
        let dc = real.iter().sum::<f64>() / envelope_sum;
        for (re, g) in real.iter_mut().zip(&envelope) {
            *re -= dc * g;
        }

        QuadratureFilter::new(
            size,
            real.iter().map(|&v| (v / envelope_sum) as f32).collect(),
            imag.iter().map(|&v| (v / envelope_sum) as f32).collect(),
            direction,
            self.center_frequency,
        )
    }

    pub fn linear_set(&self) -> Result<Vec<QuadratureFilter>> {
        Self::AXIS_DIRECTIONS.iter().map(|&n| self.build(n)).collect()
    }

    pub fn nonlinear_set(&self) -> Result<Vec<QuadratureFilter>> {
        Self::icosahedral_directions().iter().map(|&n| self.build(n)).collect()
    }
}
