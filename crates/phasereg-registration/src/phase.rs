//! Local phase difference, certainty and phase gradient.
//!
//! For one filter, a reference response `q_r` and a response `q_w` of the
//! currently warped source:
//!
//! * `Δφ = arg(q_r · conj(q_w))`
//! * `c = |q_r| |q_w| cos²(Δφ / 2)`
//! * `g = n · ∇φ`, with each component of `∇φ` taken as the argument of the
//!   summed forward and backward neighbour products of both responses.
//!
//! `Δφ / g` estimates the displacement along `n` in voxels. Voxels near the
//! border, with `g < MIN_PHASE_GRADIENT`, or with zero certainty carry
//! `c = 0` and drop out of every sum.

use rayon::prelude::*;
use crate::filters::FilterResponse;

/// Smallest phase gradient (rad/voxel) a voxel may have to take part.
pub const MIN_PHASE_GRADIENT: f32 = 0.05;

/// Per-voxel phase quantities of one filter, x fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseField {
    pub delta: Vec<f32>,
    pub certainty: Vec<f32>,
    pub gradient: Vec<f32>,
}

/// Border width excluded for a kernel of `kernel_size`.
pub fn border_margin(kernel_size: usize) -> usize {
    (kernel_size.saturating_sub(1) / 2).max(1)
}

#[derive(Clone, Copy)]
struct Complex {
    re: f32,
    im: f32,
}

impl Complex {
    #[inline]
    fn at(response: &FilterResponse, index: usize) -> Self {
        Self {
            re: response.real[index],
            im: response.imag[index],
        }
    }

    /// `self · conj(other)`
    #[inline]
    fn mul_conj(self, other: Self) -> Self {
        Self {
            re: self.re * other.re + self.im * other.im,
            im: self.im * other.re - self.re * other.im,
        }
    }

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }

    #[inline]
    fn arg(self) -> f32 {
        self.im.atan2(self.re)
    }

    #[inline]
    fn norm(self) -> f32 {
        self.re.hypot(self.im)
    }
}

#[inline]
fn neighbour_product(q: &FilterResponse, index: usize, stride: usize) -> Complex {
    let centre = Complex::at(q, index);
    Complex::at(q, index + stride)
        .mul_conj(centre)
        .add(centre.mul_conj(Complex::at(q, index - stride)))
}

impl PhaseField {
    /// Compute the phase field on a `(nx, ny, nz)` grid. Slices are
    /// processed in parallel; each voxel depends only on its neighbours.
    pub fn compute(
        reference: &FilterResponse,
        warped: &FilterResponse,
        direction: [f64; 3],
        dims: [usize; 3],
        margin: usize,
    ) -> Self {
        let [nx, ny, nz] = dims;
        let plane = nx * ny;
        let voxels = plane * nz;
        let n = direction.map(|v| v as f32);
        let strides = [1, nx, plane];

        let mut delta = vec![0.0f32; voxels];
        let mut certainty = vec![0.0f32; voxels];
        let mut gradient = vec![0.0f32; voxels];

        let inside = |i: usize, len: usize| i >= margin && i + margin < len;

        delta
            .par_chunks_mut(plane)
            .zip(certainty.par_chunks_mut(plane))
            .zip(gradient.par_chunks_mut(plane))
            .enumerate()
            .for_each(|(z, ((delta, certainty), gradient))| {
                if !inside(z, nz) {
                    return;
                }
                for y in (0..ny).filter(|&y| inside(y, ny)) {
                    for x in (0..nx).filter(|&x| inside(x, nx)) {
                        let local = x + y * nx;
                        let index = local + z * plane;

                        let r = Complex::at(reference, index);
                        let w = Complex::at(warped, index);
                        let product = r.mul_conj(w);
                        let dphi = product.arg();
                        // |r||w| cos²(Δφ/2) = (|r||w| + Re(r w*)) / 2
                        let c = 0.5 * (r.norm() * w.norm() + product.re);

                        let mut g = 0.0f32;
                        for axis in 0..3 {
                            let s = neighbour_product(reference, index, strides[axis])
                                .add(neighbour_product(warped, index, strides[axis]));
                            g += n[axis] * s.arg();
                        }

                        delta[local] = dphi;
                        gradient[local] = g;
                        certainty[local] = if g >= MIN_PHASE_GRADIENT && c > 0.0 && c.is_finite() {
                            c
                        } else {
                            0.0
                        };
                    }
                }
            });

        Self {
            delta,
            certainty,
            gradient,
        }
    }

    /// Voxels that take part in the estimate.
    pub fn active_voxels(&self) -> usize {
        self.certainty.iter().filter(|&&c| c > 0.0).count()
    }
}
