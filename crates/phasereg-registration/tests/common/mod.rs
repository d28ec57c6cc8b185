#![allow(dead_code)]

use phasereg_core::Volume;

/// Blob centres in units of a sixteenth of the half field of view.
const CENTRES: [[f64; 3]; 8] = [
    [-10.0, -8.0, -6.0],
    [9.0, -7.0, 4.0],
    [-6.0, 10.0, 8.0],
    [7.0, 9.0, -9.0],
    [0.0, 1.0, 0.0],
    [-11.0, 4.0, -2.0],
    [4.0, -11.0, 10.0],
    [10.0, 3.0, 9.0],
];

/// Sum of Gaussian blobs placed relative to the grid centre, with every
/// blob moved by `shift_mm`.
pub fn phantom(dims: [usize; 3], voxel: [f64; 3], shift_mm: [f64; 3]) -> Volume {
    let half = (0..3)
        .map(|a| (dims[a] as f64 - 1.0) / 2.0 * voxel[a])
        .fold(f64::INFINITY, f64::min);
    let scale = half / 16.0;
    let sigma = 2.5 * voxel.iter().copied().fold(f64::INFINITY, f64::min);

    Volume::from_fn(dims, voxel, |x, y, z| {
        let p = [
            (x as f64 - (dims[0] as f64 - 1.0) / 2.0) * voxel[0],
            (y as f64 - (dims[1] as f64 - 1.0) / 2.0) * voxel[1],
            (z as f64 - (dims[2] as f64 - 1.0) / 2.0) * voxel[2],
        ];
        CENTRES
            .iter()
            .map(|c| {
                let d2: f64 = (0..3)
                    .map(|a| (p[a] - c[a] * scale - shift_mm[a]).powi(2))
                    .sum();
                100.0 * (-d2 / (2.0 * sigma * sigma)).exp()
            })
            .sum::<f64>() as f32
    })
    .unwrap()
}

pub fn max_abs_difference(a: &Volume, b: &Volume) -> f32 {
    a.samples()
        .iter()
        .zip(b.samples())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

/// Mean squared difference between x-neighbours, a proxy for the
/// high-frequency energy of a field component.
pub fn roughness(v: &Volume) -> f64 {
    let [nx, ny, nz] = v.dims();
    let mut sum = 0.0;
    let mut count = 0usize;
    for z in 0..nz {
        for y in 0..ny {
            for x in 1..nx {
                let d = (v.get(x, y, z) - v.get(x - 1, y, z)) as f64;
                sum += d * d;
                count += 1;
            }
        }
    }
    sum / count.max(1) as f64
}
