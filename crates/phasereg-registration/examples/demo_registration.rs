//! Demo Registration Example
//!
//! Registers a synthetic phantom onto a copy shifted by 4 mm along x and
//! prints the recovered affine.
//!
//! Usage:
//!   cargo run --example demo_registration
//!   cargo run --example demo_registration --features wgpu -- 1 0

use phasereg_core::Volume;
use phasereg_registration::{
    available_platforms, register_with_progress, ConsoleProgressCallback, FilterSets, OutputLevel,
    RegistrationConfig, RegistrationInputs,
};

fn phantom(shift_mm: f64) -> anyhow::Result<Volume> {
    let centres = [[-20.0, -16.0, -12.0], [18.0, -14.0, 8.0], [-12.0, 20.0, 16.0], [14.0, 18.0, -18.0], [0.0, 0.0, 0.0]];
    let n = 64;
    let voxel = 2.0;
    Ok(Volume::from_fn([n; 3], [voxel; 3], |x, y, z| {
        let p = [x, y, z].map(|i| (i as f64 - (n as f64 - 1.0) / 2.0) * voxel);
        centres
            .iter()
            .map(|c| {
                let d2 = (p[0] - c[0] - shift_mm).powi(2) + (p[1] - c[1]).powi(2) + (p[2] - c[2]).powi(2);
                (100.0 * (-d2 / 50.0).exp()) as f32
            })
            .sum()
    })?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let mut args = std::env::args().skip(1).map(|a| a.parse::<usize>());
    let platform = args.next().transpose()?.unwrap_or(0);
    let device = args.next().transpose()?.unwrap_or(0);

    for p in available_platforms() {
        tracing::info!("Platform {}: {} ({} device(s))", p.index, p.name, p.devices.len());
    }

    // 1. Inputs: source blobs sit 4 mm further along x
    let inputs = RegistrationInputs::new(phantom(4.0)?, phantom(0.0)?);

    // 2. Register
    let config = RegistrationConfig::default().with_platform(platform, device);
    let progress = ConsoleProgressCallback::new(2);
    let result = register_with_progress(
        &inputs,
        &FilterSets::standard()?,
        &config,
        OutputLevel::Full,
        Some(&progress),
    )?;

    // 3. Report
    if let Some(matrix) = result.affine_matrix {
        println!("Affine (mm):{matrix}");
    }
    if let Some(field) = &result.displacement {
        println!("Max displacement: {:.3} mm", field.max_magnitude());
    }
    println!("Elapsed: {:.2}s", result.elapsed.as_secs_f64());
    Ok(())
}
