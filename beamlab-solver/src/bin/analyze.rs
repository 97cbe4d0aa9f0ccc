//! BeamLab command line analysis
//!
//! Usage: beamlab-analyze <sketch.json> [options.json] [results.json]

use anyhow::{bail, Context};
use std::path::PathBuf;

use beamlab_solver::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(sketch_path) = args.next().map(PathBuf::from) else {
        bail!("usage: beamlab-analyze <sketch.json> [options.json] [results.json]");
    };
    let options_path = args.next().map(PathBuf::from);
    let output_path = args.next().map(PathBuf::from);

    let text = std::fs::read_to_string(&sketch_path)
        .with_context(|| format!("reading sketch {}", sketch_path.display()))?;
    let sketch: BeamSketch = serde_json::from_str(&text)
        .with_context(|| format!("parsing sketch {}", sketch_path.display()))?;

    let options = match &options_path {
        Some(path) => AnalysisOptions::from_json_file(path)
            .with_context(|| format!("loading options {}", path.display()))?,
        None => AnalysisOptions::default(),
    };

    println!("=== BeamLab: {:.3} m span ===\n", sketch.span);

    let gateway = ExecutionGateway::new(options).with_progress(|event| {
        log::info!("[{:>3}%] {}: {}", event.percent, event.stage, event.message);
    });
    let results = gateway.analyze_sketch(&sketch).await?;

    println!(
        "Mesh: {} elements at {:.4} m ({:?} solve)",
        results.mesh.element_count, results.mesh.spacing, results.execution
    );

    println!("\n--- Reactions ---");
    for r in &results.reactions {
        println!(
            "  #{} {:?} at x = {:.3}: R = {:.4} kN, M = {:.4} kN·m",
            r.support, r.kind, r.position, r.force, r.moment
        );
    }
    println!(
        "  Total: {:.4} kN (applied {:.4} kN)",
        results.total_reaction(),
        sketch.total_applied_load()
    );

    println!("\n--- Extrema ---");
    println!(
        "  Shear:      {:.4} kN at x = {:.3}",
        results.max_shear.value, results.max_shear.x
    );
    println!(
        "  Moment:     {:.4} kN·m at x = {:.3}",
        results.max_moment.value, results.max_moment.x
    );
    println!(
        "  Deflection: {:.4} {:?} at x = {:.3}",
        results.max_deflection.value, results.deflection_unit, results.max_deflection.x
    );

    if let Some(path) = output_path {
        std::fs::write(&path, results.to_json()?)
            .with_context(|| format!("writing results {}", path.display()))?;
        println!("\nResults written to {}", path.display());
    }

    Ok(())
}
