//! FEA TopOpt Example - portal frame analysis and a cantilever topology optimization
//!
//! Usage: `fea-topopt-example [settings.json]`

use std::io;

use anyhow::Context;
use fea_topopt::prelude::*;

fn portal_frame() -> anyhow::Result<()> {
    println!("=== Portal Frame (linear static) ===\n");

    //     N3 -------- N4
    //     |          |
    //     |          |
    //     N1        N2
    //   Fixed     Fixed
    let height = 4.0;
    let span = 6.0;

    let mut model = FEModel::new();
    let n1 = model.add_node(0.0, 0.0, 0.0)?;
    let n2 = model.add_node(span, 0.0, 0.0)?;
    let n3 = model.add_node(0.0, 0.0, height)?;
    let n4 = model.add_node(span, 0.0, height)?;

    let column = Structure::beam(0.4, 0.4, 0.3, 30e9)?;
    let girder = Structure::beam(0.3, 0.6, 0.3, 30e9)?;
    model.create_element(1, &column, &[n1, n3])?;
    model.create_element(2, &column, &[n2, n4])?;
    model.create_element(3, &girder, &[n3, n4])?;

    model.add_constraints(n1, &[0, 1, 2, 3, 4, 5])?;
    model.add_constraints(n2, &[0, 1, 2, 3, 4, 5])?;

    // Dead: 20 kN/m on the girder lumped to its ends (negative Z = downward)
    model.add_load(n3, "Dead", 2, -span * 20000.0 / 2.0)?;
    model.add_load(n4, "Dead", 2, -span * 20000.0 / 2.0)?;
    // Wind: 10 kN at roof level
    model.add_load(n3, "Wind", 0, 10000.0)?;

    let results = model.analyze("direct").context("portal frame analysis failed")?;

    for case in ["Dead", "Wind"] {
        println!("Node displacements ({case}):");
        for (name, node) in [("N3", n3), ("N4", n4)] {
            let disp = model.node_displacement(node, case)?;
            println!(
                "  {}: DX={:.4}mm, DZ={:.4}mm, RY={:.6}rad",
                name,
                disp.dx * 1000.0,
                disp.dz * 1000.0,
                disp.ry
            );
        }
    }

    let summary = model.summary();
    println!("\nSummary:");
    println!(
        "  Max displacement: {:.4}mm at node {:?}",
        summary.max_displacement * 1000.0,
        summary.max_disp_node
    );
    println!(
        "  Strain energy: total {:.4} J (axial {:.4}, shear {:.4}, bend {:.4})\n",
        results.total_strain_energy,
        results.axial_strain_energy,
        results.shear_strain_energy,
        results.bend_strain_energy
    );
    Ok(())
}

fn cantilever_optimization(settings: TopOptSettings) -> anyhow::Result<()> {
    println!("=== Cantilever Topology Optimization ===\n");

    // Two 1x1 shell panels side by side, clamped at x = 0, loaded in-plane at the free end
    let shell = Structure::flat_shell(0.01, 0.3, 1.0)?;
    let mut builder = MeshBuilder::new();
    builder
        .add_quad([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]], &shell)?
        .add_quad([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [1.0, 1.0, 0.0]], &shell)?
        .constrain_region(Region::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0])?, &[0, 1, 2, 3, 4, 5])?
        .load_point([2.0, 0.5, 0.0], "Tip", 1, -1.0)?;
    let mut model = builder.set_mesh_size(10)?;

    let mut optimizer =
        TopologyOptimizer::new(Algorithm::OptimalityCriteria, settings)?.with_output(io::stdout());
    let report = optimizer
        .run(&mut model)
        .context("topology optimization did not converge")?;

    let elements = model.element_results()?;
    let output = serde_json::json!({
        "report": report,
        "results": model.results(),
        "elements": elements,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            TopOptSettings::from_json(&json)?
        }
        None => TopOptSettings::default()
            .with_volume_fraction(0.4)
            .with_filter_radius(0.15),
    };

    portal_frame()?;
    cantilever_optimization(settings)?;

    println!("\n=== Analysis Complete ===");
    Ok(())
}
