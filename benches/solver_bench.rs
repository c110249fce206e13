//! Benchmarks for assembly, linear solvers and optimizer iterations

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fea_topopt::prelude::*;

fn create_multi_story_frame(stories: usize, bays: usize) -> FEModel {
    let mut model = FEModel::new();
    let column = Structure::beam(0.4, 0.4, 0.3, 30e9).unwrap();
    let girder = Structure::beam(0.3, 0.6, 0.3, 30e9).unwrap();

    let story_height = 3.5;
    let bay_width = 6.0;

    let mut grid = vec![vec![NodeId(0); bays + 1]; stories + 1];
    for (story, row) in grid.iter_mut().enumerate() {
        for (bay, node) in row.iter_mut().enumerate() {
            *node = model
                .add_node(bay as f64 * bay_width, 0.0, story as f64 * story_height)
                .unwrap();
        }
    }

    let mut id = 0;
    for story in 0..stories {
        for bay in 0..=bays {
            model
                .create_element(id, &column, &[grid[story][bay], grid[story + 1][bay]])
                .unwrap();
            id += 1;
        }
    }
    for story in 1..=stories {
        for bay in 0..bays {
            model
                .create_element(id, &girder, &[grid[story][bay], grid[story][bay + 1]])
                .unwrap();
            id += 1;
        }
    }

    for &node in &grid[0] {
        model.add_constraints(node, &[0, 1, 2, 3, 4, 5]).unwrap();
    }
    for row in grid.iter().skip(1) {
        for &node in row {
            model.add_load(node, "Dead", 2, -50000.0).unwrap();
        }
    }
    model
}

fn create_shell_cantilever(n: usize) -> FEModel {
    let shell = Structure::flat_shell(0.01, 0.3, 1.0).unwrap();
    let mut builder = MeshBuilder::new();
    builder
        .add_quad([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [0.0, 1.0, 0.0]], &shell)
        .unwrap()
        .constrain_region(Region::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]).unwrap(), &[0, 1, 2, 3, 4, 5])
        .unwrap()
        .load_region(Region::new([2.0, 0.0, 0.0], [2.0, 1.0, 0.0]).unwrap(), "Tip", 1, -1.0)
        .unwrap();
    builder.mesh(n).unwrap()
}

fn benchmark_frames(c: &mut Criterion) {
    c.bench_function("frame_3story_2bay_direct", |b| {
        b.iter(|| {
            let mut model = create_multi_story_frame(3, 2);
            model.analyze("direct").unwrap();
            black_box(&model);
        })
    });

    c.bench_function("frame_10story_5bay_direct", |b| {
        b.iter(|| {
            let mut model = create_multi_story_frame(10, 5);
            model.analyze("direct").unwrap();
            black_box(&model);
        })
    });
}

fn benchmark_solvers(c: &mut Criterion) {
    for solver in ["direct", "CG", "BiCGSTAB"] {
        c.bench_function(&format!("shell_cantilever_16_{solver}"), |b| {
            let mut model = create_shell_cantilever(16);
            b.iter(|| {
                model.analyze(solver).unwrap();
                black_box(model.results());
            })
        });
    }
}

fn benchmark_optimizer(c: &mut Criterion) {
    c.bench_function("shell_cantilever_oc_5_iterations", |b| {
        b.iter(|| {
            let mut model = create_shell_cantilever(8);
            let settings = TopOptSettings::default()
                .with_volume_fraction(0.5)
                .with_filter_radius(0.2)
                .with_max_iterations(5);
            let mut optimizer = TopologyOptimizer::new(Algorithm::OptimalityCriteria, settings).unwrap();
            // Stops at the iteration cap; only the work done matters here
            let _ = optimizer.run(&mut model);
            black_box(optimizer.history().len());
        })
    });
}

criterion_group!(benches, benchmark_frames, benchmark_solvers, benchmark_optimizer);

criterion_main!(benches);
