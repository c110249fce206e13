//! FEA TopOpt - structural finite element analysis with SIMP topology optimization
//!
//! This library assembles and solves linear static 3D models built from
//! heterogeneous elements sharing nodes:
//! - Truss bars (axial only)
//! - Timoshenko beams with rectangular sections
//! - Flat 4-node shells (membrane + Mindlin plate)
//! - 8-node hexahedra
//!
//! On top of the linear solve it runs density-based topology optimization
//! (optimality criteria or MMA) minimizing compliance under a volume fraction.
//!
//! ## Example
//! ```rust
//! use fea_topopt::prelude::*;
//!
//! let mut model = FEModel::new();
//! let a = model.add_node(0.0, 0.0, 0.0).unwrap();
//! let b = model.add_node(1.0, 0.0, 0.0).unwrap();
//!
//! let bar = Structure::truss(1000.0, 1e5).unwrap();
//! model.create_element(0, &bar, &[a, b]).unwrap();
//!
//! model.add_constraints(a, &[0, 1, 2]).unwrap();
//! model.add_constraints(b, &[1, 2]).unwrap();
//! model.add_load(b, "Dead", 0, 1e9).unwrap();
//!
//! let results = model.analyze("direct").unwrap();
//! let tip = model.node_displacement(b, "Dead").unwrap();
//! assert!((tip.dx - 10.0).abs() < 1e-6);
//! assert!(results.total_strain_energy > 0.0);
//! ```

pub mod analysis;
pub mod elements;
pub mod error;
pub mod math;
pub mod mesh;
pub mod model;
pub mod results;
pub mod topopt;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{AnalysisOptions, SolverKind};
    pub use crate::elements::{Element, Interpolation, Node, NodeId, Structure, StructureKind};
    pub use crate::error::{FEAError, FEAResult, NumericalFailure};
    pub use crate::mesh::MeshBuilder;
    pub use crate::model::{AssemblyState, FEModel};
    pub use crate::results::{ElementResult, NodeDisplacement, Region, StructuralResults};
    pub use crate::topopt::{
        Algorithm, IterationRecord, IterationWriter, OptimizationReport, TopOptSettings, TopologyOptimizer,
    };
}
