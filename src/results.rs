//! Result types for FEA analysis

use serde::{Deserialize, Serialize};

use crate::elements::{CenterStress, EnergySplit};
use crate::error::{FEAError, FEAResult};

/// Displacement results at a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplacement {
    /// Displacement in X direction
    pub dx: f64,
    /// Displacement in Y direction
    pub dy: f64,
    /// Displacement in Z direction
    pub dz: f64,
    /// Rotation about X axis
    pub rx: f64,
    /// Rotation about Y axis
    pub ry: f64,
    /// Rotation about Z axis
    pub rz: f64,
}

impl NodeDisplacement {
    /// Create from array [DX, DY, DZ, RX, RY, RZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            dx: arr[0],
            dy: arr[1],
            dz: arr[2],
            rx: arr[3],
            ry: arr[4],
            rz: arr[5],
        }
    }

    /// Get translation magnitude
    pub fn translation_magnitude(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2) + self.dz.powi(2)).sqrt()
    }

    /// Get rotation magnitude
    pub fn rotation_magnitude(&self) -> f64 {
        (self.rx.powi(2) + self.ry.powi(2) + self.rz.powi(2)).sqrt()
    }
}

/// Axis-aligned box used to select elements by their center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Region {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> FEAResult<Self> {
        for axis in 0..3 {
            if !min[axis].is_finite() || !max[axis].is_finite() || min[axis] > max[axis] {
                return Err(FEAError::InvalidRegion(format!(
                    "bounds {min:?}..{max:?} are not ordered on axis {axis}"
                )));
            }
        }
        Ok(Self { min, max })
    }

    /// Inclusive containment test
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }
}

/// Aggregate strain energy and volume over a set of elements
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralResults {
    /// Total strain energy (compliance) over all load cases
    pub total_strain_energy: f64,
    pub axial_strain_energy: f64,
    pub shear_strain_energy: f64,
    pub bend_strain_energy: f64,
    /// Σ element volume · density
    pub total_structural_volume: f64,
}

impl StructuralResults {
    /// Add one element's contribution
    pub fn accumulate(&mut self, energy: &EnergySplit, volume: f64, density: f64) {
        self.total_strain_energy += energy.total();
        self.axial_strain_energy += energy.axial;
        self.shear_strain_energy += energy.shear;
        self.bend_strain_energy += energy.bend;
        self.total_structural_volume += volume * density;
    }
}

/// Per-element data for visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementResult {
    pub id: usize,
    pub kind: String,
    pub density: f64,
    pub energy: f64,
    pub center: [f64; 3],
    /// Center stress for the first load case, when a response is available
    pub stress: Option<CenterStress>,
}

/// Summary of analysis results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Maximum translation magnitude over all nodes and load cases
    pub max_displacement: f64,
    /// Node with maximum displacement
    pub max_disp_node: Option<usize>,
    /// Total number of nodes
    pub num_nodes: usize,
    /// Total number of elements
    pub num_elements: usize,
    /// Free DOFs (unknowns)
    pub free_dofs: usize,
    /// Load cases solved
    pub load_cases: Vec<String>,
}
