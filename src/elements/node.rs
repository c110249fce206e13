//! Node element - a point in 3D space with 6-DOF bookkeeping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FEAError, FEAResult};

/// Number of degrees of freedom per node: DX, DY, DZ, RX, RY, RZ
pub const DOFS_PER_NODE: usize = 6;

/// Stable handle to a node owned by an [`FEModel`](crate::model::FEModel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A 3D node in the finite element model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,

    /// Index in the owning model's node arena
    pub(crate) id: usize,

    /// Fixed DOFs
    pub(crate) constraints: [bool; DOFS_PER_NODE],

    /// DOFs used by at least one attached element
    pub(crate) freedom_signature: [bool; DOFS_PER_NODE],

    /// Global equation index per DOF
    #[serde(skip)]
    pub(crate) freedom_table: [Option<usize>; DOFS_PER_NODE],

    #[serde(skip)]
    pub(crate) table_generated: bool,

    /// Accumulated loads by load case [FX, FY, FZ, MX, MY, MZ]
    pub(crate) loads: BTreeMap<String, [f64; DOFS_PER_NODE]>,

    /// Displacement results by load case [DX, DY, DZ, RX, RY, RZ]
    #[serde(skip)]
    pub(crate) displacements: BTreeMap<String, [f64; DOFS_PER_NODE]>,
}

impl Node {
    /// Create a new node at the given coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            id: 0,
            constraints: [false; DOFS_PER_NODE],
            freedom_signature: [false; DOFS_PER_NODE],
            freedom_table: [None; DOFS_PER_NODE],
            table_generated: false,
            loads: BTreeMap::new(),
            displacements: BTreeMap::new(),
        }
    }

    /// Get the coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Arena index of this node
    pub fn id(&self) -> NodeId {
        NodeId(self.id)
    }

    /// Calculate distance to another node
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// OR an element's required DOFs into this node's signature
    pub fn update_freedom_signature(&mut self, signature: &[bool; DOFS_PER_NODE]) {
        for (own, &required) in self.freedom_signature.iter_mut().zip(signature) {
            *own |= required;
        }
    }

    /// The union of the signatures of all attached elements
    pub fn freedom_signature(&self) -> [bool; DOFS_PER_NODE] {
        self.freedom_signature
    }

    /// Fix a DOF
    pub fn add_constraint(&mut self, dof: usize) -> FEAResult<()> {
        check_dof(dof)?;
        self.constraints[dof] = true;
        Ok(())
    }

    /// Whether a DOF is fixed
    pub fn is_constrained(&self, dof: usize) -> bool {
        dof < DOFS_PER_NODE && self.constraints[dof]
    }

    /// Whether any attached element uses a DOF
    pub fn is_active(&self, dof: usize) -> bool {
        dof < DOFS_PER_NODE && self.freedom_signature[dof]
    }

    /// Add a load to a DOF for a load case, summing with earlier loads
    pub fn add_load(&mut self, case: &str, dof: usize, magnitude: f64) -> FEAResult<()> {
        check_dof(dof)?;
        if !magnitude.is_finite() {
            return Err(FEAError::InvalidInput(format!(
                "load magnitude must be finite, got {magnitude}"
            )));
        }
        self.loads
            .entry(case.to_string())
            .or_insert([0.0; DOFS_PER_NODE])[dof] += magnitude;
        Ok(())
    }

    /// Loads for a load case
    pub fn load(&self, case: &str) -> Option<[f64; DOFS_PER_NODE]> {
        self.loads.get(case).copied()
    }

    /// Assign global indices to active, unconstrained DOFs in DOF order
    pub fn generate_freedom_table(&mut self, next_global_index: &mut usize) {
        self.freedom_table = [None; DOFS_PER_NODE];
        for dof in 0..DOFS_PER_NODE {
            if self.freedom_signature[dof] && !self.constraints[dof] {
                self.freedom_table[dof] = Some(*next_global_index);
                *next_global_index += 1;
            }
        }
        self.table_generated = true;
    }

    /// Global equation index of a DOF
    pub fn global_dof(&self, dof: usize) -> FEAResult<usize> {
        check_dof(dof)?;
        if !self.freedom_signature[dof] {
            return Err(FEAError::InactiveDof { node: self.id, dof });
        }
        if self.constraints[dof] {
            return Err(FEAError::ConstrainedDof { node: self.id, dof });
        }
        if !self.table_generated {
            return Err(FEAError::FreedomTableNotGenerated(self.id));
        }
        self.freedom_table[dof].ok_or(FEAError::FreedomTableNotGenerated(self.id))
    }

    /// Get displacement for a load case
    /// Returns [DX, DY, DZ, RX, RY, RZ]
    pub fn displacement(&self, case: &str) -> Option<[f64; DOFS_PER_NODE]> {
        self.displacements.get(case).copied()
    }

    pub(crate) fn clear_response(&mut self) {
        self.displacements.clear();
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

pub(crate) fn check_dof(dof: usize) -> FEAResult<()> {
    if dof >= DOFS_PER_NODE {
        return Err(FEAError::InvalidDof(dof));
    }
    Ok(())
}

/// Signature covering translations only
pub const TRANSLATIONS: [bool; DOFS_PER_NODE] = [true, true, true, false, false, false];

/// Signature covering all six DOFs
pub const ALL_DOFS: [bool; DOFS_PER_NODE] = [true; DOFS_PER_NODE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = Node::new(1.0, 2.0, 3.0);
        assert_eq!(node.coords(), [1.0, 2.0, 3.0]);
        assert_eq!(node.freedom_signature(), [false; 6]);
    }

    #[test]
    fn test_node_distance() {
        let n1 = Node::new(0.0, 0.0, 0.0);
        let n2 = Node::new(3.0, 4.0, 0.0);
        assert!((n1.distance_to(&n2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_signature_is_union() {
        let mut node = Node::default();
        node.update_freedom_signature(&TRANSLATIONS);
        node.update_freedom_signature(&[false, false, false, true, false, false]);
        node.update_freedom_signature(&[false; 6]);
        assert_eq!(node.freedom_signature(), [true, true, true, true, false, false]);
    }

    #[test]
    fn test_invalid_constraint() {
        let mut node = Node::default();
        assert!(matches!(node.add_constraint(6), Err(FEAError::InvalidDof(6))));
        assert!(node.add_constraint(5).is_ok());
    }

    #[test]
    fn test_loads_accumulate() {
        let mut node = Node::default();
        node.add_load("wind", 2, -3.0).unwrap();
        node.add_load("wind", 2, -1.5).unwrap();
        node.add_load("dead", 0, 1.0).unwrap();
        assert_eq!(node.load("wind").unwrap()[2], -4.5);
        assert_eq!(node.load("dead").unwrap()[0], 1.0);
        assert!(node.load("snow").is_none());
    }

    #[test]
    fn test_freedom_table_order() {
        let mut node = Node::default();
        node.update_freedom_signature(&ALL_DOFS);
        node.add_constraint(1).unwrap();
        node.add_constraint(4).unwrap();

        let mut next = 10;
        node.generate_freedom_table(&mut next);
        assert_eq!(next, 14);
        assert_eq!(node.global_dof(0).unwrap(), 10);
        assert_eq!(node.global_dof(2).unwrap(), 11);
        assert_eq!(node.global_dof(3).unwrap(), 12);
        assert_eq!(node.global_dof(5).unwrap(), 13);
        assert!(matches!(node.global_dof(1), Err(FEAError::ConstrainedDof { .. })));
    }

    #[test]
    fn test_global_dof_requires_table() {
        let mut node = Node::default();
        node.update_freedom_signature(&TRANSLATIONS);
        assert!(matches!(node.global_dof(0), Err(FEAError::FreedomTableNotGenerated(_))));
        assert!(matches!(node.global_dof(3), Err(FEAError::InactiveDof { .. })));
        assert!(matches!(node.global_dof(9), Err(FEAError::InvalidDof(9))));
    }
}
