//! Element - one formulation plus the state shared by every element kind

use std::collections::BTreeMap;

use super::{
    Beam, CenterStress, ElementKind, EnergySplit, FlatShell, Hexahedron, Interpolation, Node,
    NodeId, Structure, StructureKind, Truss, DOFS_PER_NODE,
};
use crate::error::{FEAError, FEAResult};
use crate::math::{half_quadratic, Mat, Vec as FEVec};

/// A finite element owned by an [`FEModel`](crate::model::FEModel)
///
/// The original stiffness is computed once at construction; the working
/// stiffness is the original scaled by `E / E0`.
#[derive(Debug, Clone)]
pub struct Element {
    id: usize,
    nodes: Vec<NodeId>,
    kind: ElementKind,
    center: [f64; 3],

    e0: f64,
    e_min: f64,
    e: f64,
    density: f64,
    interpolation: Interpolation,

    stiffness: Mat,

    /// Global equation per active local DOF, `None` when constrained
    dof_map: Vec<Option<usize>>,
    table_generated: bool,

    displacements: BTreeMap<String, FEVec>,
    energies: BTreeMap<String, EnergySplit>,
    total_energy: EnergySplit,
    /// Σ over load cases of ½·dᵀ·K_original·d
    original_energy: f64,
}

impl Element {
    /// Build an element and register its freedom signature with its nodes
    pub fn new(id: usize, structure: &Structure, node_ids: Vec<NodeId>, nodes: &mut [Node]) -> FEAResult<Self> {
        let structure_kind = structure.kind();
        if node_ids.len() != structure_kind.node_count() {
            return Err(FEAError::InvalidGeometry(format!(
                "{} element {} needs {} nodes, got {}",
                structure_kind,
                id,
                structure_kind.node_count(),
                node_ids.len()
            )));
        }

        let mut coords = Vec::with_capacity(node_ids.len());
        for node_id in &node_ids {
            let node = nodes.get(node_id.0).ok_or(FEAError::NodeNotFound(node_id.0))?;
            coords.push(node.coords());
        }

        let kind = match structure_kind {
            StructureKind::Truss => ElementKind::Truss(Truss::new(structure, &[coords[0], coords[1]])?),
            StructureKind::Beam => ElementKind::Beam(Beam::new(structure, &[coords[0], coords[1]])?),
            StructureKind::FlatShell => {
                ElementKind::FlatShell(FlatShell::new(structure, &[coords[0], coords[1], coords[2], coords[3]])?)
            }
            StructureKind::QuadHexahedron => {
                let mut corners = [[0.0; 3]; 8];
                corners.copy_from_slice(&coords);
                ElementKind::Hexahedron(Hexahedron::new(structure, &corners)?)
            }
        };

        let signature = kind.formulation().freedom_signature();
        for node_id in &node_ids {
            nodes[node_id.0].update_freedom_signature(&signature);
        }

        let count = coords.len() as f64;
        let mut center = [0.0; 3];
        for c in &coords {
            for axis in 0..3 {
                center[axis] += c[axis] / count;
            }
        }

        let e0 = structure.youngs_modulus()?;
        let stiffness = kind.formulation().stiffness().clone();
        let active = node_ids.len() * signature.iter().filter(|&&s| s).count();

        Ok(Self {
            id,
            nodes: node_ids,
            kind,
            center,
            e0,
            e_min: e0 * structure.relative_lower_bound(),
            e: e0,
            density: 1.0,
            interpolation: Interpolation::default(),
            stiffness,
            dof_map: vec![None; active],
            table_generated: false,
            displacements: BTreeMap::new(),
            energies: BTreeMap::new(),
            total_energy: EnergySplit::default(),
            original_energy: 0.0,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn structure_kind(&self) -> StructureKind {
        self.kind.structure_kind()
    }

    pub fn freedom_signature(&self) -> [bool; DOFS_PER_NODE] {
        self.kind.formulation().freedom_signature()
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// Current effective Young's modulus
    pub fn youngs_modulus(&self) -> f64 {
        self.e
    }

    pub fn nominal_modulus(&self) -> f64 {
        self.e0
    }

    pub fn minimum_modulus(&self) -> f64 {
        self.e_min
    }

    /// Working stiffness (original scaled by E/E0)
    pub fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    /// Stiffness at the nominal modulus
    pub fn original_stiffness(&self) -> &Mat {
        self.kind.formulation().stiffness()
    }

    /// Set the density and rescale the working stiffness
    ///
    /// Depends only on `x`, `penal` and the rule, so repeated calls with the
    /// same arguments give bit-identical results.
    pub fn update_density(&mut self, x: f64, penal: f64, rule: Interpolation) -> FEAResult<()> {
        if !x.is_finite() || !(0.0..=1.0).contains(&x) {
            return Err(FEAError::InvalidInput(format!(
                "density of element {} must lie in [0, 1], got {x}",
                self.id
            )));
        }
        if !penal.is_finite() || penal <= 0.0 {
            return Err(FEAError::InvalidInput(format!(
                "penalization must be positive, got {penal}"
            )));
        }
        self.density = x;
        self.interpolation = rule;
        self.e = rule.modulus(x, penal, self.e0, self.e_min);
        self.stiffness = self.original_stiffness() * (self.e / self.e0);
        Ok(())
    }

    /// Map every active local DOF to its node's global equation
    pub fn generate_freedom_table(&mut self, nodes: &[Node]) -> FEAResult<()> {
        let signature = self.freedom_signature();
        let mut map = Vec::with_capacity(self.dof_map.len());
        for node_id in &self.nodes {
            let node = nodes.get(node_id.0).ok_or(FEAError::NodeNotFound(node_id.0))?;
            for dof in (0..DOFS_PER_NODE).filter(|&dof| signature[dof]) {
                if !node.is_active(dof) {
                    return Err(FEAError::SignatureMismatch {
                        element: self.id,
                        node: node_id.0,
                        dof,
                    });
                }
                if node.is_constrained(dof) {
                    map.push(None);
                } else {
                    map.push(Some(node.global_dof(dof)?));
                }
            }
        }
        self.dof_map = map;
        self.table_generated = true;
        Ok(())
    }

    /// Global equation per active local DOF
    pub fn dof_map(&self) -> FEAResult<&[Option<usize>]> {
        if !self.table_generated {
            return Err(FEAError::FreedomTableNotGenerated(self.id));
        }
        Ok(&self.dof_map)
    }

    /// Gather this element's displacement vector for a load case from its nodes
    fn gather_displacements(&self, case: &str, nodes: &[Node]) -> FEAResult<FEVec> {
        let signature = self.freedom_signature();
        let mut d = FEVec::zeros(self.dof_map.len());
        let mut index = 0;
        for node_id in &self.nodes {
            let node = nodes.get(node_id.0).ok_or(FEAError::NodeNotFound(node_id.0))?;
            let u = node.displacement(case).unwrap_or([0.0; DOFS_PER_NODE]);
            for dof in (0..DOFS_PER_NODE).filter(|&dof| signature[dof]) {
                d[index] = u[dof];
                index += 1;
            }
        }
        Ok(d)
    }

    /// Compute and accumulate the strain energy for one load case
    pub fn compute_response(&mut self, case: &str, nodes: &[Node]) -> FEAResult<()> {
        let d = self.gather_displacements(case, nodes)?;
        let split = self.kind.formulation().energy_split(&d) * (self.e / self.e0);

        self.original_energy += half_quadratic(self.original_stiffness(), &d);
        self.total_energy += split;
        *self.energies.entry(case.to_string()).or_default() += split;
        self.displacements.insert(case.to_string(), d);
        Ok(())
    }

    /// Total strain energy over all load cases
    pub fn energy(&self) -> f64 {
        self.total_energy.total()
    }

    /// Energy split over all load cases
    pub fn energy_split(&self) -> EnergySplit {
        self.total_energy
    }

    /// Energy split for one load case
    pub fn case_energy(&self, case: &str) -> Option<EnergySplit> {
        self.energies.get(case).copied()
    }

    /// Cached displacement vector for a load case
    pub fn displacement(&self, case: &str) -> Option<&FEVec> {
        self.displacements.get(case)
    }

    /// d(compliance)/dx = −(dE/dx)/E0 · Σ ½·dᵀ·K_original·d
    pub fn energy_sensitivity(&self, penal: f64) -> f64 {
        let de_dx = self
            .interpolation
            .derivative(self.density, penal, self.e0, self.e_min);
        -de_dx / self.e0 * self.original_energy
    }

    /// Geometric volume (independent of density)
    pub fn volume(&self) -> f64 {
        self.kind.formulation().volume()
    }

    /// Mean of the node positions
    pub fn center(&self) -> [f64; 3] {
        self.center
    }

    /// Stress at the element center for a load case, at the current modulus
    pub fn center_stress(&self, case: &str) -> FEAResult<Option<CenterStress>> {
        let Some(d) = self.displacements.get(case) else {
            return Ok(None);
        };
        let stress = self.kind.formulation().stress_at_center(d)?;
        Ok(Some(stress.scaled(self.e / self.e0)))
    }

    /// Drop cached displacements and energies
    pub fn clear_response(&mut self) {
        self.displacements.clear();
        self.energies.clear();
        self.total_energy = EnergySplit::default();
        self.original_energy = 0.0;
    }
}
